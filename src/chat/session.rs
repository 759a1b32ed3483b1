//! Core chat session management.
//!
//! This module provides the `ChatSession` struct, which runs the interactive loop and
//! drives one streaming exchange per line of input.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::chat::commands::{ChatCommand, GOODBYE, LineReader, USER_PROMPT, parse_command};
use crate::chat::config::ChatConfig;
use crate::client::{ChatClient, ChatTransport};
use crate::client_logger::ExchangeLogger;
use crate::error::{Error, Result};
use crate::observability::{
    DECODE_ERRORS, EXCHANGE_DURATION, EXCHANGES, EXCHANGES_CLOSED, REQUEST_ERRORS, STREAM_TTFB,
};
use crate::render::Renderer;
use crate::stream::{process_fragments, with_read_timeout};
use crate::types::ChatRequest;

/// How a single exchange ended.
///
/// Every variant leaves the session usable for the next message.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    /// The server sent a fragment with `close: true`.
    Closed,

    /// The server ended the stream without a closing fragment.
    Ended,

    /// The request could not be made or the connection failed.
    RequestFailed(Error),

    /// A fragment was valid JSON but could not be interpreted.
    DecodeFailed(Error),
}

impl ExchangeOutcome {
    /// Returns true if the response was received without error.
    pub fn is_success(&self) -> bool {
        matches!(self, ExchangeOutcome::Closed | ExchangeOutcome::Ended)
    }

    fn from_error(err: Error) -> Self {
        if err.is_decode_error() {
            ExchangeOutcome::DecodeFailed(err)
        } else {
            ExchangeOutcome::RequestFailed(err)
        }
    }
}

impl fmt::Display for ExchangeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeOutcome::Closed => write!(f, "closed"),
            ExchangeOutcome::Ended => write!(f, "ended"),
            ExchangeOutcome::RequestFailed(err) => write!(f, "request failed: {err}"),
            ExchangeOutcome::DecodeFailed(err) => write!(f, "decode failed: {err}"),
        }
    }
}

/// A chat session bound to one workspace.
///
/// Exchanges run one at a time; each owns its connection and stream buffer, so nothing
/// carries over from one message to the next.
pub struct ChatSession<T: ChatTransport> {
    transport: T,
    session_id: String,
    timeout: Duration,
    max_line_bytes: usize,
    logger: Option<Arc<dyn ExchangeLogger>>,
    exchange_count: u64,
}

impl ChatSession<ChatClient> {
    /// Creates a new chat session speaking HTTP to the configured workspace.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Ok(Self::with_transport(ChatClient::new(config)?, config))
    }
}

impl<T: ChatTransport> ChatSession<T> {
    /// Creates a new chat session over a custom transport.
    pub fn with_transport(transport: T, config: &ChatConfig) -> Self {
        Self {
            transport,
            session_id: config.session_id.clone(),
            timeout: config.stream_timeout(),
            max_line_bytes: config.max_line_bytes,
            logger: None,
            exchange_count: 0,
        }
    }

    /// Sets a logger that sees every request, fragment, and outcome.
    pub fn with_logger(mut self, logger: Arc<dyn ExchangeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the number of exchanges started so far.
    pub fn exchange_count(&self) -> u64 {
        self.exchange_count
    }

    /// Run the interactive loop until the user exits.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read or output cannot be written.  Failed
    /// exchanges are reported to the user and do not end the loop.
    pub async fn run(
        &mut self,
        input: &mut dyn LineReader,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        loop {
            let Some(line) = input.read_line(USER_PROMPT)? else {
                renderer.print_info("")?;
                renderer.print_info(GOODBYE)?;
                return Ok(());
            };
            match parse_command(&line) {
                ChatCommand::Exit => {
                    renderer.print_info(GOODBYE)?;
                    return Ok(());
                }
                ChatCommand::Send(message) => {
                    renderer.print_info("")?;
                    self.exchange(&message, renderer).await?;
                }
            }
        }
    }

    /// Send one message and stream the response to `renderer`.
    ///
    /// Request and decode failures are printed and returned as the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only if the renderer fails to write.
    pub async fn exchange(
        &mut self,
        message: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<ExchangeOutcome> {
        let start = Instant::now();
        EXCHANGES.click();
        self.exchange_count += 1;

        let request = ChatRequest::new(message, self.session_id.clone());
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }

        renderer.start_response()?;
        let outcome = self.stream_response(&request, renderer, start).await?;
        match &outcome {
            ExchangeOutcome::Closed => EXCHANGES_CLOSED.click(),
            ExchangeOutcome::Ended => {}
            ExchangeOutcome::RequestFailed(err) => {
                REQUEST_ERRORS.click();
                renderer.print_request_error(&err.to_string())?;
            }
            ExchangeOutcome::DecodeFailed(err) => {
                DECODE_ERRORS.click();
                renderer.print_chunk_error(&err.to_string())?;
            }
        }

        if let Some(logger) = &self.logger {
            logger.log_outcome(&outcome);
        }
        EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
        Ok(outcome)
    }

    async fn stream_response(
        &self,
        request: &ChatRequest,
        renderer: &mut dyn Renderer,
        start: Instant,
    ) -> Result<ExchangeOutcome> {
        let body = match tokio::time::timeout(self.timeout, self.transport.open(request)).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => return Ok(ExchangeOutcome::from_error(err)),
            Err(_) => {
                return Ok(ExchangeOutcome::RequestFailed(Error::timeout(
                    "no response from server",
                    Some(self.timeout.as_secs_f64()),
                )));
            }
        };

        let body = Box::pin(with_read_timeout(body, self.timeout));
        let fragments = process_fragments(body, self.max_line_bytes);
        futures::pin_mut!(fragments);

        let mut first = true;
        while let Some(fragment) = fragments.next().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(err) => return Ok(ExchangeOutcome::from_error(err)),
            };
            if first {
                STREAM_TTFB.add(start.elapsed().as_secs_f64());
                first = false;
            }
            if let Some(logger) = &self.logger {
                logger.log_fragment(&fragment);
            }
            renderer.print_text(fragment.text_response())?;
            if fragment.is_close() {
                renderer.finish_response()?;
                return Ok(ExchangeOutcome::Closed);
            }
        }
        Ok(ExchangeOutcome::Ended)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Write};
    use std::sync::Mutex;

    use bytes::Bytes;
    use futures::stream;

    use super::*;
    use crate::client::ByteStream;
    use crate::render::PlainTextRenderer;
    use crate::types::ResponseFragment;

    const HI_THERE: &str = "data: {\"textResponse\": \"Hi\", \"close\": false}\n\
                            data: {\"textResponse\": \" there\", \"close\": true}\n";

    /// Answers each request with the next canned response.
    #[derive(Default)]
    struct CannedTransport {
        responses: Mutex<VecDeque<Result<Vec<Bytes>>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl CannedTransport {
        fn respond(self, chunks: &[&str]) -> Self {
            let chunks = chunks
                .iter()
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect();
            self.responses.lock().unwrap().push_back(Ok(chunks));
            self
        }

        fn fail(self, err: Error) -> Self {
            self.responses.lock().unwrap().push_back(Err(err));
            self
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for CannedTransport {
        async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
            self.requests.lock().unwrap().push(request.clone());
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request");
            let chunks = response?;
            Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    /// Never answers.
    struct SilentTransport;

    #[async_trait::async_trait]
    impl ChatTransport for SilentTransport {
        async fn open(&self, _: &ChatRequest) -> Result<ByteStream> {
            futures::future::pending().await
        }
    }

    /// Replays scripted input, then reports end of input.
    struct ScriptedReader {
        lines: VecDeque<String>,
        prompts: usize,
    }

    impl ScriptedReader {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                prompts: 0,
            }
        }
    }

    impl LineReader for ScriptedReader {
        fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
            assert_eq!(prompt, "You: ");
            self.prompts += 1;
            Ok(self.lines.pop_front())
        }
    }

    /// Records everything the session logs.
    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<String>>,
    }

    impl ExchangeLogger for RecordingLogger {
        fn log_request(&self, request: &ChatRequest) {
            self.events
                .lock()
                .unwrap()
                .push(format!("request {}", request.message));
        }

        fn log_fragment(&self, fragment: &ResponseFragment) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fragment {}", fragment.text_response()));
        }

        fn log_outcome(&self, outcome: &ExchangeOutcome) {
            self.events.lock().unwrap().push(format!("outcome {outcome}"));
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config() -> ChatConfig {
        ChatConfig::from_yaml(
            "api_key: secret\n\
             model_server_base_url: http://localhost:3001/api/v1\n\
             stream_timeout: 5\n\
             workspace_slug: docs\n",
        )
        .unwrap()
    }

    fn renderer() -> PlainTextRenderer<Vec<u8>> {
        PlainTextRenderer::with_writer(Vec::new(), false)
    }

    fn output(renderer: PlainTextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    async fn exchange_output(
        transport: CannedTransport,
        message: &str,
    ) -> (ExchangeOutcome, String) {
        let mut session = ChatSession::with_transport(transport, &config());
        let mut renderer = renderer();
        let outcome = session.exchange(message, &mut renderer).await.unwrap();
        (outcome, output(renderer))
    }

    #[tokio::test]
    async fn streams_text_until_close() {
        let transport = CannedTransport::default().respond(&[HI_THERE]);
        let (outcome, printed) = exchange_output(transport, "hello").await;
        assert!(matches!(outcome, ExchangeOutcome::Closed));
        assert_eq!(printed, "Agent: Hi there\n");
    }

    #[tokio::test]
    async fn sends_the_chat_request() {
        let transport = CannedTransport::default().respond(&[HI_THERE]);
        let config = config().with_session_id("s-1");
        let mut session = ChatSession::with_transport(transport, &config);
        let mut renderer = renderer();
        session.exchange("hello", &mut renderer).await.unwrap();
        assert_eq!(
            session.transport().requests(),
            vec![ChatRequest::new("hello", "s-1")]
        );
        assert_eq!(session.exchange_count(), 1);
    }

    #[tokio::test]
    async fn output_independent_of_chunking() {
        let (_, whole) =
            exchange_output(CannedTransport::default().respond(&[HI_THERE]), "m").await;
        for size in [1, 2, 3, 7, 13, 40] {
            let pieces: Vec<&str> = HI_THERE
                .as_bytes()
                .chunks(size)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect();
            let transport = CannedTransport::default().respond(&pieces);
            let (outcome, printed) = exchange_output(transport, "m").await;
            assert!(matches!(outcome, ExchangeOutcome::Closed));
            assert_eq!(printed, whole, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn incomplete_json_waits_for_the_rest() {
        let transport = CannedTransport::default().respond(&[
            "data: {\"textResponse\": \"Hel",
            "lo\", \"close\": fa",
            "lse}\ndata: {\"close\": true}\n",
        ]);
        let (outcome, printed) = exchange_output(transport, "m").await;
        assert!(matches!(outcome, ExchangeOutcome::Closed));
        assert_eq!(printed, "Agent: Hello\n");
    }

    #[tokio::test]
    async fn non_json_lines_are_skipped() {
        let transport = CannedTransport::default().respond(&[
            ": keep-alive\n\ndata: not json\n",
            "{\"textResponse\": \"ok\", \"close\": true}\n",
        ]);
        let (outcome, printed) = exchange_output(transport, "m").await;
        assert!(matches!(outcome, ExchangeOutcome::Closed));
        assert_eq!(printed, "Agent: ok\n");
    }

    #[tokio::test]
    async fn close_discards_remaining_data() {
        let transport = CannedTransport::default().respond(&[
            "{\"textResponse\": \"a\", \"close\": true}\n{\"textResponse\": \"b\"}\n",
        ]);
        let (outcome, printed) = exchange_output(transport, "m").await;
        assert!(matches!(outcome, ExchangeOutcome::Closed));
        assert_eq!(printed, "Agent: a\n");
    }

    #[tokio::test]
    async fn stream_end_without_close_is_silent() {
        let transport = CannedTransport::default().respond(&["{\"textResponse\": \"Hi\"}\n"]);
        let (outcome, printed) = exchange_output(transport, "m").await;
        assert!(matches!(outcome, ExchangeOutcome::Ended));
        assert!(outcome.is_success());
        assert_eq!(printed, "Agent: Hi");
    }

    #[tokio::test]
    async fn connection_error_is_reported() {
        let transport = CannedTransport::default().fail(Error::connection("refused", None));
        let (outcome, printed) = exchange_output(transport, "m").await;
        assert!(matches!(outcome, ExchangeOutcome::RequestFailed(_)));
        assert_eq!(printed, "Agent: Request error: Connection error: refused\n");
    }

    #[tokio::test]
    async fn mid_stream_failure_is_a_request_error() {
        let mut session = ChatSession::with_transport(ResetTransport, &config());
        let mut renderer = renderer();
        let outcome = session.exchange("m", &mut renderer).await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::RequestFailed(_)));
        assert_eq!(
            output(renderer),
            "Agent: partialRequest error: Streaming error: connection reset\n"
        );
    }

    /// Sends one fragment, then fails the connection.
    struct ResetTransport;

    #[async_trait::async_trait]
    impl ChatTransport for ResetTransport {
        async fn open(&self, _: &ChatRequest) -> Result<ByteStream> {
            Ok(Box::pin(stream::iter(vec![
                Ok(Bytes::from_static(b"{\"textResponse\": \"partial\"}\n")),
                Err(Error::streaming("connection reset", None)),
            ])))
        }
    }

    #[tokio::test]
    async fn uninterpretable_fragment_is_a_decode_error() {
        let transport = CannedTransport::default().respond(&[
            "{\"textResponse\": \"a\"}\n",
            "data: {\"textResponse\": [\"b\"]}\n",
            "{\"textResponse\": \"zzz\", \"close\": true}\n",
        ]);
        let (outcome, printed) = exchange_output(transport, "m").await;
        assert!(matches!(outcome, ExchangeOutcome::DecodeFailed(_)));
        assert!(
            printed.starts_with("Agent: aError processing chunk: Serialization error: "),
            "{printed}"
        );
        assert!(!printed.contains("zzz"));
    }

    #[tokio::test]
    async fn oversized_line_is_a_decode_error() {
        let transport = CannedTransport::default()
            .respond(&["data: {\"textResponse\": \"", "xxxxxxxxxxxxxxxxxxxxxxxx"]);
        let mut session =
            ChatSession::with_transport(transport, &config().with_max_line_bytes(16));
        let mut renderer = renderer();
        let outcome = session.exchange("m", &mut renderer).await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::DecodeFailed(_)));
        assert!(
            output(renderer).starts_with("Agent: Error processing chunk: Encoding error: ")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_server_times_out() {
        let mut session = ChatSession::with_transport(SilentTransport, &config());
        let mut renderer = renderer();
        let outcome = session.exchange("m", &mut renderer).await.unwrap();
        match outcome {
            ExchangeOutcome::RequestFailed(err) => assert!(err.is_timeout()),
            other => panic!("unexpected outcome {other}"),
        }
        assert!(output(renderer).starts_with("Agent: Request error: Timeout error: "));
    }

    #[tokio::test]
    async fn repeated_messages_are_independent() {
        let transport = CannedTransport::default()
            .respond(&["{\"textResponse\": \"one\"}\n{\"textResponse\": \"dangl"])
            .respond(&["ing\"}\n{\"textResponse\": \"two\", \"close\": true}\n"]);
        let mut session = ChatSession::with_transport(transport, &config());
        let mut renderer = renderer();
        let first = session.exchange("same", &mut renderer).await.unwrap();
        let second = session.exchange("same", &mut renderer).await.unwrap();
        assert!(matches!(first, ExchangeOutcome::Ended));
        assert!(matches!(second, ExchangeOutcome::Closed));
        assert_eq!(output(renderer), "Agent: oneAgent: two\n");
        let requests = session.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn exit_words_send_nothing() {
        for word in ["exit", "QUIT", "q", "Stop", "bYe"] {
            let mut session = ChatSession::with_transport(CannedTransport::default(), &config());
            let mut input = ScriptedReader::new(&[word, "never read"]);
            let mut renderer = renderer();
            session.run(&mut input, &mut renderer).await.unwrap();
            assert_eq!(output(renderer), "Exiting chat. Goodbye!\n");
            assert!(session.transport().requests().is_empty());
            assert_eq!(session.exchange_count(), 0);
            assert_eq!(input.prompts, 1);
        }
    }

    #[tokio::test]
    async fn loop_continues_after_failures() {
        let transport = CannedTransport::default()
            .fail(Error::connection("refused", None))
            .respond(&["[1]\n"])
            .respond(&[HI_THERE]);
        let mut session = ChatSession::with_transport(transport, &config());
        let mut input = ScriptedReader::new(&["first", "", "third", "bye"]);
        let mut renderer = renderer();
        session.run(&mut input, &mut renderer).await.unwrap();

        let printed = output(renderer);
        assert!(printed.starts_with(
            "\nAgent: Request error: Connection error: refused\n\nAgent: Error processing chunk: "
        ));
        assert!(printed.ends_with("\nAgent: Hi there\nExiting chat. Goodbye!\n"));
        let messages: Vec<_> = session
            .transport()
            .requests()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec!["first", "", "third"]);
    }

    #[tokio::test]
    async fn end_of_input_exits_cleanly() {
        let mut session = ChatSession::with_transport(CannedTransport::default(), &config());
        let mut input = ScriptedReader::new(&[]);
        let mut renderer = renderer();
        session.run(&mut input, &mut renderer).await.unwrap();
        assert_eq!(output(renderer), "\nExiting chat. Goodbye!\n");
    }

    #[tokio::test]
    async fn output_failure_is_fatal() {
        let transport = CannedTransport::default().respond(&[HI_THERE]);
        let mut session = ChatSession::with_transport(transport, &config());
        let mut renderer = PlainTextRenderer::with_writer(BrokenPipe, false);
        let err = session.exchange("m", &mut renderer).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        let transport = CannedTransport::default().respond(&[HI_THERE]);
        let mut session = ChatSession::with_transport(transport, &config());
        let mut input = ScriptedReader::new(&["hello", "bye"]);
        let mut renderer = PlainTextRenderer::with_writer(BrokenPipe, false);
        assert!(session.run(&mut input, &mut renderer).await.is_err());
        assert_eq!(input.prompts, 1);
    }

    #[tokio::test]
    async fn logger_sees_the_exchange() {
        let logger = Arc::new(RecordingLogger::default());
        let transport = CannedTransport::default().respond(&[HI_THERE]);
        let mut session =
            ChatSession::with_transport(transport, &config()).with_logger(logger.clone());
        let mut renderer = renderer();
        session.exchange("hello", &mut renderer).await.unwrap();
        assert_eq!(
            *logger.events.lock().unwrap(),
            vec![
                "request hello".to_string(),
                "fragment Hi".to_string(),
                "fragment  there".to_string(),
                "outcome closed".to_string(),
            ]
        );
    }
}
