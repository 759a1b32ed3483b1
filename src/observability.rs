use biometrics::{Collector, Counter, Moments};

pub(crate) static EXCHANGES: Counter = Counter::new("workspace_chat.exchanges");
pub(crate) static EXCHANGES_CLOSED: Counter = Counter::new("workspace_chat.exchanges_closed");
pub(crate) static REQUEST_ERRORS: Counter = Counter::new("workspace_chat.request_errors");
pub(crate) static DECODE_ERRORS: Counter = Counter::new("workspace_chat.decode_errors");
pub(crate) static EXCHANGE_DURATION: Moments =
    Moments::new("workspace_chat.exchange_duration_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("workspace_chat.stream.fragments");
pub(crate) static SKIPPED_LINES: Counter = Counter::new("workspace_chat.stream.skipped_lines");
pub(crate) static STREAM_BYTES: Counter = Counter::new("workspace_chat.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("workspace_chat.stream.ttfb_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&EXCHANGES);
    collector.register_counter(&EXCHANGES_CLOSED);
    collector.register_counter(&REQUEST_ERRORS);
    collector.register_counter(&DECODE_ERRORS);
    collector.register_moments(&EXCHANGE_DURATION);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&SKIPPED_LINES);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
}
