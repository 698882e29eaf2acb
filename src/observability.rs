use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("ragline.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("ragline.client.request_errors");

pub(crate) static STREAM_DELTAS: Counter = Counter::new("ragline.stream.deltas");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("ragline.stream.malformed_chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("ragline.stream.errors");
pub(crate) static RECOVERED_DISCONNECTS: Counter =
    Counter::new("ragline.stream.recovered_disconnects");

pub(crate) static CHAT_TURNS: Counter = Counter::new("ragline.chat.turns");
pub(crate) static CHAT_TURN_DURATION: Moments =
    Moments::new("ragline.chat.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_DELTAS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&RECOVERED_DISCONNECTS);

    collector.register_counter(&CHAT_TURNS);
    collector.register_moments(&CHAT_TURN_DURATION);
}
