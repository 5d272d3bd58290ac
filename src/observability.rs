use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("parley.stream.chunks");
pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_EMPTY: Counter = Counter::new("parley.stream.empty");
pub(crate) static STREAM_DURATION: Moments = Moments::new("parley.stream.duration_seconds");

pub(crate) static AUTH_LOGINS: Counter = Counter::new("parley.auth.logins");
pub(crate) static AUTH_NOTICES: Counter = Counter::new("parley.auth.notices");
pub(crate) static UPLOADS: Counter = Counter::new("parley.upload.files");
pub(crate) static UPLOAD_BYTES: Counter = Counter::new("parley.upload.bytes");
pub(crate) static HISTORY_LOADS: Counter = Counter::new("parley.history.loads");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_EMPTY);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&AUTH_LOGINS);
    collector.register_counter(&AUTH_NOTICES);
    collector.register_counter(&UPLOADS);
    collector.register_counter(&UPLOAD_BYTES);
    collector.register_counter(&HISTORY_LOADS);
}
