use sequin_events::Triple;

#[derive(Debug, thiserror::Error)]
pub enum StressError {
    #[error("reader {reader} observed a torn snapshot {snapshot:?}")]
    Torn { reader: usize, snapshot: Triple },

    #[error("reader {reader} went backwards: a = {previous} then a = {observed}")]
    Regressed {
        reader: usize,
        previous: usize,
        observed: usize,
    },

    #[error("reader {0} panicked")]
    ReaderPanicked(usize),

    #[error("smoke check failed: {0}")]
    Smoke(String),
}
