use thiserror::Error;

/// A source produced no usable data. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no stream chunks found in page")]
    NoChunks,

    #[error("[{domain}] no {what} found in payload")]
    MissingData {
        domain: &'static str,
        what: &'static str,
    },
}
