//! The fabric's request/response types: a `DownloadRequest` is a URL plus the
//! content hash used both as its cache key and as a stable identity across
//! retries (component design §4.4, external interfaces §6).

/// A single unit of work submitted to the [`crate::DownloadFabric`]. The CKAN
/// resource-listing call (kept outside the fabric's concern per §6) is
/// responsible for resolving a dataset entry down to this URL + hash pair.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub content_hash: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, content_hash: impl Into<String>) -> Self {
        DownloadRequest {
            url: url.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// A successful fetch, either freshly downloaded or served from the local
/// content-addressed cache.
#[derive(Debug, Clone)]
pub struct DownloadPayload {
    pub url: String,
    pub bytes: Vec<u8>,
    pub from_cache: bool,
}

/// Surfaced downstream when a task exhausts its retries (§7: download
/// failures are retried with backoff and never fatal to the stream).
#[derive(Debug, Clone, thiserror::Error)]
#[error("download failed for {url} after {attempts} attempt(s): {message}")]
pub struct DownloadProcessError {
    pub url: String,
    pub message: String,
    pub attempts: u32,
}

/// A sum-typed stream element (Design Notes §9: replaces exception-based flow
/// for download failure) rather than a `Result` the caller must `?`-propagate
/// — a failed download is expected output, not a fault in the fabric itself.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Ok(DownloadPayload),
    Err(DownloadProcessError),
}

impl DownloadOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, DownloadOutcome::Ok(_))
    }
}
