//! The CKAN dataset-resource listing client (out of scope for the core
//! engine per spec.md §1, implemented at interface depth per SPEC_FULL.md
//! §6). Resolves a `--resource-id` to the `DownloadRequest`s the download
//! fabric actually fetches; HTTP specifics live here so the fabric only ever
//! sees a URL + content hash.

use serde::Deserialize;

use geocoder_core::{GeocoderErrorKind, GeocoderResult};
use geocoder_download::DownloadRequest;

const CKAN_ACTION_PATH: &str = "/api/3/action/package_show";

#[derive(Debug, Deserialize)]
struct PackageShowResponse {
    result: PackageResult,
}

#[derive(Debug, Deserialize)]
struct PackageResult {
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    url: String,
    #[serde(default)]
    hash: String,
}

pub struct CkanClient {
    base_url: String,
    agent: ureq::Agent,
}

impl CkanClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        CkanClient {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    /// Lists the download requests for every resource attached to
    /// `resource_id`'s package. A resource lacking a published hash falls
    /// back to hashing its own URL, so it still has a stable cache key.
    pub fn list_resources(&self, resource_id: &str) -> GeocoderResult<Vec<DownloadRequest>> {
        let endpoint = format!("{}{}", self.base_url, CKAN_ACTION_PATH);
        let response = self
            .agent
            .get(&endpoint)
            .query("id", resource_id)
            .call()
            .map_err(|e| GeocoderErrorKind::Download.with_error(anyhow::anyhow!(e.to_string())))?;
        let parsed: PackageShowResponse = response
            .into_json()
            .map_err(|e| GeocoderErrorKind::Parse.with_error(e))?;

        Ok(parsed
            .result
            .resources
            .into_iter()
            .map(|r| {
                let hash = if r.hash.is_empty() {
                    fallback_hash(&r.url)
                } else {
                    r.hash
                };
                DownloadRequest::new(r.url, hash)
            })
            .collect())
    }
}

/// A stable, process-independent hash for resources CKAN doesn't publish a
/// checksum for. Same FNV-1a construction as the reference-store keys in
/// `geocoder_core::dictionary` (spec.md §6: keys are pure functions of their
/// inputs, stable across runs).
fn fallback_hash(url: &str) -> String {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in url.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_hash_is_stable_for_the_same_url() {
        assert_eq!(fallback_hash("https://example.invalid/a.zip"), fallback_hash("https://example.invalid/a.zip"));
    }
}
