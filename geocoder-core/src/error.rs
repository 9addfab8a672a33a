use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a [`GeocoderError`]. Mirrors the kind+source shape used
/// throughout the crate family this engine is built from: a fatal/retryable
/// split is made by the caller, not by the kind itself.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum GeocoderErrorKind {
    /// Bad CLI arguments or configuration.
    Args,
    /// Missing data directory or reference store.
    NotFound,
    /// The reference store exists but is unreadable or has the wrong schema.
    Dictionary,
    /// A trie terminal carried no info, or another internal index invariant broke.
    Corrupt,
    /// I/O failure reading input lines or the reference store.
    Io,
    /// A download task exhausted its retries.
    Download,
    /// A downloaded reference-data row could not be turned into a typed
    /// dictionary row (wrong column count, unparsable field) while
    /// hydrating the reference store.
    Load,
    /// Failed to parse a line, a patch rule, or a config file.
    Parse,
}

impl GeocoderErrorKind {
    pub fn with_error<E>(self, source: E) -> GeocoderError
    where
        anyhow::Error: From<E>,
    {
        GeocoderError {
            kind: self,
            source: From::from(source),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("GeocoderError(kind={kind:?}, source={source})")]
pub struct GeocoderError {
    pub kind: GeocoderErrorKind,
    #[source]
    source: anyhow::Error,
}

impl GeocoderError {
    pub fn add_context<C>(self, ctx: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        GeocoderError {
            kind: self.kind,
            source: self.source.context(ctx),
        }
    }

    pub fn kind(&self) -> GeocoderErrorKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind() {
        let err = GeocoderErrorKind::NotFound.with_error(anyhow::anyhow!("no data dir"));
        let rendered = format!("{err}");
        assert!(rendered.contains("NotFound"));
        assert!(rendered.contains("no data dir"));
    }

    #[test]
    fn load_kind_is_distinct_from_dictionary() {
        let load = GeocoderErrorKind::Load.with_error(anyhow::anyhow!("bad column count"));
        assert_eq!(load.kind(), GeocoderErrorKind::Load);
        assert_ne!(load.kind(), GeocoderErrorKind::Dictionary);
    }

    #[test]
    fn add_context_preserves_kind() {
        let err = GeocoderErrorKind::Parse
            .with_error(anyhow::anyhow!("bad line"))
            .add_context("while reading line 3");
        assert_eq!(err.kind(), GeocoderErrorKind::Parse);
        assert!(format!("{err}").contains("bad line"));
    }
}
