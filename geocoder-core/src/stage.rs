//! The pipeline stage contract (Design Notes §9): replaces stream-transform
//! inheritance with a plain interface a driver composes externally, so each
//! stage is unit-testable on its own.

use crate::query::Query;
use crate::GeocoderResult;

/// A record-in / record-out transform. Most stages return exactly one
/// `Query`; step 3's finalizer and fuzzy trie lookups may fan a record out
/// into several candidates for a later stage to narrow.
pub trait Stage {
    fn name(&self) -> &'static str;

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>>;
}
