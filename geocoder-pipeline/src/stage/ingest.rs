//! Step 1 — ingest normalization: width folding, whitespace canonicalization,
//! leading zip-code stripping, then the four normalization helpers
//! (hiragana, kan2num, jis-kanji, suffix-strip) so `tempAddress` starts out
//! equal to the fully normalized input, as the data model in `geocoder-core`
//! specifies. Never touches `match_level`.

use geocoder_core::normalize::normalize_chain;
use geocoder_core::{GeocoderResult, Query, Stage};
use once_cell::sync::Lazy;
use regex::Regex;

static ZIP_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^〒\d{3}-?\d{4}\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\u{3000}]+").unwrap());

fn fold_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

#[derive(Default)]
pub struct IngestStage;

impl IngestStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for IngestStage {
    fn name(&self) -> &'static str {
        "ingest"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        let mut q = query;
        let folded = q.temp_address.map_chars(fold_width);
        let unzipped = folded.replace_all(&ZIP_CODE, "");
        let collapsed = unzipped.replace_all(&WHITESPACE, "");
        q.temp_address = normalize_chain(&collapsed);
        Ok(vec![q])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_zip_code() {
        let stage = IngestStage::new();
        let q = Query::new(0, "〒100-0001 東京都千代田区");
        let out = stage.process(q).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].temp_address.as_string(), "東京都千代田区");
        assert_eq!(out[0].match_level, geocoder_core::MatchLevel::Unknown);
    }

    #[test]
    fn collapses_whitespace_folds_width_and_normalizes() {
        let stage = IngestStage::new();
        let q = Query::new(0, "東京都 千代田区\t丸ノ内 1");
        let out = stage.process(q).unwrap();
        // Whitespace is gone and the katakana particle folds to hiragana.
        assert_eq!(out[0].temp_address.as_string(), "東京都千代田区丸の内1");
    }

    #[test]
    fn is_idempotent() {
        let stage = IngestStage::new();
        let once = stage.process(Query::new(0, "〒100-0001 東京都")).unwrap();
        let twice = stage.process(once[0].clone()).unwrap();
        assert_eq!(once[0].temp_address.as_string(), twice[0].temp_address.as_string());
    }
}
