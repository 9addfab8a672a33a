//! Step 6 — patch rewrite: a curated, ordered list of side-effect-free
//! `(pattern, replacement)` rewrites for known data-source glitches.

use geocoder_core::{GeocoderResult, Query, Stage};
use regex::Regex;

pub struct PatchStage {
    patches: Vec<(Regex, String)>,
}

impl PatchStage {
    pub fn new(patches: Vec<(Regex, String)>) -> Self {
        PatchStage { patches }
    }
}

impl Stage for PatchStage {
    fn name(&self) -> &'static str {
        "patches"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        let mut q = query;
        for (re, replacement) in &self.patches {
            q.temp_address = q.temp_address.replace_all(re, replacement);
        }
        Ok(vec![q])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_patches_in_order() {
        let patches = vec![
            (Regex::new("大字").unwrap(), String::new()),
            (Regex::new("ノ").unwrap(), "の".to_string()),
        ];
        let stage = PatchStage::new(patches);
        let q = Query::new(0, "大字丸ノ内");
        let out = stage.process(q).unwrap();
        assert_eq!(out[0].temp_address.as_string(), "丸の内");
    }
}
