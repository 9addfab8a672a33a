//! Step 2 — prefecture detection: a compiled list of
//! `^<pref>(都|道|府|県)?` patterns, plus a same-named-prefecture fallback
//! for addresses that omit the true prefecture but carry a county/city name
//! unique enough to infer it.

use geocoder_core::dictionary::PrefectureInfo;
use geocoder_core::{GeocoderResult, MatchLevel, Query, Stage};
use regex::Regex;

pub struct PrefectureStage {
    primary: Vec<(Regex, PrefectureInfo)>,
    same_named: Vec<(Regex, PrefectureInfo)>,
}

impl PrefectureStage {
    /// `prefectures` drives the primary anchored pattern set; one pattern is
    /// compiled per entry from its bare name (with any trailing 都/道/府/県
    /// made optional). `same_named` is a secondary pattern set tried only
    /// when the primary set finds nothing at position zero — each entry's
    /// regex should already include the disambiguating county/city text
    /// that makes the inference safe (e.g. `^石川郡石川町` for 福島県).
    pub fn new(prefectures: Vec<PrefectureInfo>, same_named: Vec<(Regex, PrefectureInfo)>) -> Self {
        let primary = prefectures
            .into_iter()
            .map(|info| {
                let bare = info
                    .pref
                    .trim_end_matches(['都', '道', '府', '県'])
                    .to_string();
                let pattern = format!("^{}(都|道|府|県)?", regex::escape(&bare));
                (Regex::new(&pattern).expect("prefecture pattern always compiles"), info)
            })
            .collect();
        PrefectureStage { primary, same_named }
    }
}

impl Stage for PrefectureStage {
    fn name(&self) -> &'static str {
        "prefecture"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        if query.match_level >= MatchLevel::Prefecture {
            log::debug!("prefecture: already resolved, passing through seq={}", query.seq);
            return Ok(vec![query]);
        }

        let text = query.temp_address.as_string();

        // `same_named` is tried first: its patterns are curated to include
        // the disambiguating county/city text (e.g. `^石川郡石川町`), so a
        // match here is strictly more specific than a bare primary pattern
        // like Ishikawa's `^石川(都|道|府|県)?` would be against the same
        // input — trying primary first would let the generic pattern win
        // and make the fallback permanently unreachable.
        for (re, info) in self.same_named.iter().chain(self.primary.iter()) {
            if let Some(m) = re.find(&text) {
                if m.start() != 0 {
                    continue;
                }
                let depth = text[..m.end()].chars().count();
                let mut q = query;
                q.pref_key = Some(info.pref_key.clone());
                q.pref = Some(info.pref.clone());
                q.lg_code = Some(info.lg_code.clone());
                q.match_level = MatchLevel::Prefecture;
                q.matched_cnt += depth;
                q.temp_address = q.temp_address.tail(depth);
                return Ok(vec![q]);
            }
        }

        Ok(vec![query])
    }
}
