//! Step 3 — city/ward detection. Internally two lookup strategies (regex
//! patterns per prefecture, and a trie-backed table lookup) whose best
//! candidate is merged by a finalizer, folded into one `Stage` so the
//! driver's linear record flow still holds: both strategies run over the
//! *same* incoming record rather than chaining into each other.

use geocoder_core::dictionary::CityPattern;
use geocoder_core::{FindParams, GeocoderResult, MatchLevel, Query, Stage, TrieAddressFinder};
use regex::Regex;

const VIRTUAL_SUFFIXES: [char; 4] = ['市', '区', '町', '村'];

pub struct CityStage {
    patterns: Vec<(Regex, CityPattern)>,
    trie: TrieAddressFinder<CityPattern>,
    fuzzy: Option<char>,
}

impl CityStage {
    pub fn new(patterns: Vec<(Regex, CityPattern)>, trie: TrieAddressFinder<CityPattern>) -> Self {
        CityStage {
            patterns,
            trie,
            fuzzy: None,
        }
    }

    /// Threads the CLI's `--fuzzy <char>` flag (spec.md §6) through to the
    /// trie lookup, letting one wildcard character substitute for any
    /// single character of the target per stage.
    pub fn with_fuzzy(mut self, fuzzy: Option<char>) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// 3a — regex patterns per prefecture.
    fn apply_patterns(&self, query: &Query) -> Option<(CityPattern, usize)> {
        let text = query.temp_address.as_string();
        self.patterns
            .iter()
            .filter(|(_, info)| {
                query
                    .pref_key
                    .as_deref()
                    .map_or(true, |pk| info.pref_key == pk)
            })
            .find_map(|(re, info)| {
                let m = re.find(&text)?;
                if m.start() != 0 {
                    return None;
                }
                let depth = text[..m.end()].chars().count();
                Some((info.clone(), depth))
            })
    }

    /// 3b — trie lookup against the city table, scoped to the already
    /// resolved prefecture when known, global otherwise.
    fn apply_trie(&self, query: &Query) -> GeocoderResult<Option<(CityPattern, usize)>> {
        let matches = self.trie.find(FindParams {
            target: &query.temp_address,
            extra_challenges: &VIRTUAL_SUFFIXES,
            partial_matches: false,
            fuzzy: self.fuzzy,
        })?;
        Ok(matches
            .into_iter()
            .filter(|m| {
                query
                    .pref_key
                    .as_deref()
                    .map_or(true, |pk| m.info.pref_key == pk)
            })
            .max_by_key(|m| m.depth)
            .map(|m| (m.info.clone(), m.depth)))
    }
}

impl Stage for CityStage {
    fn name(&self) -> &'static str {
        "city"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        if query.match_level >= MatchLevel::City {
            return Ok(vec![query]);
        }

        let pattern_hit = self.apply_patterns(&query);
        let trie_hit = self.apply_trie(&query)?;

        // 3-final: highest matched_cnt wins; a pattern hit breaks a depth
        // tie since it was hand-curated for this exact prefecture.
        let winner = match (pattern_hit, trie_hit) {
            (Some(p), Some(t)) if t.1 > p.1 => Some(t),
            (Some(p), _) => Some(p),
            (None, t) => t,
        };

        let Some((info, depth)) = winner else {
            return Ok(vec![query]);
        };
        log::trace!("city: matched {} at depth {}", info.city, depth);

        let mut q = query;
        q.pref_key = Some(info.pref_key.clone());
        q.city_key = Some(info.city_key.clone());
        q.lg_code = Some(info.lg_code.clone());
        q.pref = Some(info.pref.clone());
        q.county = info.county.clone();
        q.city = Some(info.city.clone());
        q.ward = info.ward.clone();
        q.match_level = MatchLevel::City;
        q.matched_cnt += depth;
        q.temp_address = q.temp_address.tail(depth);
        Ok(vec![q])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chiyoda() -> CityPattern {
        CityPattern {
            city_key: "131016".to_string(),
            pref_key: "13".to_string(),
            lg_code: "131016".to_string(),
            pref: "東京都".to_string(),
            county: None,
            city: "千代田区".to_string(),
            ward: None,
        }
    }

    #[test]
    fn trie_lookup_resolves_city() {
        let mut trie = TrieAddressFinder::new();
        trie.append("千代田区", chiyoda());
        let stage = CityStage::new(vec![], trie);

        let mut q = Query::new(0, "千代田区丸の内一丁目");
        q.pref_key = Some("13".to_string());
        q.match_level = MatchLevel::Prefecture;

        let out = stage.process(q).unwrap();
        assert_eq!(out[0].city.as_deref(), Some("千代田区"));
        assert_eq!(out[0].match_level, MatchLevel::City);
        assert_eq!(out[0].temp_address.as_string(), "丸の内一丁目");
    }

    #[test]
    fn pattern_hit_wins_tie_over_trie() {
        let pattern = (Regex::new("^千代田区").unwrap(), chiyoda());
        let mut trie = TrieAddressFinder::new();
        trie.append("千代田区", chiyoda());
        let stage = CityStage::new(vec![pattern], trie);

        let mut q = Query::new(0, "千代田区丸の内");
        q.pref_key = Some("13".to_string());
        let out = stage.process(q).unwrap();
        assert_eq!(out[0].match_level, MatchLevel::City);
    }
}
