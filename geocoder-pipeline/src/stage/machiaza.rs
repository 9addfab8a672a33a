//! Step 5 — ōaza/machiaza refinement: trie lookup against the town table
//! scoped by `(pref_key, city_key)`, followed by a second regex pass over
//! whatever the trie left unmatched to pick up a chōme number the row
//! itself didn't carry (the overview calls this stage "a second regex pass
//! after DB lookup"). Tokyo's 23 special wards get a dedicated trie because
//! their naming is globally ambiguous and must be pinned by
//! `pref == 東京都`.

use geocoder_core::dictionary::TownMatchingInfo;
use geocoder_core::{FindParams, GeocoderResult, MatchLevel, Query, Stage, TrieAddressFinder};
use once_cell::sync::Lazy;
use regex::Regex;

const VIRTUAL_SUFFIXES: [char; 4] = ['区', '町', '市', '村'];

static CHOME_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(丁目)?").unwrap());
static OAZA_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(大字|字)").unwrap());

pub struct MachiazaStage {
    town_trie: TrieAddressFinder<TownMatchingInfo>,
    tokyo23_trie: TrieAddressFinder<TownMatchingInfo>,
    fuzzy: Option<char>,
}

impl MachiazaStage {
    pub fn new(
        town_trie: TrieAddressFinder<TownMatchingInfo>,
        tokyo23_trie: TrieAddressFinder<TownMatchingInfo>,
    ) -> Self {
        MachiazaStage {
            town_trie,
            tokyo23_trie,
            fuzzy: None,
        }
    }

    pub fn with_fuzzy(mut self, fuzzy: Option<char>) -> Self {
        self.fuzzy = fuzzy;
        self
    }
}

impl Stage for MachiazaStage {
    fn name(&self) -> &'static str {
        "machiaza"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        if query.match_level >= MatchLevel::Machiaza {
            return Ok(vec![query]);
        }
        let Some(city_key) = query.city_key.clone() else {
            return Ok(vec![query]);
        };

        let use_tokyo23 = query.pref.as_deref() == Some("東京都");
        let trie = if use_tokyo23 {
            &self.tokyo23_trie
        } else {
            &self.town_trie
        };

        // "大字"/"字" precede the ōaza name itself and never appear in the
        // town table's keys, so they're dropped from the lookup target only.
        let search_target = query.temp_address.replace_all(&OAZA_MARKER, "");

        let hit = trie
            .find(FindParams {
                target: &search_target,
                extra_challenges: &VIRTUAL_SUFFIXES,
                partial_matches: false,
                fuzzy: self.fuzzy,
            })?
            .into_iter()
            .filter(|m| m.info.city_key == city_key)
            .max_by_key(|m| m.depth)
            .map(|m| (m.info.clone(), m.depth));

        let Some((info, depth)) = hit else {
            return Ok(vec![query]);
        };
        log::trace!("machiaza: matched town_key={} at depth {}", info.town_key, depth);

        let marker_len = query.temp_address.char_len() - search_target.char_len();
        let mut q = query;
        q.town_key = Some(info.town_key.clone());
        q.oaza_cho = info.oaza_cho.clone();
        q.chome = info.chome.clone();
        q.koaza = info.koaza.clone();
        q.machiaza_id = Some(info.machiaza_id.clone());
        q.match_level = if info.chome.is_some() || info.koaza.is_some() {
            MatchLevel::MachiazaDetail
        } else {
            MatchLevel::Machiaza
        };
        q.matched_cnt += marker_len + depth;
        q.temp_address = q.temp_address.tail(marker_len + depth);

        if let (Some(lat), Some(lon)) = (info.rep_lat, info.rep_lon) {
            if q.coordinate_level < q.match_level {
                q.rep_lat = Some(lat);
                q.rep_lon = Some(lon);
                q.coordinate_level = q.match_level;
            }
        }

        // The matched row was an ōaza-level entry with no chōme of its own;
        // a second regex pass picks up a trailing chōme number the trie
        // couldn't see (e.g. "丸の内1" where the row only carries "丸の内").
        if q.chome.is_none() && q.koaza.is_none() {
            let text = q.temp_address.as_string();
            if let Some(caps) = CHOME_SUFFIX.captures(&text) {
                let whole = caps.get(0).unwrap();
                let number = caps.get(1).unwrap().as_str().to_string();
                let consumed = whole.as_str().chars().count();
                q.chome = Some(number);
                q.match_level = MatchLevel::MachiazaDetail;
                q.matched_cnt += consumed;
                q.temp_address = q.temp_address.tail(consumed);
            }
        }

        Ok(vec![q])
    }
}
