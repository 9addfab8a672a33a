//! Step 4 — secondary city recovery: catches cities step 3 missed, via
//! looser patterns that tolerate an absent administrative suffix. Only
//! applies to records that step 3 left below `City`.

use geocoder_core::dictionary::CityPattern;
use geocoder_core::{GeocoderResult, MatchLevel, Query, Stage};
use regex::Regex;

pub struct CityRecoveryStage {
    patterns: Vec<(Regex, CityPattern)>,
}

impl CityRecoveryStage {
    pub fn new(patterns: Vec<(Regex, CityPattern)>) -> Self {
        CityRecoveryStage { patterns }
    }
}

impl Stage for CityRecoveryStage {
    fn name(&self) -> &'static str {
        "city_recovery"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        if query.match_level >= MatchLevel::City {
            return Ok(vec![query]);
        }

        let text = query.temp_address.as_string();
        let hit = self
            .patterns
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
                Some((info.clone(), text[..m.end()].chars().count()))
            });

        let Some((info, depth)) = hit else {
            return Ok(vec![query]);
        };

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

    #[test]
    fn recovers_city_without_trailing_suffix() {
        let info = CityPattern {
            city_key: "131016".to_string(),
            pref_key: "13".to_string(),
            lg_code: "131016".to_string(),
            pref: "東京都".to_string(),
            county: None,
            city: "千代田".to_string(),
            ward: None,
        };
        let stage = CityRecoveryStage::new(vec![(Regex::new("^千代田").unwrap(), info)]);

        let mut q = Query::new(0, "千代田丸の内");
        q.pref_key = Some("13".to_string());
        let out = stage.process(q).unwrap();
        assert_eq!(out[0].match_level, MatchLevel::City);
        assert_eq!(out[0].temp_address.as_string(), "丸の内");
    }

    #[test]
    fn skips_records_already_at_city_or_above() {
        let stage = CityRecoveryStage::new(vec![]);
        let mut q = Query::new(0, "x");
        q.match_level = MatchLevel::City;
        let out = stage.process(q.clone()).unwrap();
        assert_eq!(out[0].city_key, q.city_key);
    }
}
