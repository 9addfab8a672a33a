//! The record that flows through the pipeline.

use std::time::{Duration, Instant};

use crate::char_node::CharChain;

/// How specifically an address has been resolved. Variants are declared in
/// resolution order so `#[derive(PartialOrd, Ord)]` gives the comparison the
/// pipeline needs directly (`query.match_level >= Stage::target_level()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchLevel {
    Unknown,
    Prefecture,
    City,
    Machiaza,
    MachiazaDetail,
    ResidentialBlock,
    ResidentialDetail,
    Parcel,
}

impl MatchLevel {
    pub fn label(self) -> &'static str {
        match self {
            MatchLevel::Unknown => "UNKNOWN",
            MatchLevel::Prefecture => "PREFECTURE",
            MatchLevel::City => "CITY",
            MatchLevel::Machiaza => "MACHIAZA",
            MatchLevel::MachiazaDetail => "MACHIAZA_DETAIL",
            MatchLevel::ResidentialBlock => "RESIDENTIAL_BLOCK",
            MatchLevel::ResidentialDetail => "RESIDENTIAL_DETAIL",
            MatchLevel::Parcel => "PARCEL",
        }
    }
}

impl Default for MatchLevel {
    fn default() -> Self {
        MatchLevel::Unknown
    }
}

/// `coordinate_level` lives in the same ordinal space as [`MatchLevel`]: the
/// level at which `(rep_lat, rep_lon)` were attached.
pub type CoordinateLevel = MatchLevel;

/// The unit traversing the pipeline. Immutable by convention: every stage
/// takes a `Query` by value and returns freshly built copies, never mutating
/// a record once it has left its originating stage (§5 of the design).
#[derive(Debug, Clone)]
pub struct Query {
    pub input: String,
    pub temp_address: CharChain,
    pub match_level: MatchLevel,
    pub coordinate_level: CoordinateLevel,

    pub pref_key: Option<String>,
    pub city_key: Option<String>,
    pub town_key: Option<String>,
    pub parcel_key: Option<String>,
    pub rsdtblk_key: Option<String>,
    pub rsdtdsp_key: Option<String>,

    pub lg_code: Option<String>,
    pub pref: Option<String>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub ward: Option<String>,
    pub oaza_cho: Option<String>,
    pub chome: Option<String>,
    pub koaza: Option<String>,
    pub machiaza_id: Option<String>,

    pub block: Option<String>,
    pub block_id: Option<String>,
    pub rsdt_num: Option<String>,
    pub rsdt_id: Option<String>,
    pub rsdt_num2: Option<String>,
    pub rsdt2_id: Option<String>,
    pub rsdt_addr_flg: Option<bool>,

    pub prc_num1: Option<String>,
    pub prc_num2: Option<String>,
    pub prc_num3: Option<String>,
    pub prc_id: Option<String>,

    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,

    pub matched_cnt: usize,
    pub start_time: Instant,
    /// Sequence number attached at ingest so an order-agnostic downstream
    /// consumer (e.g. one racing the download fabric) can restore submission
    /// order; not part of spec.md's data model, added as ambient I/O framing.
    pub seq: u64,
}

impl Query {
    /// A fresh record for one input line. `temp_address` starts out equal to
    /// the raw line; ingest normalization (Step 1) rewrites it in place.
    pub fn new(seq: u64, input: impl Into<String>) -> Self {
        let input = input.into();
        let temp_address = CharChain::from_str(&input);
        Query {
            input,
            temp_address,
            match_level: MatchLevel::Unknown,
            coordinate_level: MatchLevel::Unknown,
            pref_key: None,
            city_key: None,
            town_key: None,
            parcel_key: None,
            rsdtblk_key: None,
            rsdtdsp_key: None,
            lg_code: None,
            pref: None,
            county: None,
            city: None,
            ward: None,
            oaza_cho: None,
            chome: None,
            koaza: None,
            machiaza_id: None,
            block: None,
            block_id: None,
            rsdt_num: None,
            rsdt_id: None,
            rsdt_num2: None,
            rsdt2_id: None,
            rsdt_addr_flg: None,
            prc_num1: None,
            prc_num2: None,
            prc_num3: None,
            prc_id: None,
            rep_lat: None,
            rep_lon: None,
            matched_cnt: 0,
            start_time: Instant::now(),
            seq,
        }
    }

    pub fn level_label(&self) -> &'static str {
        self.match_level.label()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Checks the invariants from the data model (Q1, Q2); used by tests and
    /// by the pipeline driver in debug builds.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.match_level < self.coordinate_level {
            return Err(format!(
                "match_level {:?} < coordinate_level {:?}",
                self.match_level, self.coordinate_level
            ));
        }
        if self.town_key.is_some() && (self.city_key.is_none() || self.pref_key.is_none()) {
            return Err("town_key set without city_key/pref_key".to_string());
        }
        if self.city_key.is_some() && self.pref_key.is_none() {
            return Err("city_key set without pref_key".to_string());
        }
        if self.matched_cnt > self.input.chars().count() {
            return Err("matched_cnt exceeds input length".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_query_starts_unknown() {
        let q = Query::new(0, "東京都千代田区");
        assert_eq!(q.match_level, MatchLevel::Unknown);
        assert_eq!(q.coordinate_level, MatchLevel::Unknown);
        assert_eq!(q.temp_address.as_string(), "東京都千代田区");
        assert!(q.check_invariants().is_ok());
    }

    #[test]
    fn match_level_orders_by_specificity() {
        assert!(MatchLevel::City > MatchLevel::Prefecture);
        assert!(MatchLevel::Parcel > MatchLevel::ResidentialDetail);
    }

    #[test]
    fn invariant_q1_rejects_coordinate_above_match() {
        let mut q = Query::new(0, "x");
        q.coordinate_level = MatchLevel::City;
        q.match_level = MatchLevel::Prefecture;
        assert!(q.check_invariants().is_err());
    }

    #[test]
    fn invariant_q2_rejects_town_without_city() {
        let mut q = Query::new(0, "x");
        q.town_key = Some("t".to_string());
        assert!(q.check_invariants().is_err());
    }
}
