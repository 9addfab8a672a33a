//! Reference-store row types and the deterministic key hashes derived from
//! them (spec.md §6): pure functions of their inputs, stable across runs, so
//! a `Query`'s resolved keys can be recomputed identically from any loading
//! of the same reference data.

use serde::{Deserialize, Serialize};

use crate::trie::TrieValue;

/// A stable, process-independent hash — `std::collections::hash_map`'s
/// default hasher is randomized per-process and unsuitable for a key that
/// must be reproducible across runs, so this uses the fixed-seed FNV-1a
/// variant instead.
fn fnv1a_hash(parts: &[&str]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET_BASIS;
    for part in parts {
        for byte in part.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash ^= 0xff;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn hash_key(parts: &[&str]) -> String {
    format!("{:016x}", fnv1a_hash(parts))
}

pub fn rsdtblk_key(lg_code: &str, machiaza_id: &str, blk_id: &str) -> String {
    hash_key(&[lg_code, machiaza_id, blk_id])
}

pub fn rsdtdsp_key(
    lg_code: &str,
    machiaza_id: &str,
    rsdt_id: &str,
    rsdt2_id: &str,
    rsdt_addr_flg: bool,
) -> String {
    hash_key(&[
        lg_code,
        machiaza_id,
        rsdt_id,
        rsdt2_id,
        if rsdt_addr_flg { "1" } else { "0" },
    ])
}

pub fn town_key(lg_code: &str, machiaza_id: &str) -> String {
    hash_key(&[lg_code, machiaza_id])
}

pub fn parcel_key(lg_code: &str, machiaza_id: &str, prc_id: &str) -> String {
    hash_key(&[lg_code, machiaza_id, prc_id])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefectureInfo {
    pub pref_key: String,
    pub lg_code: String,
    pub pref: String,
}

impl TrieValue for PrefectureInfo {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityPattern {
    pub city_key: String,
    pub pref_key: String,
    pub lg_code: String,
    pub pref: String,
    pub county: Option<String>,
    pub city: String,
    pub ward: Option<String>,
}

impl TrieValue for CityPattern {}

/// The town table row, fields as named verbatim in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TownMatchingInfo {
    pub pref_key: String,
    pub city_key: String,
    pub town_key: String,
    pub rsdt_addr_flg: Option<bool>,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
    pub koaza: Option<String>,
    pub pref: String,
    pub county: Option<String>,
    pub city: String,
    pub ward: Option<String>,
    pub lg_code: String,
    pub oaza_cho: Option<String>,
    pub machiaza_id: String,
    pub chome: Option<String>,
    pub key: String,
}

impl TrieValue for TownMatchingInfo {
    fn rsdt_addr_flg(&self) -> Option<bool> {
        self.rsdt_addr_flg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsdtBlkInfo {
    pub rsdtblk_key: String,
    pub lg_code: String,
    pub machiaza_id: String,
    pub blk_id: String,
    pub block: String,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

impl TrieValue for RsdtBlkInfo {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsdtDspInfo {
    pub rsdtdsp_key: String,
    pub lg_code: String,
    pub machiaza_id: String,
    pub rsdt_id: String,
    pub rsdt_num: String,
    pub rsdt2_id: Option<String>,
    pub rsdt_num2: Option<String>,
    pub rsdt_addr_flg: bool,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

impl TrieValue for RsdtDspInfo {
    fn rsdt_addr_flg(&self) -> Option<bool> {
        Some(self.rsdt_addr_flg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelInfo {
    pub parcel_key: String,
    pub lg_code: String,
    pub machiaza_id: String,
    pub prc_id: String,
    pub prc_num1: String,
    pub prc_num2: Option<String>,
    pub prc_num3: Option<String>,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

impl TrieValue for ParcelInfo {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_pure_functions_of_their_inputs() {
        let a = rsdtblk_key("132063", "0001001", "003");
        let b = rsdtblk_key("132063", "0001001", "003");
        assert_eq!(a, b);
    }

    #[test]
    fn keys_differ_on_different_inputs() {
        let a = rsdtblk_key("132063", "0001001", "003");
        let b = rsdtblk_key("132063", "0001001", "004");
        assert_ne!(a, b);
    }

    #[test]
    fn rsdtdsp_key_distinguishes_addr_flg() {
        let a = rsdtdsp_key("132063", "0001001", "010", "000", true);
        let b = rsdtdsp_key("132063", "0001001", "010", "000", false);
        assert_ne!(a, b);
    }
}
