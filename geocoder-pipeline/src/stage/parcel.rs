//! Step 7 — block / residence / parcel resolution: trie lookups keyed by
//! the resolved `machiaza_id`, attaching block, residence, or parcel
//! numbers and any coordinates the matched row carries.

use geocoder_core::dictionary::{ParcelInfo, RsdtBlkInfo, RsdtDspInfo};
use geocoder_core::{FindParams, GeocoderResult, MatchLevel, Query, Stage, TrieAddressFinder};

pub struct ParcelStage {
    rsdt_blk: TrieAddressFinder<RsdtBlkInfo>,
    rsdt_dsp: TrieAddressFinder<RsdtDspInfo>,
    parcel: TrieAddressFinder<ParcelInfo>,
    fuzzy: Option<char>,
}

impl ParcelStage {
    pub fn new(
        rsdt_blk: TrieAddressFinder<RsdtBlkInfo>,
        rsdt_dsp: TrieAddressFinder<RsdtDspInfo>,
        parcel: TrieAddressFinder<ParcelInfo>,
    ) -> Self {
        ParcelStage {
            rsdt_blk,
            rsdt_dsp,
            parcel,
            fuzzy: None,
        }
    }

    pub fn with_fuzzy(mut self, fuzzy: Option<char>) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    fn best<'a, V>(
        trie: &'a TrieAddressFinder<V>,
        query: &Query,
        machiaza_id: &str,
        field: impl Fn(&V) -> &str,
        fuzzy: Option<char>,
    ) -> GeocoderResult<Option<(V, usize)>>
    where
        V: Clone + geocoder_core::TrieValue,
    {
        Ok(trie
            .find(FindParams {
                target: &query.temp_address,
                extra_challenges: &[],
                partial_matches: false,
                fuzzy,
            })?
            .into_iter()
            .filter(|m| field(m.info) == machiaza_id)
            .max_by_key(|m| m.depth)
            .map(|m| (m.info.clone(), m.depth)))
    }
}

impl Stage for ParcelStage {
    fn name(&self) -> &'static str {
        "parcel"
    }

    fn process(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        let mut q = query;
        let Some(machiaza_id) = q.machiaza_id.clone() else {
            return Ok(vec![q]);
        };

        // A bare separator left over from the chōme/block split (e.g.
        // "2丁目-1-1" after step 5 consumes "2丁目") never belongs to the
        // block number itself.
        if q.temp_address.as_string().starts_with('-') {
            q.temp_address = q.temp_address.tail(1);
        }

        if q.match_level < MatchLevel::ResidentialBlock {
            if let Some((info, depth)) =
                Self::best(&self.rsdt_blk, &q, &machiaza_id, |v| v.machiaza_id.as_str(), self.fuzzy)?
            {
                q.rsdtblk_key = Some(info.rsdtblk_key.clone());
                q.block = Some(info.block.clone());
                q.block_id = Some(info.blk_id.clone());
                q.match_level = MatchLevel::ResidentialBlock;
                q.matched_cnt += depth;
                q.temp_address = q.temp_address.tail(depth);
                attach_coords(&mut q, info.rep_lat, info.rep_lon, MatchLevel::ResidentialBlock);
            }
        }

        if q.match_level < MatchLevel::ResidentialDetail {
            if let Some((info, depth)) =
                Self::best(&self.rsdt_dsp, &q, &machiaza_id, |v| v.machiaza_id.as_str(), self.fuzzy)?
            {
                q.rsdtdsp_key = Some(info.rsdtdsp_key.clone());
                q.rsdt_num = Some(info.rsdt_num.clone());
                q.rsdt_id = Some(info.rsdt_id.clone());
                q.rsdt_num2 = info.rsdt_num2.clone();
                q.rsdt2_id = info.rsdt2_id.clone();
                q.rsdt_addr_flg = Some(info.rsdt_addr_flg);
                q.match_level = MatchLevel::ResidentialDetail;
                q.matched_cnt += depth;
                q.temp_address = q.temp_address.tail(depth);
                attach_coords(&mut q, info.rep_lat, info.rep_lon, MatchLevel::ResidentialDetail);
            }
        }

        if q.match_level < MatchLevel::Parcel {
            if let Some((info, depth)) =
                Self::best(&self.parcel, &q, &machiaza_id, |v| v.machiaza_id.as_str(), self.fuzzy)?
            {
                q.parcel_key = Some(info.parcel_key.clone());
                q.prc_num1 = Some(info.prc_num1.clone());
                q.prc_num2 = info.prc_num2.clone();
                q.prc_num3 = info.prc_num3.clone();
                q.prc_id = Some(info.prc_id.clone());
                q.match_level = MatchLevel::Parcel;
                q.matched_cnt += depth;
                q.temp_address = q.temp_address.tail(depth);
                attach_coords(&mut q, info.rep_lat, info.rep_lon, MatchLevel::Parcel);
            }
        }

        Ok(vec![q])
    }
}

fn attach_coords(q: &mut Query, lat: Option<f64>, lon: Option<f64>, level: MatchLevel) {
    if let (Some(lat), Some(lon)) = (lat, lon) {
        if q.coordinate_level < level {
            q.rep_lat = Some(lat);
            q.rep_lon = Some(lon);
            q.coordinate_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> RsdtBlkInfo {
        RsdtBlkInfo {
            rsdtblk_key: "k1".to_string(),
            lg_code: "011002".to_string(),
            machiaza_id: "0001".to_string(),
            blk_id: "002".to_string(),
            block: "2".to_string(),
            rep_lat: Some(43.06),
            rep_lon: Some(141.35),
        }
    }

    #[test]
    fn resolves_block_and_attaches_coordinates() {
        let mut blk_trie = TrieAddressFinder::new();
        blk_trie.append("2-1-1", block());
        let stage = ParcelStage::new(blk_trie, TrieAddressFinder::new(), TrieAddressFinder::new());

        let mut q = Query::new(0, "2-1-1");
        q.machiaza_id = Some("0001".to_string());
        q.match_level = MatchLevel::MachiazaDetail;

        let out = stage.process(q).unwrap();
        assert_eq!(out[0].block.as_deref(), Some("2"));
        assert_eq!(out[0].match_level, MatchLevel::ResidentialBlock);
        assert_eq!(out[0].coordinate_level, MatchLevel::ResidentialBlock);
        assert_eq!(out[0].rep_lat, Some(43.06));
    }

    #[test]
    fn skips_machiaza_less_records() {
        let stage = ParcelStage::new(TrieAddressFinder::new(), TrieAddressFinder::new(), TrieAddressFinder::new());
        let q = Query::new(0, "2-1-1");
        let out = stage.process(q).unwrap();
        assert_eq!(out[0].match_level, MatchLevel::Unknown);
    }
}
