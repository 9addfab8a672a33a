//! The `geocode` subcommand: hydrates every trie from the reference store,
//! assembles the seven-stage [`Pipeline`], and resolves one input line per
//! record. Only a failure to open the reference store or the input source
//! is fatal (§7); an individual unresolvable address simply stays at
//! whatever `match_level` the pipeline left it.

use std::io::{self, BufRead, Write};

use regex::Regex;

use geocoder_core::dictionary::{CityPattern, PrefectureInfo, TownMatchingInfo};
use geocoder_core::{GeocoderErrorKind, GeocoderResult, Query, TrieAddressFinder};
use geocoder_pipeline::{
    CityRecoveryStage, CityStage, IngestStage, MachiazaStage, ParcelStage, PatchStage, Pipeline,
    PrefectureStage,
};

use crate::config::GeocoderConfig;
use crate::formatter::{Column, CsvFormatter, Formatter, JsonFormatter, NdjsonFormatter};
use crate::store::ReferenceStore;

/// Tokyo's special wards, the one place city/ward naming collides across
/// the rest of the country (§5 of the data model: the machiaza stage keys a
/// dedicated trie off `pref == 東京都` for exactly this reason).
const TOKYO_23_WARDS: [&str; 23] = [
    "千代田区", "中央区", "港区", "新宿区", "文京区", "台東区", "墨田区", "江東区", "品川区",
    "目黒区", "大田区", "世田谷区", "渋谷区", "中野区", "杉並区", "豊島区", "北区", "荒川区",
    "板橋区", "練馬区", "足立区", "葛飾区", "江戸川区",
];

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Csv,
    Json,
    Ndjson,
}

pub struct GeocodeOptions {
    pub source: String,
    pub format: OutputFormat,
    pub columns: Vec<Column>,
    pub header: bool,
    pub stats: bool,
}

pub fn run(config: &GeocoderConfig, opts: &GeocodeOptions) -> GeocoderResult<()> {
    let store = ReferenceStore::open(&config.reference_store_path())?;
    let pipeline = build_pipeline(&store, config.fuzzy)?;

    let records = read_source(&opts.source)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut queries = Vec::with_capacity(records.len());
    let mut timings: Vec<geocoder_pipeline::driver::StageTiming> = Vec::new();
    for (seq, line) in records.into_iter().enumerate() {
        let query = Query::new(seq as u64, line);
        if opts.stats {
            let (mut resolved, stage_timings) = pipeline.run_one_with_stats(query)?;
            timings.extend(stage_timings);
            queries.append(&mut resolved);
        } else {
            queries.extend(pipeline.run_one(query)?);
        }
    }

    let formatter: Box<dyn Formatter> = match opts.format {
        OutputFormat::Csv => Box::new(CsvFormatter { header: opts.header }),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Ndjson => Box::new(NdjsonFormatter),
    };
    formatter.write_all(&queries, &opts.columns, &mut out)?;

    if opts.stats {
        print_stats(&mut out, &timings)?;
    }

    Ok(())
}

fn print_stats(out: &mut dyn Write, timings: &[geocoder_pipeline::driver::StageTiming]) -> GeocoderResult<()> {
    use std::collections::BTreeMap;
    let mut totals: BTreeMap<&'static str, std::time::Duration> = BTreeMap::new();
    for t in timings {
        *totals.entry(t.stage).or_default() += t.elapsed;
    }
    writeln!(out, "# --stats").map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
    for (stage, elapsed) in totals {
        writeln!(out, "# {stage}: {elapsed:?}").map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
    }
    Ok(())
}

/// Reads `path`, or stdin when `path == "-"`. Blank lines and `#`/`//`
/// comment lines are dropped before sequence numbers are assigned, so a
/// comment never consumes a `seq` value a real record would otherwise get.
fn read_source(path: &str) -> GeocoderResult<Vec<String>> {
    let lines: Box<dyn Iterator<Item = io::Result<String>>> = if path == "-" {
        Box::new(io::stdin().lock().lines())
    } else {
        let file = std::fs::File::open(path)
            .map_err(|e| GeocoderErrorKind::Io.with_error(e).add_context(format!("opening {path}")))?;
        Box::new(io::BufReader::new(file).lines())
    };

    let mut out = Vec::new();
    for line in lines {
        let line = line.map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}

fn city_trie_key(info: &CityPattern) -> String {
    format!(
        "{}{}{}",
        info.county.as_deref().unwrap_or(""),
        info.city,
        info.ward.as_deref().unwrap_or("")
    )
}

/// Strips one trailing administrative-unit character so a county/city name
/// still matches when a source omits it (step 4's "looser patterns that
/// tolerate an absent administrative suffix").
fn strip_trailing_unit(s: &str) -> &str {
    s.trim_end_matches(['市', '区', '町', '村', '郡'])
}

fn build_pipeline(store: &ReferenceStore, fuzzy: Option<char>) -> GeocoderResult<Pipeline> {
    let prefectures = store.prefectures()?;

    // Curated same-named-prefecture fallback: 石川町 (Fukushima) would
    // otherwise be indistinguishable from 石川県 when the prefecture name
    // itself is dropped from an address (spec.md §8 scenario 2).
    let same_named: Vec<(Regex, PrefectureInfo)> = prefectures
        .iter()
        .find(|p| p.pref == "福島県")
        .map(|fukushima| {
            vec![(
                Regex::new("^石川郡石川町").expect("curated pattern always compiles"),
                fukushima.clone(),
            )]
        })
        .unwrap_or_default();

    let pref_stage = PrefectureStage::new(prefectures, same_named);

    let cities = store.cities()?;
    let mut city_trie = TrieAddressFinder::new();
    for city in &cities {
        city_trie.append(&city_trie_key(city), city.clone());
    }

    // 3a — one anchored pattern per city, scoped by its own prefecture in
    // `apply_patterns`; this is the same key the trie (3b) is built from,
    // just matched as a regex instead of walked character by character.
    let city_patterns: Vec<(Regex, CityPattern)> = cities
        .iter()
        .filter_map(|city| {
            let pattern = format!("^{}", regex::escape(&city_trie_key(city)));
            Some((Regex::new(&pattern).ok()?, city.clone()))
        })
        .collect();
    let city_stage = CityStage::new(city_patterns, city_trie).with_fuzzy(fuzzy);

    let recovery_patterns: Vec<(Regex, CityPattern)> = cities
        .iter()
        .filter_map(|city| {
            let full = city_trie_key(city);
            let bare = strip_trailing_unit(&full);
            if bare.is_empty() || bare == full {
                return None;
            }
            let pattern = format!("^{}", regex::escape(bare));
            Some((Regex::new(&pattern).ok()?, city.clone()))
        })
        .collect();
    let city_recovery = CityRecoveryStage::new(recovery_patterns);

    let towns = store.towns()?;
    let mut town_trie = TrieAddressFinder::new();
    let mut tokyo23_trie = TrieAddressFinder::new();
    for town in towns {
        let target = if town.pref == "東京都" && TOKYO_23_WARDS.contains(&town.city.as_str()) {
            &mut tokyo23_trie
        } else {
            &mut town_trie
        };
        target.append(&town.key.clone(), town);
    }
    let machiaza_stage = MachiazaStage::new(town_trie, tokyo23_trie).with_fuzzy(fuzzy);

    // Curated rewrites for known data-source glitches: the katakana
    // middle-dot particle and the bare "大字"/"字" markers that precede an
    // ōaza name but never appear in the town table's own keys.
    let patches = vec![
        (Regex::new("ノ").expect("curated patch always compiles"), "の".to_string()),
        (Regex::new("大字|字").expect("curated patch always compiles"), String::new()),
    ];
    let patch_stage = PatchStage::new(patches);

    let rsdt_blk = store.rsdt_blk()?;
    let mut rsdt_blk_trie = TrieAddressFinder::new();
    for row in rsdt_blk {
        let key = format!("{}-", row.block);
        rsdt_blk_trie.append(&key, row);
    }

    let rsdt_dsp = store.rsdt_dsp()?;
    let mut rsdt_dsp_trie = TrieAddressFinder::new();
    for row in rsdt_dsp {
        let key = row.rsdt_num.clone();
        rsdt_dsp_trie.append(&key, row);
    }

    let parcel = store.parcel()?;
    let mut parcel_trie = TrieAddressFinder::new();
    for row in parcel {
        let key = row.prc_num1.clone();
        parcel_trie.append(&key, row);
    }

    let parcel_stage =
        ParcelStage::new(rsdt_blk_trie, rsdt_dsp_trie, parcel_trie).with_fuzzy(fuzzy);

    Ok(Pipeline::new(vec![
        Box::new(IngestStage::new()),
        Box::new(pref_stage),
        Box::new(city_stage),
        Box::new(city_recovery),
        Box::new(machiaza_stage),
        Box::new(patch_stage),
        Box::new(parcel_stage),
    ]))
}
