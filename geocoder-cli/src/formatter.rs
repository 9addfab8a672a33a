//! Output sinks (`SPEC_FULL.md` §6, spec.md §6): CSV and JSON formatters
//! behind a shared trait; NDJSON is the JSON formatter applied per record.

use std::io::Write;

use geocoder_core::{GeocoderErrorKind, GeocoderResult, Query};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Input,
    Latitude,
    Longitude,
    Prefecture,
    City,
    LgCode,
    Town,
    TownId,
    Other,
    Block,
    BlockId,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Input => "input",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::Prefecture => "prefecture",
            Column::City => "city",
            Column::LgCode => "lg_code",
            Column::Town => "town",
            Column::TownId => "town_id",
            Column::Other => "other",
            Column::Block => "block",
            Column::BlockId => "block_id",
        }
    }

    pub fn default_columns() -> Vec<Column> {
        vec![
            Column::Input,
            Column::Latitude,
            Column::Longitude,
            Column::Prefecture,
            Column::City,
            Column::LgCode,
            Column::Town,
            Column::TownId,
            Column::Block,
            Column::BlockId,
        ]
    }

    pub fn parse(name: &str) -> Option<Column> {
        match name.to_ascii_uppercase().as_str() {
            "INPUT" => Some(Column::Input),
            "LATITUDE" => Some(Column::Latitude),
            "LONGITUDE" => Some(Column::Longitude),
            "PREFECTURE" => Some(Column::Prefecture),
            "CITY" => Some(Column::City),
            "LG_CODE" => Some(Column::LgCode),
            "TOWN" => Some(Column::Town),
            "TOWN_ID" => Some(Column::TownId),
            "OTHER" => Some(Column::Other),
            "BLOCK" => Some(Column::Block),
            "BLOCK_ID" => Some(Column::BlockId),
            _ => None,
        }
    }
}

fn town_display(q: &Query) -> String {
    let mut parts = Vec::new();
    if let Some(oaza) = &q.oaza_cho {
        parts.push(oaza.clone());
    }
    if let Some(chome) = &q.chome {
        parts.push(format!("{chome}丁目"));
    }
    if let Some(koaza) = &q.koaza {
        parts.push(koaza.clone());
    }
    parts.join("")
}

fn other_display(q: &Query) -> String {
    [&q.rsdt_num, &q.prc_num1]
        .into_iter()
        .flatten()
        .cloned()
        .collect::<Vec<_>>()
        .join("-")
}

fn cell(q: &Query, column: Column) -> String {
    match column {
        Column::Input => q.input.clone(),
        Column::Latitude => q.rep_lat.map(|v| v.to_string()).unwrap_or_default(),
        Column::Longitude => q.rep_lon.map(|v| v.to_string()).unwrap_or_default(),
        Column::Prefecture => q.pref.clone().unwrap_or_default(),
        Column::City => q.city.clone().unwrap_or_default(),
        Column::LgCode => q.lg_code.clone().unwrap_or_default(),
        Column::Town => town_display(q),
        Column::TownId => q.machiaza_id.clone().unwrap_or_default(),
        Column::Other => other_display(q),
        Column::Block => q.block.clone().unwrap_or_default(),
        Column::BlockId => q.block_id.clone().unwrap_or_default(),
    }
}

fn is_numeric(column: Column) -> bool {
    matches!(column, Column::Latitude | Column::Longitude)
}

pub trait Formatter {
    fn write_all(&self, queries: &[Query], columns: &[Column], out: &mut dyn Write) -> GeocoderResult<()>;
}

/// One row per input, a header unless suppressed, numeric cells bare and
/// string cells double-quoted (spec.md §6).
pub struct CsvFormatter {
    pub header: bool,
}

impl Formatter for CsvFormatter {
    fn write_all(&self, queries: &[Query], columns: &[Column], out: &mut dyn Write) -> GeocoderResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(out);

        if self.header {
            writer
                .write_record(columns.iter().map(|c| c.header()))
                .map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        }

        for q in queries {
            let row: Vec<String> = columns
                .iter()
                .map(|&c| {
                    let value = cell(q, c);
                    if is_numeric(c) {
                        value
                    } else {
                        format!("\"{value}\"")
                    }
                })
                .collect();
            writer
                .write_record(&row)
                .map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        }
        writer.flush().map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        Ok(())
    }
}

/// Mirrors `Query`'s §3 fields; missing strings render as `""`, missing
/// coordinates as JSON `null`.
#[derive(Serialize)]
struct JsonRecord {
    input: String,
    pref: String,
    city: String,
    ward: String,
    oaza_cho: String,
    chome: String,
    koaza: String,
    lg_code: String,
    machiaza_id: String,
    block: String,
    block_id: String,
    rep_lat: Option<f64>,
    rep_lon: Option<f64>,
    match_level: &'static str,
}

impl From<&Query> for JsonRecord {
    fn from(q: &Query) -> Self {
        JsonRecord {
            input: q.input.clone(),
            pref: q.pref.clone().unwrap_or_default(),
            city: q.city.clone().unwrap_or_default(),
            ward: q.ward.clone().unwrap_or_default(),
            oaza_cho: q.oaza_cho.clone().unwrap_or_default(),
            chome: q.chome.clone().unwrap_or_default(),
            koaza: q.koaza.clone().unwrap_or_default(),
            lg_code: q.lg_code.clone().unwrap_or_default(),
            machiaza_id: q.machiaza_id.clone().unwrap_or_default(),
            block: q.block.clone().unwrap_or_default(),
            block_id: q.block_id.clone().unwrap_or_default(),
            rep_lat: q.rep_lat,
            rep_lon: q.rep_lon,
            match_level: q.level_label(),
        }
    }
}

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn write_all(&self, queries: &[Query], _columns: &[Column], out: &mut dyn Write) -> GeocoderResult<()> {
        let records: Vec<JsonRecord> = queries.iter().map(JsonRecord::from).collect();
        serde_json::to_writer_pretty(&mut *out, &records).map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        writeln!(out).map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        Ok(())
    }
}

/// The JSON formatter run per-record, one JSON object per line.
pub struct NdjsonFormatter;

impl Formatter for NdjsonFormatter {
    fn write_all(&self, queries: &[Query], _columns: &[Column], out: &mut dyn Write) -> GeocoderResult<()> {
        for q in queries {
            let record = JsonRecord::from(q);
            serde_json::to_writer(&mut *out, &record).map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
            writeln!(out).map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocoder_core::Query;

    #[test]
    fn csv_formatter_quotes_strings_and_leaves_numbers_bare() {
        let mut q = Query::new(0, "東京都千代田区");
        q.pref = Some("東京都".to_string());
        q.rep_lat = Some(35.6812);
        let formatter = CsvFormatter { header: true };
        let mut out = Vec::new();
        formatter
            .write_all(&[q], &[Column::Prefecture, Column::Latitude], &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"東京都\""));
        assert!(text.contains("35.6812"));
        assert!(!text.contains("\"35.6812\""));
    }

    #[test]
    fn json_formatter_renders_missing_fields_as_empty_string_and_null_coords() {
        let q = Query::new(0, "存在しない県");
        let formatter = JsonFormatter;
        let mut out = Vec::new();
        formatter.write_all(&[q], &[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"pref\": \"\""));
        assert!(text.contains("\"rep_lat\": null"));
    }

    #[test]
    fn ndjson_formatter_writes_one_object_per_line() {
        let formatter = NdjsonFormatter;
        let qs = vec![Query::new(0, "a"), Query::new(1, "b")];
        let mut out = Vec::new();
        formatter.write_all(&qs, &[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn column_parse_round_trips_known_names() {
        for name in ["INPUT", "LATITUDE", "TOWN_ID", "BLOCK_ID"] {
            assert!(Column::parse(name).is_some());
        }
        assert!(Column::parse("NOT_A_COLUMN").is_none());
    }
}
