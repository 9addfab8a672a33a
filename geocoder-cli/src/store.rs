//! The SQLite-backed reference store (`SPEC_FULL.md` §6): a thin accessor
//! over the five tables used only to hydrate tries at startup. No query
//! planner, no migrations beyond one `CREATE TABLE IF NOT EXISTS` bootstrap —
//! writes (the `download` subcommand) precede reads (the `geocode`
//! subcommand), per the concurrency model's shared-resource policy (§5).

use rusqlite::Connection;

use geocoder_core::dictionary::{CityPattern, ParcelInfo, PrefectureInfo, RsdtBlkInfo, RsdtDspInfo, TownMatchingInfo};
use geocoder_core::{GeocoderErrorKind, GeocoderResult};

pub struct ReferenceStore {
    conn: Connection,
}

enum TableKind {
    Prefecture,
    City,
    Town,
    RsdtBlk,
    RsdtDsp,
    Parcel,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS prefectures (
    pref_key TEXT PRIMARY KEY,
    lg_code  TEXT NOT NULL,
    pref     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS cities (
    city_key TEXT PRIMARY KEY,
    pref_key TEXT NOT NULL,
    lg_code  TEXT NOT NULL,
    pref     TEXT NOT NULL,
    county   TEXT,
    city     TEXT NOT NULL,
    ward     TEXT
);
CREATE TABLE IF NOT EXISTS towns (
    town_key      TEXT PRIMARY KEY,
    pref_key      TEXT NOT NULL,
    city_key      TEXT NOT NULL,
    rsdt_addr_flg INTEGER,
    rep_lat       REAL,
    rep_lon       REAL,
    koaza         TEXT,
    pref          TEXT NOT NULL,
    county        TEXT,
    city          TEXT NOT NULL,
    ward          TEXT,
    lg_code       TEXT NOT NULL,
    oaza_cho      TEXT,
    machiaza_id   TEXT NOT NULL,
    chome         TEXT,
    key           TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS rsdt_blk (
    rsdtblk_key TEXT PRIMARY KEY,
    lg_code     TEXT NOT NULL,
    machiaza_id TEXT NOT NULL,
    blk_id      TEXT NOT NULL,
    block       TEXT NOT NULL,
    rep_lat     REAL,
    rep_lon     REAL
);
CREATE TABLE IF NOT EXISTS rsdt_dsp (
    rsdtdsp_key   TEXT PRIMARY KEY,
    lg_code       TEXT NOT NULL,
    machiaza_id   TEXT NOT NULL,
    rsdt_id       TEXT NOT NULL,
    rsdt_num      TEXT NOT NULL,
    rsdt2_id      TEXT,
    rsdt_num2     TEXT,
    rsdt_addr_flg INTEGER NOT NULL,
    rep_lat       REAL,
    rep_lon       REAL
);
CREATE TABLE IF NOT EXISTS parcel (
    parcel_key  TEXT PRIMARY KEY,
    lg_code     TEXT NOT NULL,
    machiaza_id TEXT NOT NULL,
    prc_id      TEXT NOT NULL,
    prc_num1    TEXT NOT NULL,
    prc_num2    TEXT,
    prc_num3    TEXT,
    rep_lat     REAL,
    rep_lon     REAL
);
";

impl ReferenceStore {
    pub fn open(path: &std::path::Path) -> GeocoderResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            GeocoderErrorKind::NotFound
                .with_error(e)
                .add_context(format!("opening reference store at {}", path.display()))
        })?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(ReferenceStore { conn })
    }

    pub fn in_memory() -> GeocoderResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| GeocoderErrorKind::Io.with_error(e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(ReferenceStore { conn })
    }

    pub fn insert_prefecture(&self, row: &PrefectureInfo) -> GeocoderResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO prefectures (pref_key, lg_code, pref) VALUES (?1, ?2, ?3)",
                rusqlite::params![row.pref_key, row.lg_code, row.pref],
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(())
    }

    pub fn insert_city(&self, row: &CityPattern) -> GeocoderResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cities (city_key, pref_key, lg_code, pref, county, city, ward) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![row.city_key, row.pref_key, row.lg_code, row.pref, row.county, row.city, row.ward],
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(())
    }

    pub fn insert_town(&self, row: &TownMatchingInfo) -> GeocoderResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO towns (town_key, pref_key, city_key, rsdt_addr_flg, rep_lat, rep_lon, \
                 koaza, pref, county, city, ward, lg_code, oaza_cho, machiaza_id, chome, key) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                rusqlite::params![
                    row.town_key,
                    row.pref_key,
                    row.city_key,
                    row.rsdt_addr_flg.map(|v| v as i64),
                    row.rep_lat,
                    row.rep_lon,
                    row.koaza,
                    row.pref,
                    row.county,
                    row.city,
                    row.ward,
                    row.lg_code,
                    row.oaza_cho,
                    row.machiaza_id,
                    row.chome,
                    row.key,
                ],
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(())
    }

    pub fn insert_rsdt_blk(&self, row: &RsdtBlkInfo) -> GeocoderResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO rsdt_blk (rsdtblk_key, lg_code, machiaza_id, blk_id, block, rep_lat, rep_lon) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![row.rsdtblk_key, row.lg_code, row.machiaza_id, row.blk_id, row.block, row.rep_lat, row.rep_lon],
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(())
    }

    pub fn insert_rsdt_dsp(&self, row: &RsdtDspInfo) -> GeocoderResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO rsdt_dsp (rsdtdsp_key, lg_code, machiaza_id, rsdt_id, rsdt_num, \
                 rsdt2_id, rsdt_num2, rsdt_addr_flg, rep_lat, rep_lon) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    row.rsdtdsp_key,
                    row.lg_code,
                    row.machiaza_id,
                    row.rsdt_id,
                    row.rsdt_num,
                    row.rsdt2_id,
                    row.rsdt_num2,
                    row.rsdt_addr_flg as i64,
                    row.rep_lat,
                    row.rep_lon,
                ],
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(())
    }

    pub fn insert_parcel(&self, row: &ParcelInfo) -> GeocoderResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO parcel (parcel_key, lg_code, machiaza_id, prc_id, prc_num1, prc_num2, prc_num3, rep_lat, rep_lon) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    row.parcel_key,
                    row.lg_code,
                    row.machiaza_id,
                    row.prc_id,
                    row.prc_num1,
                    row.prc_num2,
                    row.prc_num3,
                    row.rep_lat,
                    row.rep_lon,
                ],
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        Ok(())
    }

    /// Parses one downloaded CSV payload and inserts its rows into whichever
    /// table its header identifies (`SPEC_FULL.md` §6: the reference store's
    /// column names are the row types' own field names, so the header is
    /// self-describing). Returns the number of rows inserted; an
    /// unrecognized header is not an error — some CKAN resources (changelogs,
    /// READMEs) carry no table data at all and are silently skipped.
    pub fn ingest_csv(&self, bytes: &[u8]) -> GeocoderResult<usize> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("reading CSV header"))?
            .clone();

        let kind = if headers.iter().any(|h| h == "parcel_key") {
            TableKind::Parcel
        } else if headers.iter().any(|h| h == "rsdtdsp_key") {
            TableKind::RsdtDsp
        } else if headers.iter().any(|h| h == "rsdtblk_key") {
            TableKind::RsdtBlk
        } else if headers.iter().any(|h| h == "town_key") {
            TableKind::Town
        } else if headers.iter().any(|h| h == "city_key") {
            TableKind::City
        } else if headers.iter().any(|h| h == "pref_key") {
            TableKind::Prefecture
        } else {
            return Ok(0);
        };

        let mut count = 0usize;
        match kind {
            TableKind::Prefecture => {
                for row in reader.deserialize::<PrefectureInfo>() {
                    let row = row.map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("parsing prefecture row"))?;
                    self.insert_prefecture(&row)?;
                    count += 1;
                }
            }
            TableKind::City => {
                for row in reader.deserialize::<CityPattern>() {
                    let row = row.map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("parsing city row"))?;
                    self.insert_city(&row)?;
                    count += 1;
                }
            }
            TableKind::Town => {
                for row in reader.deserialize::<TownMatchingInfo>() {
                    let row = row.map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("parsing town row"))?;
                    self.insert_town(&row)?;
                    count += 1;
                }
            }
            TableKind::RsdtBlk => {
                for row in reader.deserialize::<RsdtBlkInfo>() {
                    let row = row.map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("parsing rsdt_blk row"))?;
                    self.insert_rsdt_blk(&row)?;
                    count += 1;
                }
            }
            TableKind::RsdtDsp => {
                for row in reader.deserialize::<RsdtDspInfo>() {
                    let row = row.map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("parsing rsdt_dsp row"))?;
                    self.insert_rsdt_dsp(&row)?;
                    count += 1;
                }
            }
            TableKind::Parcel => {
                for row in reader.deserialize::<ParcelInfo>() {
                    let row = row.map_err(|e| GeocoderErrorKind::Load.with_error(e).add_context("parsing parcel row"))?;
                    self.insert_parcel(&row)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    pub fn prefectures(&self) -> GeocoderResult<Vec<PrefectureInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT pref_key, lg_code, pref FROM prefectures")
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PrefectureInfo {
                    pref_key: row.get(0)?,
                    lg_code: row.get(1)?,
                    pref: row.get(2)?,
                })
            })
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        collect(rows)
    }

    pub fn cities(&self) -> GeocoderResult<Vec<CityPattern>> {
        let mut stmt = self
            .conn
            .prepare("SELECT city_key, pref_key, lg_code, pref, county, city, ward FROM cities")
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CityPattern {
                    city_key: row.get(0)?,
                    pref_key: row.get(1)?,
                    lg_code: row.get(2)?,
                    pref: row.get(3)?,
                    county: row.get(4)?,
                    city: row.get(5)?,
                    ward: row.get(6)?,
                })
            })
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        collect(rows)
    }

    pub fn towns(&self) -> GeocoderResult<Vec<TownMatchingInfo>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT pref_key, city_key, town_key, rsdt_addr_flg, rep_lat, rep_lon, koaza, \
                 pref, county, city, ward, lg_code, oaza_cho, machiaza_id, chome, key FROM towns",
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TownMatchingInfo {
                    pref_key: row.get(0)?,
                    city_key: row.get(1)?,
                    town_key: row.get(2)?,
                    rsdt_addr_flg: row.get::<_, Option<i64>>(3)?.map(|v| v != 0),
                    rep_lat: row.get(4)?,
                    rep_lon: row.get(5)?,
                    koaza: row.get(6)?,
                    pref: row.get(7)?,
                    county: row.get(8)?,
                    city: row.get(9)?,
                    ward: row.get(10)?,
                    lg_code: row.get(11)?,
                    oaza_cho: row.get(12)?,
                    machiaza_id: row.get(13)?,
                    chome: row.get(14)?,
                    key: row.get(15)?,
                })
            })
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        collect(rows)
    }

    pub fn rsdt_blk(&self) -> GeocoderResult<Vec<RsdtBlkInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT rsdtblk_key, lg_code, machiaza_id, blk_id, block, rep_lat, rep_lon FROM rsdt_blk")
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RsdtBlkInfo {
                    rsdtblk_key: row.get(0)?,
                    lg_code: row.get(1)?,
                    machiaza_id: row.get(2)?,
                    blk_id: row.get(3)?,
                    block: row.get(4)?,
                    rep_lat: row.get(5)?,
                    rep_lon: row.get(6)?,
                })
            })
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        collect(rows)
    }

    pub fn rsdt_dsp(&self) -> GeocoderResult<Vec<RsdtDspInfo>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT rsdtdsp_key, lg_code, machiaza_id, rsdt_id, rsdt_num, rsdt2_id, rsdt_num2, \
                 rsdt_addr_flg, rep_lat, rep_lon FROM rsdt_dsp",
            )
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RsdtDspInfo {
                    rsdtdsp_key: row.get(0)?,
                    lg_code: row.get(1)?,
                    machiaza_id: row.get(2)?,
                    rsdt_id: row.get(3)?,
                    rsdt_num: row.get(4)?,
                    rsdt2_id: row.get(5)?,
                    rsdt_num2: row.get(6)?,
                    rsdt_addr_flg: row.get::<_, i64>(7)? != 0,
                    rep_lat: row.get(8)?,
                    rep_lon: row.get(9)?,
                })
            })
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        collect(rows)
    }

    pub fn parcel(&self) -> GeocoderResult<Vec<ParcelInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT parcel_key, lg_code, machiaza_id, prc_id, prc_num1, prc_num2, prc_num3, rep_lat, rep_lon FROM parcel")
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ParcelInfo {
                    parcel_key: row.get(0)?,
                    lg_code: row.get(1)?,
                    machiaza_id: row.get(2)?,
                    prc_id: row.get(3)?,
                    prc_num1: row.get(4)?,
                    prc_num2: row.get(5)?,
                    prc_num3: row.get(6)?,
                    rep_lat: row.get(7)?,
                    rep_lon: row.get(8)?,
                })
            })
            .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))?;
        collect(rows)
    }
}

fn collect<T>(rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row) -> rusqlite::Result<T>>) -> GeocoderResult<Vec<T>> {
    rows.collect::<Result<Vec<T>, _>>()
        .map_err(|e| GeocoderErrorKind::Dictionary.with_error(e))
}
