//! `GeocoderConfig` (SPEC_FULL.md §2 ambient stack): explicit construction
//! from CLI flags or an optional TOML file, no global DI container (Design
//! Notes §9 mandates explicit dependency injection into each stage instead).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use geocoder_core::{GeocoderErrorKind, GeocoderResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub fuzzy: Option<char>,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_worker_pool_size() -> usize {
    4
}

impl GeocoderConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        GeocoderConfig {
            data_dir,
            resource_id: None,
            fuzzy: None,
            worker_pool_size: default_worker_pool_size(),
            cache_dir: None,
        }
    }

    /// Loads overrides from a TOML file layered on top of CLI-provided
    /// defaults. A missing file is not an error — the CLI flags alone are a
    /// complete configuration.
    pub fn load_toml(path: &Path, mut base: GeocoderConfig) -> GeocoderResult<GeocoderConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GeocoderErrorKind::Io.with_error(e).add_context(format!("reading {}", path.display())))?;
        let parsed: GeocoderConfig = toml::from_str(&text)
            .map_err(|e| GeocoderErrorKind::Parse.with_error(e).add_context(format!("parsing {}", path.display())))?;
        base.resource_id = parsed.resource_id.or(base.resource_id);
        base.fuzzy = parsed.fuzzy.or(base.fuzzy);
        base.cache_dir = parsed.cache_dir.or(base.cache_dir);
        if parsed.worker_pool_size != default_worker_pool_size() {
            base.worker_pool_size = parsed.worker_pool_size;
        }
        Ok(base)
    }

    pub fn reference_store_path(&self) -> PathBuf {
        self.data_dir.join("reference.sqlite3")
    }
}
