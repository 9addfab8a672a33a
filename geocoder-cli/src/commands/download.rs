//! The `download` subcommand: lists a CKAN package's resources and drains
//! them through the [`geocoder_download::DownloadFabric`], writing each
//! payload under `--data-dir`. Per-resource failures surface as a logged
//! `DownloadProcessError` record; only an unresolvable resource listing is
//! fatal (§7).

use std::path::Path;
use std::sync::Arc;

use geocoder_core::{GeocoderErrorKind, GeocoderResult};
use geocoder_download::{DownloadFabric, DownloadOutcome, FabricConfig, UreqFetcher};

use crate::ckan::CkanClient;
use crate::config::GeocoderConfig;
use crate::progress::ProgressReporter;
use crate::store::ReferenceStore;

pub async fn run(config: &GeocoderConfig, ckan_base_url: &str) -> GeocoderResult<()> {
    let resource_id = config.resource_id.as_deref().ok_or_else(|| {
        GeocoderErrorKind::Args.with_error(anyhow::anyhow!("`download` requires --resource-id"))
    })?;

    std::fs::create_dir_all(&config.data_dir).map_err(|e| {
        GeocoderErrorKind::Io
            .with_error(e)
            .add_context(format!("creating data dir {}", config.data_dir.display()))
    })?;

    let store = ReferenceStore::open(&config.reference_store_path())?;

    let client = CkanClient::new(ckan_base_url);
    let requests = client.list_resources(resource_id)?;
    log::info!("resolved {} resource(s) for {resource_id}", requests.len());

    let fabric = DownloadFabric::spawn(
        FabricConfig {
            max_tasks_per_worker: config.worker_pool_size,
            cache_dir: config.cache_dir.clone(),
        },
        Arc::new(UreqFetcher::new()),
    );

    let progress = ProgressReporter::new(requests.len() as u64);
    for req in requests {
        // Acknowledged immediately; the fabric queues it internally.
        let _ = fabric.submit(req).await;
    }

    let mut failures = 0usize;
    while let Some(outcome) = fabric.recv().await {
        progress.inc();
        match outcome {
            DownloadOutcome::Ok(payload) => {
                let dest = destination_path(&config.data_dir, &payload.url);
                if let Err(err) = std::fs::write(&dest, &payload.bytes) {
                    log::error!("could not write {}: {err}", dest.display());
                }
                match store.ingest_csv(&payload.bytes) {
                    Ok(rows) => log::debug!("hydrated {rows} row(s) from {}", payload.url),
                    Err(err) => log::error!("could not hydrate reference store from {}: {err}", payload.url),
                }
            }
            DownloadOutcome::Err(err) => {
                failures += 1;
                log::error!("download exhausted retries: {err}");
            }
        }
    }
    progress.finish();
    fabric.close().await;

    if failures > 0 {
        log::warn!("{failures} resource(s) failed to download after retrying");
    }
    Ok(())
}

fn destination_path(data_dir: &Path, url: &str) -> std::path::PathBuf {
    let name = url.rsplit('/').next().unwrap_or("resource");
    data_dir.join(name)
}
