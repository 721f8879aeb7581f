pub mod accounts;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod models;
pub mod profile;
pub mod routes;
pub mod scoring;
pub mod state;
pub mod storage;

use catalog::Catalog;
use config::{Config, StorageKind};
use std::sync::Arc;
use storage::{FileStore, KeyValueStore, MemoryStore};
use tracing::info;

pub async fn build_state(config: &Config) -> anyhow::Result<state::AppState> {
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::embedded()?,
    };
    info!(questions = catalog.len(), max_score = catalog.max_score(), "catalog loaded");

    let store: Arc<dyn KeyValueStore> = match config.storage {
        StorageKind::File => Arc::new(FileStore::new(&config.data_dir)),
        StorageKind::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(state::AppState::new(Arc::new(catalog), store).await)
}
