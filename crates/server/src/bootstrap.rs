//! Builds the runtime graph from config: transports, catalog store, the
//! conversation orchestrator, and the update poller.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use rentatool_bot::ConversationOrchestrator;
use rentatool_core::catalog::{CatalogSnapshot, SnapshotBuilder, SnapshotStore, TierSchedule};
use rentatool_core::config::AppConfig;
use rentatool_logistics::quote::RoutePoint;
use rentatool_logistics::{YandexCargoClient, YandexGeocoder};
use rentatool_sheets::{CatalogSource, SheetsClient};
use rentatool_telegram::{BotApi, ReconnectPolicy, UpdatePoller};

use crate::refresh::{self, CatalogStatus};

pub struct App {
    pub config: AppConfig,
    pub snapshots: Arc<SnapshotStore>,
    pub status: Arc<CatalogStatus>,
    pub catalog_source: Arc<dyn CatalogSource>,
    pub poller: UpdatePoller,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<App> {
    let api = Arc::new(BotApi::new(&config.telegram)?);
    let geocoder = Arc::new(YandexGeocoder::new(&config.geocoder)?);
    let quotes = Arc::new(YandexCargoClient::new(&config.logistics, geocoder)?);
    let catalog_source: Arc<dyn CatalogSource> = Arc::new(SheetsClient::new(&config.sheets)?);

    // The store starts empty and is filled by the first fetch; the real
    // schedule comes from the sheet's price columns.
    let placeholder = TierSchedule::new(vec![1, 3, 7])?;
    let snapshots = Arc::new(SnapshotStore::new(CatalogSnapshot::empty(placeholder)));
    let status = Arc::new(CatalogStatus::default());

    let builder = SnapshotBuilder::new(config.logistics.default_cargo_weight_kg);
    if let Err(error) =
        refresh::refresh_once(catalog_source.as_ref(), &builder, &snapshots, &status).await
    {
        // The bot still comes up; users see the catalog-updating notice
        // until a refresh succeeds.
        warn!(error = %error, "initial catalog fetch failed, starting with an empty catalog");
    }

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        snapshots.clone(),
        api.clone(),
        quotes,
        RoutePoint::origin_from_config(&config.logistics),
        config.store.clone(),
    ));
    let poller = UpdatePoller::new(api, orchestrator, ReconnectPolicy::default());

    Ok(App { config, snapshots, status, catalog_source, poller })
}
