//! Periodic catalog refresh. A fetched sheet is built into a complete
//! snapshot and swapped in atomically; a failed fetch keeps the last good
//! snapshot in place.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use rentatool_core::catalog::{SnapshotBuilder, SnapshotStore};
use rentatool_sheets::CatalogSource;

/// Refresh bookkeeping, shared with the health endpoint.
#[derive(Default)]
pub struct CatalogStatus {
    inner: Mutex<StatusInner>,
}

#[derive(Clone, Debug, Default)]
struct StatusInner {
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusView {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl CatalogStatus {
    pub fn view(&self) -> StatusView {
        let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        StatusView { last_success: inner.last_success, last_error: inner.last_error.clone() }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.last_success = Some(Utc::now());
        inner.last_error = None;
    }

    fn record_failure(&self, error: &anyhow::Error) {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.last_error = Some(error.to_string());
    }
}

/// One fetch-build-publish pass. Records the outcome in `status` either way.
pub async fn refresh_once(
    source: &dyn CatalogSource,
    builder: &SnapshotBuilder,
    snapshots: &SnapshotStore,
    status: &CatalogStatus,
) -> anyhow::Result<usize> {
    let result = fetch_and_publish(source, builder, snapshots).await;
    match &result {
        Ok(count) => {
            status.record_success();
            info!(records = count, "catalog snapshot published");
        }
        Err(error) => status.record_failure(error),
    }
    result
}

async fn fetch_and_publish(
    source: &dyn CatalogSource,
    builder: &SnapshotBuilder,
    snapshots: &SnapshotStore,
) -> anyhow::Result<usize> {
    let table = source.fetch_raw_table().await?;
    let snapshot = builder.build(&table)?;
    let count = snapshot.record_count();
    snapshots.publish(snapshot);
    Ok(count)
}

/// The refresh loop. The first interval tick fires immediately and is skipped;
/// bootstrap already did that fetch.
pub async fn run(
    source: Arc<dyn CatalogSource>,
    builder: SnapshotBuilder,
    snapshots: Arc<SnapshotStore>,
    status: Arc<CatalogStatus>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(error) = refresh_once(source.as_ref(), &builder, &snapshots, &status).await {
            warn!(error = %error, "catalog refresh failed, keeping the last snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use rentatool_core::catalog::{CatalogSnapshot, RawTable, TierSchedule};
    use rentatool_sheets::SheetError;

    struct ScriptedSource {
        tables: Mutex<Vec<Result<RawTable, SheetError>>>,
    }

    #[async_trait]
    impl CatalogSource for ScriptedSource {
        async fn fetch_raw_table(&self) -> Result<RawTable, SheetError> {
            let mut tables = self.tables.lock().unwrap();
            if tables.is_empty() {
                return Err(SheetError::EmptyValues);
            }
            tables.remove(0)
        }
    }

    fn table() -> RawTable {
        let headers =
            ["tool", "brand", "model", "price_1d", "price_3d", "price_7d"].map(str::to_string);
        let rows =
            vec![["Drill", "BrandX", "ModelY", "100", "80", "60"].map(str::to_string).to_vec()];
        RawTable::new(headers.to_vec(), rows)
    }

    fn empty_store() -> SnapshotStore {
        let schedule = TierSchedule::new(vec![1, 3, 7]).expect("schedule");
        SnapshotStore::new(CatalogSnapshot::empty(schedule))
    }

    #[tokio::test]
    async fn successful_refresh_publishes_and_records() {
        let source = ScriptedSource { tables: Mutex::new(vec![Ok(table())]) };
        let builder = SnapshotBuilder::new(5.0);
        let snapshots = empty_store();
        let status = CatalogStatus::default();

        let count = refresh_once(&source, &builder, &snapshots, &status).await.expect("refresh");
        assert_eq!(count, 1);
        assert_eq!(snapshots.load().record_count(), 1);

        let view = status.view();
        assert!(view.last_success.is_some());
        assert_eq!(view.last_error, None);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_snapshot() {
        let source = ScriptedSource {
            tables: Mutex::new(vec![Ok(table()), Err(SheetError::EmptyValues)]),
        };
        let builder = SnapshotBuilder::new(5.0);
        let snapshots = empty_store();
        let status = CatalogStatus::default();

        refresh_once(&source, &builder, &snapshots, &status).await.expect("first refresh");
        let result = refresh_once(&source, &builder, &snapshots, &status).await;
        assert!(result.is_err());

        // The last good snapshot stays live for ordering.
        assert_eq!(snapshots.load().record_count(), 1);
        let view = status.view();
        assert!(view.last_success.is_some());
        assert!(view.last_error.is_some());
    }
}
