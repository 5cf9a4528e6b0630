use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Header names the snapshot builder recognizes in the raw sheet. Price
/// columns are discovered dynamically from the `price_<N>d` pattern.
pub const COLUMN_TOOL: &str = "tool";
pub const COLUMN_BRAND: &str = "brand";
pub const COLUMN_MODEL: &str = "model";
pub const COLUMN_PHOTO_URL: &str = "photo_url";
pub const COLUMN_DETAILS: &str = "details";
pub const COLUMN_WEIGHT_KG: &str = "weight_kg";

const PRICE_COLUMN_PREFIX: &str = "price_";
const PRICE_COLUMN_SUFFIX: &str = "d";
const PLACEHOLDER_CELL: &str = "-";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("raw table has no rows")]
    EmptyTable,
    #[error("raw table declares no `price_<N>d` columns")]
    NoPriceColumns,
    #[error("raw table is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("duplicate price breakpoint `{0}` in table header")]
    DuplicateBreakpoint(u32),
}

/// Header-keyed tabular rows as fetched from the catalog source. The first
/// row of the sheet is the header; every data row is padded or truncated to
/// the header width by the fetcher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    fn cell<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("").trim()
    }
}

/// Ascending rental-day breakpoints, one price column per breakpoint. A
/// duration beyond the last breakpoint shares the last column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSchedule {
    breakpoints: Vec<u32>,
}

impl TierSchedule {
    pub fn new(breakpoints: Vec<u32>) -> Result<Self, CatalogError> {
        if breakpoints.is_empty() {
            return Err(CatalogError::NoPriceColumns);
        }
        for pair in breakpoints.windows(2) {
            if pair[1] <= pair[0] {
                return Err(CatalogError::DuplicateBreakpoint(pair[1]));
            }
        }
        Ok(Self { breakpoints })
    }

    pub fn breakpoints(&self) -> &[u32] {
        &self.breakpoints
    }

    pub fn column_count(&self) -> usize {
        self.breakpoints.len()
    }

    /// Index of the price column covering `rental_days`: the first breakpoint
    /// greater than or equal to the duration, saturating at the last column.
    pub fn column_for(&self, rental_days: u32) -> usize {
        let index = self.breakpoints.partition_point(|limit| *limit < rental_days);
        index.min(self.breakpoints.len() - 1)
    }

    /// Human label for a column, used when rendering the price table.
    pub fn label_for(&self, column: usize) -> String {
        let limit = self.breakpoints[column.min(self.breakpoints.len() - 1)];
        let last = column + 1 == self.breakpoints.len();
        match (column, last) {
            (0, _) if limit == 1 => "1 day".to_string(),
            (_, true) => format!("{limit}+ days"),
            _ => format!("up to {limit} days"),
        }
    }
}

/// Stable key for one orderable model: brand and model joined by a space.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey(pub String);

impl ModelKey {
    pub fn new(brand: &str, model: &str) -> Self {
        Self(format!("{brand} {model}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub category: String,
    pub brand: String,
    pub model: String,
    /// One per-day rate per schedule column, in whole currency units.
    pub tier_prices: Vec<i64>,
    pub photo_url: Option<String>,
    pub detail_text: Option<String>,
    pub cargo_weight_kg: f64,
}

impl CatalogRecord {
    pub fn model_key(&self) -> ModelKey {
        ModelKey::new(&self.brand, &self.model)
    }

    pub fn has_detail(&self) -> bool {
        self.photo_url.is_some() && self.detail_text.is_some()
    }
}

/// Immutable point-in-time view of the catalog. Rebuilt wholesale on refresh
/// and swapped through [`SnapshotStore`], never patched in place.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogSnapshot {
    schedule: TierSchedule,
    categories: Vec<String>,
    by_category: HashMap<String, Vec<CatalogRecord>>,
}

impl CatalogSnapshot {
    pub fn empty(schedule: TierSchedule) -> Self {
        Self { schedule, categories: Vec::new(), by_category: HashMap::new() }
    }

    pub fn schedule(&self) -> &TierSchedule {
        &self.schedule
    }

    /// Category names in first-appearance order.
    pub fn lookup_categories(&self) -> &[String] {
        &self.categories
    }

    /// Orderable records for a category; empty for an unknown category.
    pub fn lookup_models(&self, category: &str) -> &[CatalogRecord] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_by_model_key(&self, key: &ModelKey) -> Option<&CatalogRecord> {
        self.by_category.values().flatten().find(|record| &record.model_key() == key)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }
}

/// Builds snapshots from raw sheet rows, dropping rows that are not yet
/// orderable (missing prices, placeholder model names) with a warning each.
#[derive(Clone, Debug)]
pub struct SnapshotBuilder {
    pub default_cargo_weight_kg: f64,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self { default_cargo_weight_kg: 5.0 }
    }
}

impl SnapshotBuilder {
    pub fn new(default_cargo_weight_kg: f64) -> Self {
        Self { default_cargo_weight_kg }
    }

    pub fn build(&self, table: &RawTable) -> Result<CatalogSnapshot, CatalogError> {
        if table.headers.is_empty() {
            return Err(CatalogError::EmptyTable);
        }

        let tool_col =
            table.column_index(COLUMN_TOOL).ok_or(CatalogError::MissingColumn(COLUMN_TOOL))?;
        let brand_col =
            table.column_index(COLUMN_BRAND).ok_or(CatalogError::MissingColumn(COLUMN_BRAND))?;
        let model_col =
            table.column_index(COLUMN_MODEL).ok_or(CatalogError::MissingColumn(COLUMN_MODEL))?;
        let photo_col = table.column_index(COLUMN_PHOTO_URL);
        let details_col = table.column_index(COLUMN_DETAILS);
        let weight_col = table.column_index(COLUMN_WEIGHT_KG);

        let price_columns = discover_price_columns(&table.headers);
        let schedule =
            TierSchedule::new(price_columns.iter().map(|(days, _)| *days).collect())?;

        let mut categories = Vec::new();
        let mut by_category: HashMap<String, Vec<CatalogRecord>> = HashMap::new();

        for (row_number, row) in table.rows.iter().enumerate() {
            let category = table.cell(row, tool_col);
            let brand = table.cell(row, brand_col);
            let model = table.cell(row, model_col);

            if category.is_empty() {
                warn!(row = row_number, "skipping catalog row without a tool category");
                continue;
            }
            if model.is_empty() || model == PLACEHOLDER_CELL {
                warn!(
                    row = row_number,
                    category,
                    brand,
                    "skipping catalog row with a placeholder model name"
                );
                continue;
            }

            let mut tier_prices = Vec::with_capacity(price_columns.len());
            let mut priced = true;
            for (days, column) in &price_columns {
                match table.cell(row, *column).parse::<i64>() {
                    Ok(price) => tier_prices.push(price),
                    Err(_) => {
                        warn!(
                            row = row_number,
                            category,
                            brand,
                            model,
                            breakpoint = days,
                            "skipping catalog row with a missing or non-numeric price cell"
                        );
                        priced = false;
                        break;
                    }
                }
            }
            if !priced {
                continue;
            }

            let cargo_weight_kg = weight_col
                .map(|column| table.cell(row, column))
                .and_then(|cell| cell.parse::<f64>().ok())
                .unwrap_or_else(|| {
                    warn!(
                        row = row_number,
                        category,
                        brand,
                        model,
                        default_kg = self.default_cargo_weight_kg,
                        "catalog row has no usable cargo weight, using default"
                    );
                    self.default_cargo_weight_kg
                });

            let record = CatalogRecord {
                category: category.to_string(),
                brand: brand.to_string(),
                model: model.to_string(),
                tier_prices,
                photo_url: photo_col.and_then(|column| optional_cell(table.cell(row, column))),
                detail_text: details_col.and_then(|column| optional_cell(table.cell(row, column))),
                cargo_weight_kg,
            };

            if !by_category.contains_key(category) {
                categories.push(category.to_string());
            }
            by_category.entry(category.to_string()).or_default().push(record);
        }

        Ok(CatalogSnapshot { schedule, categories, by_category })
    }
}

fn discover_price_columns(headers: &[String]) -> Vec<(u32, usize)> {
    let mut columns: Vec<(u32, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            let days = header
                .strip_prefix(PRICE_COLUMN_PREFIX)?
                .strip_suffix(PRICE_COLUMN_SUFFIX)?
                .parse::<u32>()
                .ok()?;
            Some((days, index))
        })
        .collect();
    columns.sort_by_key(|(days, _)| *days);
    columns
}

fn optional_cell(cell: &str) -> Option<String> {
    if cell.is_empty() || cell == PLACEHOLDER_CELL {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Shared handle to the active snapshot. Readers clone the inner `Arc`;
/// the refresh task publishes a fully built replacement in one swap.
#[derive(Debug)]
pub struct SnapshotStore {
    inner: RwLock<Arc<CatalogSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { inner: RwLock::new(Arc::new(snapshot)) }
    }

    pub fn load(&self) -> Arc<CatalogSnapshot> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn publish(&self, snapshot: CatalogSnapshot) {
        *self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_fixture(rows: Vec<Vec<&str>>) -> RawTable {
        RawTable::new(
            vec![
                "tool".into(),
                "brand".into(),
                "model".into(),
                "price_1d".into(),
                "price_3d".into(),
                "price_7d".into(),
                "photo_url".into(),
                "details".into(),
                "weight_kg".into(),
            ],
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }

    #[test]
    fn builds_snapshot_with_schedule_from_headers() {
        let table = table_fixture(vec![vec![
            "Drill",
            "BrandX",
            "ModelY",
            "100",
            "80",
            "60",
            "http://example/drill.jpg",
            "800W hammer drill",
            "2.4",
        ]]);

        let snapshot = SnapshotBuilder::default().build(&table).expect("snapshot");
        assert_eq!(snapshot.schedule().breakpoints(), &[1, 3, 7]);
        assert_eq!(snapshot.lookup_categories(), ["Drill".to_string()]);

        let record = &snapshot.lookup_models("Drill")[0];
        assert_eq!(record.model_key().as_str(), "BrandX ModelY");
        assert_eq!(record.tier_prices, vec![100, 80, 60]);
        assert!(record.has_detail());
    }

    #[test]
    fn drops_rows_with_any_missing_price_cell() {
        let table = table_fixture(vec![
            vec!["Drill", "BrandX", "ModelY", "100", "", "60", "-", "-", "2.4"],
            vec!["Drill", "BrandX", "ModelZ", "100", "80", "60", "-", "-", "2.4"],
            vec!["Saw", "BrandQ", "ModelW", "", "", "", "-", "-", "3.0"],
        ]);

        let snapshot = SnapshotBuilder::default().build(&table).expect("snapshot");
        assert_eq!(snapshot.record_count(), 1);
        assert_eq!(snapshot.lookup_models("Drill")[0].model, "ModelZ");
        assert!(snapshot.lookup_models("Saw").is_empty());
        // Saw only had one (unpriced) row, so the category never appears.
        assert_eq!(snapshot.lookup_categories(), ["Drill".to_string()]);
    }

    #[test]
    fn drops_rows_with_blank_or_placeholder_model() {
        let table = table_fixture(vec![
            vec!["Drill", "BrandX", "-", "100", "80", "60", "-", "-", "2.4"],
            vec!["Drill", "BrandX", "", "100", "80", "60", "-", "-", "2.4"],
            vec!["Drill", "BrandX", "ModelY", "100", "80", "60", "-", "-", "2.4"],
        ]);

        let snapshot = SnapshotBuilder::default().build(&table).expect("snapshot");
        assert_eq!(snapshot.record_count(), 1);
    }

    #[test]
    fn placeholder_photo_and_details_become_none() {
        let table = table_fixture(vec![vec![
            "Drill", "BrandX", "ModelY", "100", "80", "60", "-", "", "2.4",
        ]]);

        let snapshot = SnapshotBuilder::default().build(&table).expect("snapshot");
        let record = &snapshot.lookup_models("Drill")[0];
        assert_eq!(record.photo_url, None);
        assert_eq!(record.detail_text, None);
        assert!(!record.has_detail());
    }

    #[test]
    fn unparsable_weight_falls_back_to_default() {
        let table = table_fixture(vec![vec![
            "Drill", "BrandX", "ModelY", "100", "80", "60", "-", "-", "heavy",
        ]]);

        let snapshot = SnapshotBuilder::new(7.5).build(&table).expect("snapshot");
        assert_eq!(snapshot.lookup_models("Drill")[0].cargo_weight_kg, 7.5);
    }

    #[test]
    fn find_by_model_key_is_stable_for_one_snapshot() {
        let table = table_fixture(vec![
            vec!["Drill", "BrandX", "ModelY", "100", "80", "60", "-", "-", "2.4"],
            vec!["Saw", "BrandQ", "ModelW", "200", "150", "120", "-", "-", "3.0"],
        ]);
        let snapshot = SnapshotBuilder::default().build(&table).expect("snapshot");

        let key = ModelKey::new("BrandQ", "ModelW");
        let first = snapshot.find_by_model_key(&key).expect("record");
        let second = snapshot.find_by_model_key(&key).expect("record");
        assert_eq!(first, second);
        assert!(snapshot.find_by_model_key(&ModelKey::new("Nope", "Nothing")).is_none());
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let table = RawTable::new(
            vec!["brand".into(), "model".into(), "price_1d".into()],
            vec![],
        );
        assert!(matches!(
            SnapshotBuilder::default().build(&table),
            Err(CatalogError::MissingColumn(COLUMN_TOOL))
        ));
    }

    #[test]
    fn tier_schedule_rejects_non_increasing_breakpoints() {
        assert!(TierSchedule::new(vec![1, 3, 3]).is_err());
        assert!(TierSchedule::new(vec![]).is_err());
        assert!(TierSchedule::new(vec![1, 3, 7]).is_ok());
    }

    #[test]
    fn tier_labels_cover_first_middle_and_saturating_columns() {
        let schedule = TierSchedule::new(vec![1, 3, 7]).expect("schedule");
        assert_eq!(schedule.label_for(0), "1 day");
        assert_eq!(schedule.label_for(1), "up to 3 days");
        assert_eq!(schedule.label_for(2), "7+ days");
    }

    #[test]
    fn snapshot_store_swaps_wholesale() {
        let schedule = TierSchedule::new(vec![1, 3, 7]).expect("schedule");
        let store = SnapshotStore::new(CatalogSnapshot::empty(schedule));
        let before = store.load();
        assert!(before.is_empty());

        let table = table_fixture(vec![vec![
            "Drill", "BrandX", "ModelY", "100", "80", "60", "-", "-", "2.4",
        ]]);
        store.publish(SnapshotBuilder::default().build(&table).expect("snapshot"));

        // The earlier handle still sees the old snapshot; new loads see the swap.
        assert!(before.is_empty());
        assert_eq!(store.load().record_count(), 1);
    }
}
