use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogRecord, ModelKey, TierSchedule};

/// One chat conversation, keyed by the transport's chat id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// How the order leaves the shop. Setting one mode replaces the other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fulfillment {
    Pickup,
    Delivery { address: String },
}

/// Per-conversation selection state. The orchestrator owns every mutation;
/// this container only guarantees that dependent fields are dropped together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSession {
    pub chosen_category: Option<String>,
    /// The category list exactly as last displayed; numeric replies are
    /// resolved by position against it.
    pub shown_categories: Vec<String>,
    pub chosen_model_key: Option<ModelKey>,
    /// Denormalized copies of the record and schedule at selection time.
    /// Pricing must not shift mid-order even if the catalog refreshes
    /// underneath.
    pub chosen_record: Option<CatalogRecord>,
    pub tier_schedule: Option<TierSchedule>,
    pub rental_days: Option<i64>,
    pub fulfillment: Option<Fulfillment>,
    pub delivery_fee: Option<i64>,
    pub total_price: Option<i64>,
}

impl OrderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choose_category(&mut self, category: String) {
        self.chosen_category = Some(category);
        self.chosen_model_key = None;
        self.chosen_record = None;
    }

    pub fn choose_model(&mut self, record: CatalogRecord, schedule: TierSchedule) {
        self.chosen_model_key = Some(record.model_key());
        self.chosen_record = Some(record);
        self.tier_schedule = Some(schedule);
        self.rental_days = None;
        self.fulfillment = None;
        self.delivery_fee = None;
        self.total_price = None;
    }

    pub fn set_rental_days(&mut self, days: i64) {
        self.rental_days = Some(days);
        self.total_price = None;
    }

    pub fn set_pickup(&mut self) {
        self.fulfillment = Some(Fulfillment::Pickup);
        self.delivery_fee = Some(0);
        self.total_price = None;
    }

    pub fn set_delivery(&mut self, address: String, fee: i64) {
        self.fulfillment = Some(Fulfillment::Delivery { address });
        self.delivery_fee = Some(fee);
        self.total_price = None;
    }

    /// Drops any half-chosen delivery state when the user goes back to the
    /// fulfillment question.
    pub fn clear_fulfillment(&mut self) {
        self.fulfillment = None;
        self.delivery_fee = None;
        self.total_price = None;
    }

    pub fn set_total(&mut self, total: i64) {
        self.total_price = Some(total);
    }

    /// Restart semantics: every selection field is dropped; the user takes a
    /// fresh pass through the catalog.
    pub fn clear_selection(&mut self) {
        *self = Self::default();
    }

    pub fn delivery_address(&self) -> Option<&str> {
        match &self.fulfillment {
            Some(Fulfillment::Delivery { address }) => Some(address),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecord;

    fn schedule() -> TierSchedule {
        TierSchedule::new(vec![1, 3, 7]).expect("schedule")
    }

    fn record() -> CatalogRecord {
        CatalogRecord {
            category: "Drill".to_string(),
            brand: "BrandX".to_string(),
            model: "ModelY".to_string(),
            tier_prices: vec![100, 80, 60],
            photo_url: None,
            detail_text: None,
            cargo_weight_kg: 2.4,
        }
    }

    #[test]
    fn choosing_a_model_resets_downstream_fields() {
        let mut session = OrderSession::new();
        session.set_rental_days(5);
        session.set_pickup();
        session.set_total(300);

        session.choose_model(record(), schedule());
        assert_eq!(session.chosen_model_key.as_ref().map(ModelKey::as_str), Some("BrandX ModelY"));
        assert!(session.chosen_record.is_some());
        assert_eq!(session.rental_days, None);
        assert_eq!(session.fulfillment, None);
        assert_eq!(session.total_price, None);
    }

    #[test]
    fn fulfillment_modes_are_mutually_exclusive() {
        let mut session = OrderSession::new();
        session.set_delivery("Main St, 5, 12".to_string(), 500);
        assert_eq!(session.delivery_address(), Some("Main St, 5, 12"));
        assert_eq!(session.delivery_fee, Some(500));

        session.set_pickup();
        assert_eq!(session.fulfillment, Some(Fulfillment::Pickup));
        assert_eq!(session.delivery_address(), None);
        assert_eq!(session.delivery_fee, Some(0));
    }

    #[test]
    fn clear_selection_resets_everything() {
        let mut session = OrderSession::new();
        session.shown_categories = vec!["Drill".to_string()];
        session.choose_category("Drill".to_string());
        session.choose_model(record(), schedule());
        session.set_rental_days(2);
        session.set_delivery("Main St, 5, 12".to_string(), 500);
        session.set_total(660);

        session.clear_selection();
        assert_eq!(session, OrderSession::default());
    }
}
