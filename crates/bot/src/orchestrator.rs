//! Drives one conversation per chat: interprets raw transport events into
//! flow events, applies the transition table, and executes the resulting
//! actions against the catalog, the quote provider, and the chat sender.
//!
//! The per-session mutex is held for the whole event, including any quote
//! call made on its behalf. A second tap or message on the same session
//! waits; it never observes a half-applied transition.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use rentatool_core::catalog::{CatalogRecord, ModelKey, SnapshotStore, TierSchedule};
use rentatool_core::config::StoreConfig;
use rentatool_core::errors::{DataGapError, RecoverableError, UpstreamError, UserInputError};
use rentatool_core::flow::{
    FlowContext, FlowEngine, FlowError, OrderAction, OrderEvent, OrderState, TransitionOutcome,
};
use rentatool_core::pricing::compute_total;
use rentatool_core::session::SessionId;
use rentatool_logistics::quote::{DeliveryQuotes, QuoteError, RoutePoint};
use rentatool_telegram::outbound::{ChatSender, Invoice, SendError};
use rentatool_telegram::poller::EventRouter;

use crate::replies::{self, tokens};
use crate::sessions::{SessionRegistry, SessionSlot};

/// What to do after one action: keep executing, abort the remaining actions,
/// or feed a synthesized event back through the table.
enum ActionFlow {
    Continue,
    Stop,
    Next(OrderEvent),
}

pub struct ConversationOrchestrator {
    engine: FlowEngine,
    snapshots: Arc<SnapshotStore>,
    sessions: SessionRegistry,
    sender: Arc<dyn ChatSender>,
    quotes: Arc<dyn DeliveryQuotes>,
    origin: RoutePoint,
    store: StoreConfig,
}

impl ConversationOrchestrator {
    pub fn new(
        snapshots: Arc<SnapshotStore>,
        sender: Arc<dyn ChatSender>,
        quotes: Arc<dyn DeliveryQuotes>,
        origin: RoutePoint,
        store: StoreConfig,
    ) -> Self {
        Self {
            engine: FlowEngine::default(),
            snapshots,
            sessions: SessionRegistry::new(),
            sender,
            quotes,
            origin,
            store,
        }
    }

    async fn drive(&self, id: SessionId, event: OrderEvent, raw: &str) -> Result<(), SendError> {
        let slot = self.sessions.slot(id);
        let mut slot = slot.lock().await;
        self.drive_locked(id, &mut slot, event, raw).await
    }

    /// Runs the event (and any synthesized follow-ups, like a quote result)
    /// to quiescence under the slot lock.
    async fn drive_locked(
        &self,
        id: SessionId,
        slot: &mut SessionSlot,
        event: OrderEvent,
        raw: &str,
    ) -> Result<(), SendError> {
        let mut pending = Some(event);
        while let Some(event) = pending.take() {
            // Collaborator lookups the transition needs, done before the
            // table commits to anything.
            let mut context = FlowContext::default();
            let mut picked: Option<(CatalogRecord, TierSchedule)> = None;
            match &event {
                OrderEvent::CategoryPicked(index) => {
                    let snapshot = self.snapshots.load();
                    context.models_available = slot
                        .session
                        .shown_categories
                        .get(*index)
                        .map(|name| !snapshot.lookup_models(name).is_empty())
                        .unwrap_or(false);
                }
                OrderEvent::ModelPicked(key) => {
                    let snapshot = self.snapshots.load();
                    match snapshot.find_by_model_key(key) {
                        Some(record) => {
                            picked = Some((record.clone(), snapshot.schedule().clone()));
                        }
                        None => {
                            // Stale keyboard: the model left the catalog
                            // between the listing and the tap.
                            warn!(session = %id, model = %key, "picked model is gone");
                            self.sender.send(id, replies::model_gone(key.as_str())).await?;
                            return Ok(());
                        }
                    }
                }
                OrderEvent::DetailsRequested => {
                    context.detail_available = slot
                        .session
                        .chosen_record
                        .as_ref()
                        .map(CatalogRecord::has_detail)
                        .unwrap_or(false);
                }
                _ => {}
            }

            let outcome = match self.engine.apply(&slot.state, &event, &context) {
                Ok(outcome) => outcome,
                Err(FlowError::InvalidTransition { state, .. }) => {
                    // Stale button or out-of-turn text; the session stays put.
                    info!(session = %id, state = ?state, input = raw, "event rejected");
                    let error = RecoverableError::from(UserInputError::UnrecognizedInput {
                        input: raw.to_string(),
                    });
                    self.sender.send(id, replies::corrective(&error)).await?;
                    return Ok(());
                }
            };

            slot.state = outcome.to;
            self.record_event(slot, &outcome, picked);

            for action in &outcome.actions {
                match self.execute(id, slot, &outcome, *action).await? {
                    ActionFlow::Continue => {}
                    ActionFlow::Stop => return Ok(()),
                    ActionFlow::Next(next) => pending = Some(next),
                }
            }
        }
        Ok(())
    }

    /// Folds the accepted event into the session. Only runs after the table
    /// has accepted the transition.
    fn record_event(
        &self,
        slot: &mut SessionSlot,
        outcome: &TransitionOutcome,
        picked: Option<(CatalogRecord, TierSchedule)>,
    ) {
        match (&outcome.event, outcome.to) {
            (OrderEvent::CategoryPicked(index), OrderState::ModelList) => {
                if let Some(name) = slot.session.shown_categories.get(*index).cloned() {
                    slot.session.choose_category(name);
                }
            }
            (OrderEvent::ModelPicked(_), _) => {
                if let Some((record, schedule)) = picked {
                    slot.session.choose_model(record, schedule);
                }
            }
            (OrderEvent::DurationEntered(days), _) => slot.session.set_rental_days(*days),
            (OrderEvent::PickupConfirmed, _) => slot.session.set_pickup(),
            // Switching to delivery drops any pickup choice; the address and
            // fee land later, when the quote resolves.
            (OrderEvent::DeliveryChosen, _) => slot.session.clear_fulfillment(),
            _ => {}
        }
    }

    async fn execute(
        &self,
        id: SessionId,
        slot: &mut SessionSlot,
        outcome: &TransitionOutcome,
        action: OrderAction,
    ) -> Result<ActionFlow, SendError> {
        match action {
            OrderAction::ClearSelection => {
                slot.session.clear_selection();
            }
            OrderAction::ShowGreeting => {
                self.sender.send(id, replies::greeting(&self.store)).await?;
            }
            OrderAction::ListCategories => {
                let snapshot = self.snapshots.load();
                if snapshot.is_empty() {
                    slot.session.shown_categories.clear();
                    let error = RecoverableError::from(DataGapError::EmptyCatalog);
                    self.sender.send(id, replies::corrective(&error)).await?;
                    return Ok(ActionFlow::Stop);
                }
                let categories = snapshot.lookup_categories().to_vec();
                self.sender.send(id, replies::category_list(&categories)).await?;
                slot.session.shown_categories = categories;
            }
            OrderAction::ShowAgentContact => {
                self.sender.send(id, replies::agent_contact(&self.store)).await?;
            }
            OrderAction::ShowReviewLink => {
                self.sender.send(id, replies::review_link(&self.store)).await?;
            }
            OrderAction::ListModels => {
                let snapshot = self.snapshots.load();
                let category = slot.session.chosen_category.clone().unwrap_or_default();
                let records = snapshot.lookup_models(&category).to_vec();
                self.sender.send(id, replies::model_list(&category, &records)).await?;
            }
            OrderAction::ReportModelGap => {
                let category = match &outcome.event {
                    OrderEvent::CategoryPicked(index) => slot
                        .session
                        .shown_categories
                        .get(*index)
                        .cloned()
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                self.sender.send(id, replies::model_gap(&category, &self.store)).await?;
            }
            OrderAction::PromptPriceOrDetail => {
                let key = self.chosen_key(slot);
                self.sender.send(id, replies::price_or_detail_menu(&key)).await?;
            }
            OrderAction::ShowPriceSchedule => {
                let message = match (&slot.session.chosen_record, &slot.session.tier_schedule) {
                    (Some(record), Some(schedule)) => replies::price_schedule(record, schedule),
                    _ => return self.broken_session(id, slot, "price schedule").await,
                };
                self.sender.send(id, message).await?;
            }
            OrderAction::ShowModelDetail => {
                let message = match &slot.session.chosen_record {
                    Some(record) => replies::model_detail(record),
                    None => return self.broken_session(id, slot, "model detail").await,
                };
                self.sender.send(id, message).await?;
            }
            OrderAction::ReportDetailGap => {
                let key = self.chosen_key(slot);
                self.sender.send(id, replies::detail_gap(&key)).await?;
            }
            OrderAction::PromptFulfillment => {
                self.sender.send(id, replies::fulfillment_prompt()).await?;
            }
            OrderAction::ShowPickupPoint => {
                self.sender.send(id, replies::pickup_point(&self.store)).await?;
            }
            OrderAction::PromptAddress => {
                self.sender.send(id, replies::address_prompt()).await?;
            }
            OrderAction::RequestQuote => {
                return self.request_quote(id, slot, outcome).await;
            }
            OrderAction::PromptAddressRetry => {
                let error = slot.last_quote_error.clone().map(RecoverableError::from);
                self.sender.send(id, replies::address_retry(error.as_ref())).await?;
            }
            OrderAction::ComputeTotal => {
                let base = match (
                    &slot.session.chosen_record,
                    &slot.session.tier_schedule,
                    slot.session.rental_days,
                ) {
                    (Some(record), Some(schedule), Some(days)) => {
                        compute_total(record, days, schedule)
                    }
                    _ => return self.broken_session(id, slot, "total").await,
                };
                match base {
                    Ok(base) => {
                        let fee = slot.session.delivery_fee.unwrap_or(0);
                        slot.session.set_total(base.saturating_add(fee));
                    }
                    Err(error) => {
                        warn!(session = %id, error = %error, "pricing failed");
                        return self.broken_session(id, slot, "total").await;
                    }
                }
            }
            OrderAction::ShowSummary => {
                let message = replies::order_summary(&slot.session, &self.store);
                self.sender.send(id, message).await?;
            }
            OrderAction::IssueInvoice => {
                return self.issue_invoice(id, slot).await;
            }
            OrderAction::ShowFarewell => {
                self.sender.send(id, replies::farewell()).await?;
            }
            OrderAction::EndSession => {
                info!(session = %id, "session ended");
                self.sessions.remove(id);
            }
        }
        Ok(ActionFlow::Continue)
    }

    async fn request_quote(
        &self,
        id: SessionId,
        slot: &mut SessionSlot,
        outcome: &TransitionOutcome,
    ) -> Result<ActionFlow, SendError> {
        let OrderEvent::AddressEntered(address) = &outcome.event else {
            return Ok(ActionFlow::Continue);
        };
        let Some(weight) = slot.session.chosen_record.as_ref().map(|r| r.cargo_weight_kg) else {
            return self.broken_session(id, slot, "quote").await;
        };

        match self.quotes.quote(&self.origin, address, weight).await {
            Ok(quote) => {
                info!(session = %id, fee = quote.fee, "delivery quote resolved");
                slot.last_quote_error = None;
                slot.session.set_delivery(address.clone(), quote.fee);
                Ok(ActionFlow::Next(OrderEvent::QuoteResolved(quote.fee)))
            }
            Err(error) => {
                warn!(session = %id, error = %error, "delivery quote failed");
                slot.last_quote_error = Some(match error {
                    QuoteError::UnresolvableAddress => UpstreamError::UnresolvableAddress,
                    QuoteError::Provider(detail) => UpstreamError::QuoteProvider(detail),
                });
                Ok(ActionFlow::Next(OrderEvent::QuoteFailed))
            }
        }
    }

    async fn issue_invoice(
        &self,
        id: SessionId,
        slot: &mut SessionSlot,
    ) -> Result<ActionFlow, SendError> {
        let model = self.chosen_key(slot);
        let days = slot.session.rental_days.unwrap_or(0);
        let Some(total) = slot.session.total_price else {
            return self.broken_session(id, slot, "invoice").await;
        };

        let invoice = Invoice {
            title: model.clone(),
            description: format!("Rental of {model} for {days} day(s)"),
            payload: Uuid::new_v4().to_string(),
            currency: self.store.currency.clone(),
            // Gateways take the smallest currency unit.
            amount: total.saturating_mul(100),
        };

        if let Err(error) = self.sender.send_invoice(id, invoice).await {
            warn!(session = %id, error = %error, "invoice hand-off failed");
            // The order stays confirmable; the user retries from the summary.
            slot.state = OrderState::OrderSummary;
            let corrective =
                RecoverableError::from(UpstreamError::PaymentGateway(error.to_string()));
            self.sender.send(id, replies::corrective(&corrective)).await?;
            return Ok(ActionFlow::Stop);
        }
        Ok(ActionFlow::Continue)
    }

    fn chosen_key(&self, slot: &SessionSlot) -> String {
        slot.session
            .chosen_model_key
            .as_ref()
            .map(|key| key.as_str().to_string())
            .unwrap_or_default()
    }

    /// A required session field is missing mid-flow, which means the state
    /// tag and the selection disagree. Reset rather than guess.
    async fn broken_session(
        &self,
        id: SessionId,
        slot: &mut SessionSlot,
        stage: &str,
    ) -> Result<ActionFlow, SendError> {
        warn!(session = %id, state = ?slot.state, stage, "session state is inconsistent, resetting");
        slot.state = OrderState::Start;
        slot.session.clear_selection();
        self.sender
            .send(
                id,
                replies::corrective(&RecoverableError::from(UserInputError::UnrecognizedInput {
                    input: String::new(),
                })),
            )
            .await?;
        self.sender.send(id, replies::greeting(&self.store)).await?;
        Ok(ActionFlow::Stop)
    }
}

fn parse_choice(text: &str, count: usize) -> Result<usize, UserInputError> {
    let input = text.trim();
    let number: usize = input
        .parse()
        .map_err(|_| UserInputError::NotANumber { input: input.to_string() })?;
    if number == 0 || number > count {
        return Err(UserInputError::ChoiceOutOfRange { input: input.to_string(), count });
    }
    Ok(number - 1)
}

fn parse_duration(text: &str) -> Result<i64, UserInputError> {
    let input = text.trim();
    let days: i64 = input
        .parse()
        .map_err(|_| UserInputError::InvalidDuration { input: input.to_string() })?;
    if days <= 0 {
        return Err(UserInputError::InvalidDuration { input: input.to_string() });
    }
    Ok(days)
}

#[async_trait]
impl EventRouter for ConversationOrchestrator {
    async fn handle_text(&self, session: SessionId, text: &str) -> Result<(), SendError> {
        let slot = self.sessions.slot(session);
        let mut slot = slot.lock().await;

        // Free text means different things per state; everything else is
        // button-driven.
        let event = match slot.state {
            OrderState::CatalogShown => {
                match parse_choice(text, slot.session.shown_categories.len()) {
                    Ok(index) => OrderEvent::CategoryPicked(index),
                    Err(error) => {
                        let error = RecoverableError::from(error);
                        return self.sender.send(session, replies::corrective(&error)).await;
                    }
                }
            }
            OrderState::DurationPrompt => match parse_duration(text) {
                Ok(days) => OrderEvent::DurationEntered(days),
                Err(error) => {
                    let error = RecoverableError::from(error);
                    return self.sender.send(session, replies::corrective(&error)).await;
                }
            },
            OrderState::AddressPrompt => OrderEvent::AddressEntered(text.trim().to_string()),
            _ => {
                let error = RecoverableError::from(UserInputError::UnrecognizedInput {
                    input: text.to_string(),
                });
                return self.sender.send(session, replies::corrective(&error)).await;
            }
        };

        self.drive_locked(session, &mut slot, event, text).await
    }

    async fn handle_command(&self, session: SessionId, name: &str) -> Result<(), SendError> {
        match name {
            "start" => self.drive(session, OrderEvent::StartRequested, name).await,
            "cancel" => self.drive(session, OrderEvent::CancelRequested, name).await,
            _ => {
                let error = RecoverableError::from(UserInputError::UnrecognizedInput {
                    input: format!("/{name}"),
                });
                self.sender.send(session, replies::corrective(&error)).await
            }
        }
    }

    async fn handle_callback(&self, session: SessionId, token: &str) -> Result<(), SendError> {
        let event = match token {
            tokens::SHOW_CATALOG => OrderEvent::CatalogRequested,
            tokens::AGENT_CONTACT => OrderEvent::AgentContactRequested,
            tokens::LEAVE_REVIEW => OrderEvent::ReviewRequested,
            tokens::SHOW_PRICES => OrderEvent::PricesRequested,
            tokens::SHOW_DETAILS => OrderEvent::DetailsRequested,
            tokens::DELIVERY | tokens::SWITCH_TO_DELIVERY => OrderEvent::DeliveryChosen,
            tokens::PICKUP => OrderEvent::PickupChosen,
            tokens::CONFIRM_PICKUP => OrderEvent::PickupConfirmed,
            tokens::CONFIRM_ORDER => OrderEvent::OrderConfirmed,
            tokens::RESTART_ORDER => OrderEvent::RestartRequested,
            tokens::CANCEL_ORDER => OrderEvent::CancelRequested,
            other => match other.strip_prefix(tokens::MODEL_PREFIX) {
                Some(key) => OrderEvent::ModelPicked(ModelKey(key.to_string())),
                None => {
                    let error = RecoverableError::from(UserInputError::UnrecognizedInput {
                        input: other.to_string(),
                    });
                    return self.sender.send(session, replies::corrective(&error)).await;
                }
            },
        };

        self.drive(session, event, token).await
    }
}
