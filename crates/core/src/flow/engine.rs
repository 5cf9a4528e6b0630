use thiserror::Error;

use crate::flow::states::{FlowContext, OrderAction, OrderEvent, OrderState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: OrderState, event: OrderEvent },
}

pub trait FlowDefinition {
    fn initial_state(&self) -> OrderState;
    fn transition(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowError>;
}

/// The single ordering flow: catalog → model → price/detail → duration →
/// fulfillment → summary → payment hand-off.
#[derive(Clone, Debug, Default)]
pub struct RentalOrderFlow;

impl FlowDefinition for RentalOrderFlow {
    fn initial_state(&self) -> OrderState {
        OrderState::Start
    }

    fn transition(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowError> {
        transition_rental_order(current, event, context)
    }
}

pub struct FlowEngine<F = RentalOrderFlow> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> OrderState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<RentalOrderFlow> {
    fn default() -> Self {
        Self::new(RentalOrderFlow)
    }
}

fn transition_rental_order(
    current: &OrderState,
    event: &OrderEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowError> {
    use OrderAction::{
        ClearSelection, ComputeTotal, EndSession, IssueInvoice, ListCategories, ListModels,
        PromptAddress, PromptAddressRetry, PromptFulfillment, PromptPriceOrDetail,
        ReportDetailGap, ReportModelGap, RequestQuote, ShowAgentContact, ShowFarewell,
        ShowGreeting, ShowModelDetail, ShowPickupPoint, ShowPriceSchedule, ShowReviewLink,
        ShowSummary,
    };
    use OrderEvent::{
        AddressEntered, AgentContactRequested, CancelRequested, CatalogRequested, CategoryPicked,
        DeliveryChosen, DetailsRequested, DurationEntered, ModelPicked, OrderConfirmed,
        PickupChosen, PickupConfirmed, PricesRequested, QuoteFailed, QuoteResolved,
        RestartRequested, ReviewRequested, StartRequested,
    };
    use OrderState::{
        AddressPrompt, CatalogShown, DurationPrompt, End, FulfillmentChoice, ModelList,
        OrderSummary, PaymentHandoff, PickupConfirm, PriceOrDetail, PriceOrDetailChoice, Start,
    };

    let (to, actions) = match (current, event) {
        // The start and cancel commands are honored from every state.
        (_, StartRequested) => (Start, vec![ClearSelection, ShowGreeting]),
        (_, CancelRequested) => (End, vec![ShowFarewell, EndSession]),

        (Start, CatalogRequested) => (CatalogShown, vec![ListCategories]),
        (Start, AgentContactRequested) => (End, vec![ShowAgentContact, EndSession]),
        (Start, ReviewRequested) => (End, vec![ShowReviewLink, EndSession]),

        (CatalogShown, CategoryPicked(_)) if context.models_available => {
            (ModelList, vec![ListModels])
        }
        // Category exists but has no orderable models: report the gap and
        // offer the catalog again instead of failing the session.
        (CatalogShown, CategoryPicked(_)) => {
            (CatalogShown, vec![ReportModelGap, ListCategories])
        }

        (ModelList, ModelPicked(_)) => (PriceOrDetailChoice, vec![PromptPriceOrDetail]),

        // Price and detail views can alternate without losing the chosen
        // model; prices lead into the duration prompt.
        (PriceOrDetailChoice | PriceOrDetail, PricesRequested) => {
            (DurationPrompt, vec![ShowPriceSchedule])
        }
        (PriceOrDetailChoice | PriceOrDetail, DetailsRequested) if context.detail_available => {
            (PriceOrDetail, vec![ShowModelDetail])
        }
        (PriceOrDetailChoice | PriceOrDetail, DetailsRequested) => {
            (CatalogShown, vec![ReportDetailGap, ListCategories])
        }

        (DurationPrompt, DurationEntered(_)) => (FulfillmentChoice, vec![PromptFulfillment]),

        (FulfillmentChoice, PickupChosen) => (PickupConfirm, vec![ShowPickupPoint]),
        (FulfillmentChoice | PickupConfirm, DeliveryChosen) => {
            (AddressPrompt, vec![PromptAddress])
        }
        (PickupConfirm, PickupConfirmed) => (OrderSummary, vec![ComputeTotal, ShowSummary]),

        (AddressPrompt, AddressEntered(_)) => (AddressPrompt, vec![RequestQuote]),
        (AddressPrompt, QuoteResolved(_)) => (OrderSummary, vec![ComputeTotal, ShowSummary]),
        (AddressPrompt, QuoteFailed) => (AddressPrompt, vec![PromptAddressRetry]),

        (OrderSummary, OrderConfirmed) => (PaymentHandoff, vec![IssueInvoice, EndSession]),
        (OrderSummary, RestartRequested) => (CatalogShown, vec![ClearSelection, ListCategories]),

        _ => {
            return Err(FlowError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelKey;

    fn engine() -> FlowEngine {
        FlowEngine::default()
    }

    fn apply(state: OrderState, event: OrderEvent) -> Result<TransitionOutcome, FlowError> {
        engine().apply(&state, &event, &FlowContext::default())
    }

    #[test]
    fn happy_path_reaches_payment_handoff() {
        let steps = [
            (OrderState::Start, OrderEvent::CatalogRequested, OrderState::CatalogShown),
            (OrderState::CatalogShown, OrderEvent::CategoryPicked(0), OrderState::ModelList),
            (
                OrderState::ModelList,
                OrderEvent::ModelPicked(ModelKey::new("BrandX", "ModelY")),
                OrderState::PriceOrDetailChoice,
            ),
            (
                OrderState::PriceOrDetailChoice,
                OrderEvent::PricesRequested,
                OrderState::DurationPrompt,
            ),
            (
                OrderState::DurationPrompt,
                OrderEvent::DurationEntered(5),
                OrderState::FulfillmentChoice,
            ),
            (OrderState::FulfillmentChoice, OrderEvent::PickupChosen, OrderState::PickupConfirm),
            (OrderState::PickupConfirm, OrderEvent::PickupConfirmed, OrderState::OrderSummary),
            (OrderState::OrderSummary, OrderEvent::OrderConfirmed, OrderState::PaymentHandoff),
        ];

        for (from, event, expected) in steps {
            let outcome = apply(from, event).expect("legal transition");
            assert_eq!(outcome.to, expected);
        }
    }

    #[test]
    fn detail_view_is_revisitable_and_leads_back_to_prices() {
        let outcome =
            apply(OrderState::PriceOrDetailChoice, OrderEvent::DetailsRequested).expect("detail");
        assert_eq!(outcome.to, OrderState::PriceOrDetail);

        let again = apply(OrderState::PriceOrDetail, OrderEvent::DetailsRequested).expect("again");
        assert_eq!(again.to, OrderState::PriceOrDetail);

        let prices = apply(OrderState::PriceOrDetail, OrderEvent::PricesRequested).expect("price");
        assert_eq!(prices.to, OrderState::DurationPrompt);
    }

    #[test]
    fn missing_detail_degrades_to_catalog() {
        let context = FlowContext { detail_available: false, ..FlowContext::default() };
        let outcome = engine()
            .apply(&OrderState::PriceOrDetail, &OrderEvent::DetailsRequested, &context)
            .expect("degraded transition");
        assert_eq!(outcome.to, OrderState::CatalogShown);
        assert!(outcome.actions.contains(&OrderAction::ReportDetailGap));
    }

    #[test]
    fn empty_category_returns_to_catalog_with_gap_notice() {
        let context = FlowContext { models_available: false, ..FlowContext::default() };
        let outcome = engine()
            .apply(&OrderState::CatalogShown, &OrderEvent::CategoryPicked(2), &context)
            .expect("gap transition");
        assert_eq!(outcome.to, OrderState::CatalogShown);
        assert_eq!(
            outcome.actions,
            vec![OrderAction::ReportModelGap, OrderAction::ListCategories]
        );
    }

    #[test]
    fn quote_failure_re_enters_address_prompt() {
        let outcome = apply(OrderState::AddressPrompt, OrderEvent::QuoteFailed).expect("retry");
        assert_eq!(outcome.to, OrderState::AddressPrompt);
        assert_eq!(outcome.actions, vec![OrderAction::PromptAddressRetry]);

        let resolved =
            apply(OrderState::AddressPrompt, OrderEvent::QuoteResolved(500)).expect("resolved");
        assert_eq!(resolved.to, OrderState::OrderSummary);
    }

    #[test]
    fn pickup_confirm_allows_switching_back_to_delivery() {
        let outcome = apply(OrderState::PickupConfirm, OrderEvent::DeliveryChosen).expect("switch");
        assert_eq!(outcome.to, OrderState::AddressPrompt);
        assert_eq!(outcome.actions, vec![OrderAction::PromptAddress]);
    }

    #[test]
    fn cancel_is_honored_from_every_state() {
        let states = [
            OrderState::Start,
            OrderState::CatalogShown,
            OrderState::ModelList,
            OrderState::PriceOrDetailChoice,
            OrderState::PriceOrDetail,
            OrderState::DurationPrompt,
            OrderState::FulfillmentChoice,
            OrderState::PickupConfirm,
            OrderState::AddressPrompt,
            OrderState::OrderSummary,
        ];
        for state in states {
            let outcome = apply(state, OrderEvent::CancelRequested).expect("cancel");
            assert_eq!(outcome.to, OrderState::End);
            assert!(outcome.actions.contains(&OrderAction::EndSession));
        }
    }

    #[test]
    fn restart_from_summary_clears_and_relists() {
        let outcome = apply(OrderState::OrderSummary, OrderEvent::RestartRequested).expect("ok");
        assert_eq!(outcome.to, OrderState::CatalogShown);
        assert_eq!(
            outcome.actions,
            vec![OrderAction::ClearSelection, OrderAction::ListCategories]
        );
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        assert!(matches!(
            apply(OrderState::Start, OrderEvent::DurationEntered(3)),
            Err(FlowError::InvalidTransition { .. })
        ));
        assert!(matches!(
            apply(OrderState::DurationPrompt, OrderEvent::PickupChosen),
            Err(FlowError::InvalidTransition { .. })
        ));
        assert!(matches!(
            apply(OrderState::CatalogShown, OrderEvent::OrderConfirmed),
            Err(FlowError::InvalidTransition { .. })
        ));
    }
}
