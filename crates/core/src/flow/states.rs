use serde::{Deserialize, Serialize};

use crate::catalog::ModelKey;

/// Conversation stage for one session. The orchestrator keeps a
/// (session id → state) mapping with the same lifetime as the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Start,
    CatalogShown,
    ModelList,
    PriceOrDetailChoice,
    PriceOrDetail,
    DurationPrompt,
    FulfillmentChoice,
    PickupConfirm,
    AddressPrompt,
    OrderSummary,
    PaymentHandoff,
    End,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PaymentHandoff | Self::End)
    }
}

/// Validated inputs fed to the transition table. Raw chat text is parsed and
/// range-checked by the orchestrator before it becomes an event; quote
/// resolution re-enters the table as `QuoteResolved`/`QuoteFailed` so the
/// table itself stays free of IO.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    StartRequested,
    CatalogRequested,
    AgentContactRequested,
    ReviewRequested,
    /// Zero-based index into the category list as last displayed.
    CategoryPicked(usize),
    ModelPicked(ModelKey),
    PricesRequested,
    DetailsRequested,
    /// Positive number of rental days.
    DurationEntered(i64),
    PickupChosen,
    DeliveryChosen,
    PickupConfirmed,
    AddressEntered(String),
    /// Delivery fee in whole currency units.
    QuoteResolved(i64),
    QuoteFailed,
    OrderConfirmed,
    RestartRequested,
    CancelRequested,
}

/// Side effects the orchestrator executes after a successful transition, in
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    ClearSelection,
    ShowGreeting,
    ListCategories,
    ShowAgentContact,
    ShowReviewLink,
    ListModels,
    ReportModelGap,
    PromptPriceOrDetail,
    ShowPriceSchedule,
    ShowModelDetail,
    ReportDetailGap,
    PromptFulfillment,
    ShowPickupPoint,
    PromptAddress,
    RequestQuote,
    PromptAddressRetry,
    ComputeTotal,
    ShowSummary,
    IssueInvoice,
    ShowFarewell,
    EndSession,
}

/// Facts about the current session/catalog the table needs to branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    /// At least one orderable model exists for the picked category.
    pub models_available: bool,
    /// The chosen record carries both a photo and spec text.
    pub detail_available: bool,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self { models_available: true, detail_available: true }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OrderState,
    pub to: OrderState,
    pub event: OrderEvent,
    pub actions: Vec<OrderAction>,
}
