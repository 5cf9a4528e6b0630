pub mod catalog;
pub mod config;
pub mod errors;
pub mod flow;
pub mod pricing;
pub mod session;

pub use catalog::{
    CatalogError, CatalogRecord, CatalogSnapshot, ModelKey, RawTable, SnapshotBuilder,
    SnapshotStore, TierSchedule,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use errors::{DataGapError, RecoverableError, UpstreamError, UserInputError};
pub use flow::{
    FlowContext, FlowDefinition, FlowEngine, FlowError, OrderAction, OrderEvent, OrderState,
    RentalOrderFlow, TransitionOutcome,
};
pub use pricing::{compute_total, PricingError};
pub use session::{Fulfillment, OrderSession, SessionId};
