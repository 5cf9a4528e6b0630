pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowError, RentalOrderFlow};
pub use states::{FlowContext, OrderAction, OrderEvent, OrderState, TransitionOutcome};
