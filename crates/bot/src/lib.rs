//! The conversation orchestrator: session registry, transition execution,
//! reply rendering, and the wiring between the pure flow table and the
//! delivery/payment collaborators.

pub mod orchestrator;
pub mod replies;
pub mod sessions;

pub use orchestrator::ConversationOrchestrator;
pub use sessions::{SessionRegistry, SessionSlot};
