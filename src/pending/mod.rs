//! Locally tracked change requests and their reconciliation.

mod error;
mod matching;
pub mod model;
pub mod reconcile;
mod store;
pub mod submit;

pub use model::PendingRequest;
pub use reconcile::{ReconciliationEngine, RemoteObservation};
pub use store::PendingStore;
pub use submit::{RequestDraft, SubmitContext};
