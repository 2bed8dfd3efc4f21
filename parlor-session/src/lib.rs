pub mod coordinator;
pub mod reconcile;
pub mod sinks;
pub mod traits;
pub mod turn_taking;
