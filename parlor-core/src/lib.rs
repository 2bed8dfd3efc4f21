pub mod control;
pub mod message;
pub mod session;
pub mod types;

// Keep the public surface small and intentional.
pub use control::*;
pub use message::*;
pub use session::*;
pub use types::*;
