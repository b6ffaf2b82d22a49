//! Agent runtime, routing and action selection.

mod router;
mod runtime;
mod selector;

pub use router::{MessageIntent, Router};
pub use runtime::{AgentRuntime, Turn};
pub use selector::{ActionSelector, NO_ACTION};
