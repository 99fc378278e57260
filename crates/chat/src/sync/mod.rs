//! Sync loops for the conversation list and the active thread
//!
//! Both loops are explicit state machines built on [`Poller`]. They decide
//! when a fetch is due and apply its result, but never perform I/O; the
//! [`driver`] (or a test) runs the [`Request`]s they produce.

mod conversations;
pub mod driver;
mod poller;
mod request;
mod thread;
mod timing;

pub use conversations::ConversationSync;
pub use driver::{Command, DriverHandle};
pub use poller::{PollState, Poller, Ticket};
pub use request::{Request, Response};
pub use thread::{ThreadSync, ThreadUpdate};
pub use timing::{deadline_reached, next_tick_after, time_until};
