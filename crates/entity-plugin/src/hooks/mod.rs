//! Hook system — hook point contracts and the dispatcher.

pub mod definitions;
pub mod dispatcher;

pub use definitions::{DispatchMode, HookAction, HookPayload, HookPoint, HookResult};
pub use dispatcher::{ChainOutcome, DispatchOutcome, FanOutOutcome, FanOutSlot, HookDispatcher};
