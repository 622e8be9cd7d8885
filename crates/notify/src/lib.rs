//! Action delivery for watcher firings.
//!
//! This crate provides:
//! - `ActionHandler` trait for pluggable action kinds
//! - Minijinja rendering for action message templates
//! - `ConsoleHandler`, the built-in `console` action
//! - `Dispatcher`, which routes actions to handlers and implements the
//!   engine's `ActionDispatch`

pub mod console;
pub mod dispatcher;
pub mod templating;
pub mod traits;

pub use console::ConsoleHandler;
pub use dispatcher::Dispatcher;
pub use traits::{Action, ActionHandler, DispatchResult, NotifyError};

/// Dispatcher with every built-in handler registered.
pub fn default_dispatcher() -> Dispatcher {
    Dispatcher::with_handlers(vec![Box::new(ConsoleHandler::new())])
}
