pub mod error;
pub mod events;
pub mod reconcile;

pub use error::CoreError;
pub use events::{AppEvent, EventSender};
pub use reconcile::{Direction, Reconciler, ToggleAction, ToggleOutcome};
