//! Debounced auto-save with status tracking.
//!
//! An [`AutoSave`] turns a stream of edits into at most one save per quiet
//! window and reports each cycle through [`SaveCallbacks`]:
//!
//! ```text
//! trigger ─▶ (quiet window) ─▶ on_saving ─▶ save(payload) ─┬─▶ on_saved
//!                                                           └─▶ on_error
//! ```
//!
//! Independent streams (one per word being edited, say) each get their own
//! coordinator; [`SaveStreams`] keeps them keyed.

mod coordinator;
mod streams;
mod types;

pub use coordinator::AutoSave;
pub use streams::SaveStreams;
pub use types::{AutoSaveConfig, SaveCallbacks, SaveStatus};
