//! Durable mutation log backing the on-disk store.

mod log;

pub use log::{LogEntry, LogOp, MutationLog};
