//! # Change Notifications
//!
//! Every successful local mutation is reported to a [`ChangeListener`].
//! The spreadsheet export scheduler in ledger-sync implements this trait to
//! debounce mirror writes; everything else uses [`NoOpListener`].
//!
//! Listeners are called synchronously on the writer's task, after the
//! statement has committed. They must not block.

use ledger_core::EntityType;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Inserted or replaced.
    Put,
    /// Soft-delete flag set.
    SoftDelete,
    /// Row removed.
    Delete,
    /// Synced flag set after a remote write.
    Synced,
}

/// A single committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: EntityType,
    pub id: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(entity: EntityType, id: impl Into<String>, kind: ChangeKind) -> Self {
        ChangeEvent {
            entity,
            id: id.into(),
            kind,
        }
    }
}

/// Receives committed mutations.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

impl ChangeListener for NoOpListener {
    fn on_change(&self, _event: &ChangeEvent) {}
}
