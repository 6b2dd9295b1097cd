//! Configuration store contract
//!
//! A [`ConfigStore`] holds one timer configuration resource. It offers:
//! - all-or-nothing multi-field snapshot reads
//! - single-field writes with "create if absent" semantics
//! - exclusive single-writer leases on individual fields
//! - change notifications for values and for the resource lifecycle
//!
//! Listeners are invoked outside any store lock, on the thread that caused
//! the change. They must not block; the timer only enqueues work from them.

use periodica_core::Result;
use std::fmt;
use std::sync::Arc;

use crate::field::{ConfigField, ConfigSnapshot, FieldValue};

/// What happened to the watched resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A field value was created, changed or removed
    ValueChanged,
    /// The resource became active
    Activated,
    /// The resource became inactive
    Deactivated,
    /// The resource was deleted; no further events follow
    Deleted,
}

/// Change notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigEvent {
    /// Changed field; `None` for lifecycle events
    pub field: Option<ConfigField>,
    /// Kind of change
    pub kind: ChangeKind,
    /// Store version after the change
    pub version: u64,
}

impl ConfigEvent {
    /// Value change of `field`
    pub fn value_changed(field: ConfigField, version: u64) -> Self {
        ConfigEvent {
            field: Some(field),
            kind: ChangeKind::ValueChanged,
            version,
        }
    }

    /// Resource lifecycle change
    pub fn lifecycle(kind: ChangeKind, version: u64) -> Self {
        ConfigEvent {
            field: None,
            kind,
            version,
        }
    }
}

/// Callback registered with [`ConfigStore::subscribe`]
pub type ConfigListener = Arc<dyn Fn(&ConfigEvent) + Send + Sync>;

/// Handle for removing a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Exclusive write reservation on one field
///
/// Obtained from [`ConfigStore::reserve_exclusive`]; while held, writes to the
/// field are only accepted together with this lease. Hand it back with
/// [`ConfigStore::release_exclusive`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a lease that is dropped without release keeps the field reserved"]
pub struct FieldLease {
    field: ConfigField,
    token: u64,
}

impl FieldLease {
    /// Create a lease; only store implementations should call this.
    pub fn new(field: ConfigField, token: u64) -> Self {
        FieldLease { field, token }
    }

    /// Reserved field
    pub fn field(&self) -> ConfigField {
        self.field
    }

    /// Store-assigned token identifying this reservation
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl fmt::Display for FieldLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lease#{}({})", self.token, self.field)
    }
}

/// Transactional store for one timer configuration resource.
///
/// Thread safety: all methods must be safe to call concurrently.
pub trait ConfigStore: Send + Sync {
    /// Atomically read `fields` (plus the `active` flag).
    ///
    /// # Errors
    ///
    /// `Aborted` when no consistent view can be served (e.g. the resource
    /// was deleted). Nothing is returned partially.
    fn snapshot_read(&self, fields: &[ConfigField]) -> Result<ConfigSnapshot>;

    /// Write (or with `None`, remove) a single field.
    ///
    /// # Errors
    ///
    /// - `Deleted` if the resource no longer exists
    /// - `TypeMismatch` if the value kind does not fit the field
    /// - `FieldReserved` if another lease holds the field
    /// - `InvalidLease` if `lease` does not hold this field
    fn write(
        &self,
        field: ConfigField,
        value: Option<FieldValue>,
        lease: Option<&FieldLease>,
    ) -> Result<()>;

    /// Write several fields in one atomic step.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigStore::write`]; reserved fields cannot be batch-written.
    fn write_batch(&self, entries: Vec<(ConfigField, Option<FieldValue>)>) -> Result<()>;

    /// Reserve `field` for a single writer.
    ///
    /// # Errors
    ///
    /// `FieldReserved` if already reserved, `Deleted` if the resource is gone.
    fn reserve_exclusive(&self, field: ConfigField) -> Result<FieldLease>;

    /// Give up a reservation. Releasing a stale lease is a no-op.
    fn release_exclusive(&self, lease: FieldLease);

    /// Register `listener` for value changes of `fields` and for all
    /// lifecycle changes of the resource.
    fn subscribe(&self, fields: &[ConfigField], listener: ConfigListener) -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Whether the resource is currently active
    fn is_active(&self) -> bool;

    /// Mark the resource active.
    ///
    /// # Errors
    ///
    /// `Deleted` if the resource no longer exists.
    fn activate(&self) -> Result<()>;

    /// Mark the resource inactive.
    ///
    /// # Errors
    ///
    /// `Deleted` if the resource no longer exists.
    fn deactivate(&self) -> Result<()>;

    /// Delete the resource. Idempotent.
    fn delete(&self);
}
