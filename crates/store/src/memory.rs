//! In-memory configuration store
//!
//! Reference implementation of [`ConfigStore`]:
//! - all fields live behind one `RwLock`, so every snapshot is consistent
//! - a monotonically increasing version is bumped on every effective change
//! - listeners are collected under the lock and invoked after it is released
//!
//! A snapshot of a deleted resource aborts. An inactive resource can still be
//! read; the snapshot reports `active = false`.

use parking_lot::{Mutex, RwLock};
use periodica_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::TimerConfig;
use crate::field::{ConfigField, ConfigSnapshot, FieldValue};
use crate::store::{
    ChangeKind, ConfigEvent, ConfigListener, ConfigStore, FieldLease, SubscriptionId,
};

/// Lifecycle state of the configuration resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Exists and is active
    Active,
    /// Exists but is inactive
    Inactive,
    /// Deleted; terminal
    Deleted,
}

struct StoreState {
    values: BTreeMap<ConfigField, FieldValue>,
    status: ResourceStatus,
    version: u64,
    /// field -> lease token
    leases: HashMap<ConfigField, u64>,
}

struct Subscription {
    id: SubscriptionId,
    fields: Vec<ConfigField>,
    listener: ConfigListener,
}

/// Thread-safe in-memory [`ConfigStore`].
pub struct MemoryConfigStore {
    state: RwLock<StoreState>,
    subscriptions: Mutex<Vec<Subscription>>,
    next_subscription: AtomicU64,
    next_lease: AtomicU64,
}

impl MemoryConfigStore {
    /// Create an empty, inactive resource.
    pub fn new() -> Self {
        Self::with_status(BTreeMap::new(), ResourceStatus::Inactive)
    }

    fn with_status(values: BTreeMap<ConfigField, FieldValue>, status: ResourceStatus) -> Self {
        MemoryConfigStore {
            state: RwLock::new(StoreState {
                values,
                status,
                version: 0,
                leases: HashMap::new(),
            }),
            subscriptions: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            next_lease: AtomicU64::new(1),
        }
    }

    /// Create a resource populated from a parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn from_config(config: &TimerConfig) -> Result<Self> {
        config.validate()?;
        let status = if config.active {
            ResourceStatus::Active
        } else {
            ResourceStatus::Inactive
        };
        let values = config
            .entries()
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .collect();
        Ok(Self::with_status(values, status))
    }

    /// Export the current contents as a configuration.
    ///
    /// # Errors
    ///
    /// `Deleted` if the resource no longer exists.
    pub fn to_config(&self) -> Result<TimerConfig> {
        let state = self.state.read();
        if state.status == ResourceStatus::Deleted {
            return Err(Error::Deleted);
        }
        let mut snapshot = ConfigSnapshot::default();
        for (field, value) in &state.values {
            snapshot.fill(*field, value);
        }
        snapshot.active = state.status == ResourceStatus::Active;
        Ok(TimerConfig::from_snapshot(&snapshot))
    }

    /// Current lifecycle state
    pub fn status(&self) -> ResourceStatus {
        self.state.read().status
    }

    /// Current store version
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Whether `field` is currently reserved
    pub fn is_reserved(&self, field: ConfigField) -> bool {
        self.state.read().leases.contains_key(&field)
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn set_status(&self, status: ResourceStatus) -> Result<()> {
        let event = {
            let mut state = self.state.write();
            if state.status == ResourceStatus::Deleted {
                return Err(Error::Deleted);
            }
            if state.status == status {
                return Ok(());
            }
            state.status = status;
            state.version += 1;
            let kind = match status {
                ResourceStatus::Active => ChangeKind::Activated,
                ResourceStatus::Inactive => ChangeKind::Deactivated,
                ResourceStatus::Deleted => ChangeKind::Deleted,
            };
            ConfigEvent::lifecycle(kind, state.version)
        };
        debug!(target: "periodica::store", kind = ?event.kind, "Resource lifecycle changed");
        self.notify(&[event]);
        Ok(())
    }

    fn check_lease(
        state: &StoreState,
        field: ConfigField,
        lease: Option<&FieldLease>,
    ) -> Result<()> {
        match (state.leases.get(&field), lease) {
            (None, None) => Ok(()),
            (Some(_), None) => Err(Error::FieldReserved(field.name().to_string())),
            (Some(token), Some(lease)) if lease.field() == field && lease.token() == *token => {
                Ok(())
            }
            (_, Some(_)) => Err(Error::InvalidLease(field.name().to_string())),
        }
    }

    /// Apply a value under the write lock; returns true if anything changed.
    fn apply(state: &mut StoreState, field: ConfigField, value: Option<FieldValue>) -> bool {
        match value {
            Some(v) => state.values.insert(field, v) != Some(v),
            None => state.values.remove(&field).is_some(),
        }
    }

    fn notify(&self, events: &[ConfigEvent]) {
        if events.is_empty() {
            return;
        }
        let targets: Vec<(ConfigListener, Vec<ConfigEvent>)> = {
            let subscriptions = self.subscriptions.lock();
            subscriptions
                .iter()
                .filter_map(|sub| {
                    let matching: Vec<ConfigEvent> = events
                        .iter()
                        .filter(|e| match e.field {
                            Some(field) => sub.fields.contains(&field),
                            None => true,
                        })
                        .copied()
                        .collect();
                    if matching.is_empty() {
                        None
                    } else {
                        Some((Arc::clone(&sub.listener), matching))
                    }
                })
                .collect()
        };

        for (listener, matching) in targets {
            for event in matching {
                let call = std::panic::AssertUnwindSafe(|| listener(&event));
                if std::panic::catch_unwind(call).is_err() {
                    error!(target: "periodica::store", ?event, "Config listener panicked");
                }
            }
        }
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn snapshot_read(&self, fields: &[ConfigField]) -> Result<ConfigSnapshot> {
        let state = self.state.read();
        if state.status == ResourceStatus::Deleted {
            return Err(Error::Aborted("configuration resource deleted".to_string()));
        }
        let mut snapshot = ConfigSnapshot {
            version: state.version,
            active: state.status == ResourceStatus::Active,
            ..ConfigSnapshot::default()
        };
        for field in fields {
            if let Some(value) = state.values.get(field) {
                snapshot.fill(*field, value);
            }
        }
        Ok(snapshot)
    }

    fn write(
        &self,
        field: ConfigField,
        value: Option<FieldValue>,
        lease: Option<&FieldLease>,
    ) -> Result<()> {
        if let Some(v) = &value {
            field.check(v)?;
        }
        let event = {
            let mut state = self.state.write();
            if state.status == ResourceStatus::Deleted {
                return Err(Error::Deleted);
            }
            Self::check_lease(&state, field, lease)?;
            if !Self::apply(&mut state, field, value) {
                return Ok(());
            }
            state.version += 1;
            ConfigEvent::value_changed(field, state.version)
        };
        self.notify(&[event]);
        Ok(())
    }

    fn write_batch(&self, entries: Vec<(ConfigField, Option<FieldValue>)>) -> Result<()> {
        for (field, value) in &entries {
            if let Some(v) = value {
                field.check(v)?;
            }
        }
        let events = {
            let mut state = self.state.write();
            if state.status == ResourceStatus::Deleted {
                return Err(Error::Deleted);
            }
            for (field, _) in &entries {
                Self::check_lease(&state, *field, None)?;
            }
            let changed: Vec<ConfigField> = entries
                .into_iter()
                .filter_map(|(field, value)| Self::apply(&mut state, field, value).then_some(field))
                .collect();
            if changed.is_empty() {
                return Ok(());
            }
            state.version += 1;
            let version = state.version;
            changed
                .into_iter()
                .map(|field| ConfigEvent::value_changed(field, version))
                .collect::<Vec<_>>()
        };
        self.notify(&events);
        Ok(())
    }

    fn reserve_exclusive(&self, field: ConfigField) -> Result<FieldLease> {
        let mut state = self.state.write();
        if state.status == ResourceStatus::Deleted {
            return Err(Error::Deleted);
        }
        if state.leases.contains_key(&field) {
            return Err(Error::FieldReserved(field.name().to_string()));
        }
        let token = self.next_lease.fetch_add(1, Ordering::Relaxed);
        state.leases.insert(field, token);
        debug!(target: "periodica::store", %field, token, "Field reserved");
        Ok(FieldLease::new(field, token))
    }

    fn release_exclusive(&self, lease: FieldLease) {
        let mut state = self.state.write();
        if state.leases.get(&lease.field()) == Some(&lease.token()) {
            state.leases.remove(&lease.field());
            debug!(target: "periodica::store", %lease, "Field released");
        }
    }

    fn subscribe(&self, fields: &[ConfigField], listener: ConfigListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            fields: fields.to_vec(),
            listener,
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.lock().retain(|sub| sub.id != id);
    }

    fn is_active(&self) -> bool {
        self.state.read().status == ResourceStatus::Active
    }

    fn activate(&self) -> Result<()> {
        self.set_status(ResourceStatus::Active)
    }

    fn deactivate(&self) -> Result<()> {
        self.set_status(ResourceStatus::Inactive)
    }

    fn delete(&self) {
        let event = {
            let mut state = self.state.write();
            if state.status == ResourceStatus::Deleted {
                return;
            }
            state.status = ResourceStatus::Deleted;
            state.values.clear();
            state.leases.clear();
            state.version += 1;
            ConfigEvent::lifecycle(ChangeKind::Deleted, state.version)
        };
        debug!(target: "periodica::store", "Resource deleted");
        self.notify(&[event]);
    }
}
