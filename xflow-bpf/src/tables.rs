//! Flow table abstractions.
//!
//! This module provides:
//! - `LiveTable`: the classifier's working table (enumerate, lookup, delete)
//! - `ColdCache`: finalized flows (lookup, insert-or-overwrite, remove, enumerate)
//! - `Attachment`: the XDP hook that must be detached on every exit path
//! - Mock implementations for testing

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use xflow_schema::{Accumulator, FlowKey, LayoutError};

/// Errors from flow table operations.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read flow table: {0}")]
    Read(String),

    #[error("failed to write flow table: {0}")]
    Write(String),

    #[error("failed to delete flow: {0}")]
    Delete(String),

    #[error("malformed flow table entry: {0}")]
    Layout(#[from] LayoutError),
}

/// Errors specific to BPF program operations.
#[derive(Debug, Error)]
pub enum BpfError {
    #[error("failed to load BPF program: {0}")]
    Load(String),

    #[error("failed to attach XDP program to interface '{interface}': {reason}")]
    Attach { interface: String, reason: String },

    #[error("failed to detach XDP program from interface '{interface}': {reason}")]
    Detach { interface: String, reason: String },

    #[error("network interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("insufficient permissions (requires CAP_BPF, CAP_NET_ADMIN)")]
    InsufficientPermissions,
}

/// The classifier's live flow table.
///
/// The classifier keeps inserting and updating entries while the engine
/// reads, so every method must tolerate keys appearing or vanishing between
/// calls. Only the engine deletes.
pub trait LiveTable {
    /// List the keys currently present.
    fn keys(&self) -> Result<Vec<FlowKey>, TableError>;

    /// Read the per-CPU shards for a key. `None` if the key is gone.
    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &FlowKey) -> Result<(), TableError>;

    /// Enumerate all entries, skipping keys that vanish mid-scan.
    fn entries(&self) -> Result<Vec<(FlowKey, Vec<Accumulator>)>, TableError> {
        let mut out = Vec::new();
        for key in self.keys()? {
            if let Some(shards) = self.lookup(&key)? {
                out.push((key, shards));
            }
        }
        Ok(out)
    }
}

/// Finalized flows.
pub trait ColdCache {
    /// Read the shards stored for a key. `None` if it was never finalized.
    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError>;

    /// Insert or overwrite the shards stored for a key.
    fn insert(&self, key: FlowKey, shards: &[Accumulator]) -> Result<(), TableError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &FlowKey) -> Result<(), TableError>;

    /// Enumerate all finalized flows.
    fn entries(&self) -> Result<Vec<(FlowKey, Vec<Accumulator>)>, TableError>;

    /// Number of finalized flows.
    fn len(&self) -> Result<usize, TableError> {
        Ok(self.entries()?.len())
    }
}

/// The classifier's attachment to a network interface.
pub trait Attachment {
    /// Interface the classifier is attached to.
    fn interface(&self) -> &str;

    /// Detach the classifier. Calling it again after success is a no-op.
    fn detach(&mut self) -> Result<(), BpfError>;
}

impl<T: LiveTable + ?Sized> LiveTable for &T {
    fn keys(&self) -> Result<Vec<FlowKey>, TableError> {
        (**self).keys()
    }

    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
        (**self).lookup(key)
    }

    fn delete(&self, key: &FlowKey) -> Result<(), TableError> {
        (**self).delete(key)
    }
}

impl<T: ColdCache + ?Sized> ColdCache for &T {
    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
        (**self).lookup(key)
    }

    fn insert(&self, key: FlowKey, shards: &[Accumulator]) -> Result<(), TableError> {
        (**self).insert(key, shards)
    }

    fn remove(&self, key: &FlowKey) -> Result<(), TableError> {
        (**self).remove(key)
    }

    fn entries(&self) -> Result<Vec<(FlowKey, Vec<Accumulator>)>, TableError> {
        (**self).entries()
    }
}

/// In-memory live table for testing.
/// Cloning creates a new handle to the same underlying data, so a test can
/// play the classifier while the engine holds the table.
#[derive(Debug, Clone, Default)]
pub struct MockLiveTable {
    flows: Arc<RwLock<BTreeMap<FlowKey, Vec<Accumulator>>>>,
    fail_reads: Arc<AtomicBool>,
    failing_deletes: Arc<AtomicUsize>,
}

impl MockLiveTable {
    /// Create a new empty live table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a flow, as the classifier would.
    pub fn upsert(&self, key: FlowKey, shards: Vec<Accumulator>) {
        self.flows.write().unwrap().insert(key, shards);
    }

    /// Number of flows currently present.
    pub fn len(&self) -> usize {
        self.flows.read().unwrap().len()
    }

    /// Returns true if no flows are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.flows.read().unwrap().contains_key(key)
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make the next `count` deletes fail.
    pub fn fail_next_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), TableError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TableError::Read("simulated read failure".to_string()));
        }
        Ok(())
    }
}

impl LiveTable for MockLiveTable {
    fn keys(&self) -> Result<Vec<FlowKey>, TableError> {
        self.check_read()?;
        Ok(self.flows.read().unwrap().keys().copied().collect())
    }

    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
        self.check_read()?;
        Ok(self.flows.read().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &FlowKey) -> Result<(), TableError> {
        let pending = self.failing_deletes.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_deletes.store(pending - 1, Ordering::SeqCst);
            return Err(TableError::Delete("simulated delete failure".to_string()));
        }
        self.flows.write().unwrap().remove(key);
        Ok(())
    }
}

/// In-memory cold cache.
/// Cloning creates a new handle to the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryColdCache {
    flows: Arc<RwLock<BTreeMap<FlowKey, Vec<Accumulator>>>>,
    fail_inserts: Arc<AtomicBool>,
}

impl MemoryColdCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key has been finalized.
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.flows.read().unwrap().contains_key(key)
    }

    /// Get the stored shards for a key.
    pub fn get(&self, key: &FlowKey) -> Option<Vec<Accumulator>> {
        self.flows.read().unwrap().get(key).cloned()
    }

    /// Make every subsequent insert fail.
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }
}

impl ColdCache for MemoryColdCache {
    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
        Ok(self.get(key))
    }

    fn insert(&self, key: FlowKey, shards: &[Accumulator]) -> Result<(), TableError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(TableError::Write("simulated insert failure".to_string()));
        }
        self.flows.write().unwrap().insert(key, shards.to_vec());
        Ok(())
    }

    fn remove(&self, key: &FlowKey) -> Result<(), TableError> {
        self.flows.write().unwrap().remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(FlowKey, Vec<Accumulator>)>, TableError> {
        Ok(self
            .flows
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn len(&self) -> Result<usize, TableError> {
        Ok(self.flows.read().unwrap().len())
    }
}

/// Mock attachment that records detach calls.
/// Cloning shares the recorded state.
#[derive(Debug, Clone)]
pub struct MockAttachment {
    interface: String,
    detach_calls: Arc<AtomicUsize>,
    attached: Arc<AtomicBool>,
    fail: bool,
}

impl MockAttachment {
    /// Create an attachment on the given interface.
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            detach_calls: Arc::new(AtomicUsize::new(0)),
            attached: Arc::new(AtomicBool::new(true)),
            fail: false,
        }
    }

    /// Create an attachment whose detach always fails.
    pub fn failing(interface: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(interface)
        }
    }

    /// Number of times `detach` was called.
    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }

    /// Returns true while the program is still attached.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

impl Attachment for MockAttachment {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn detach(&mut self) -> Result<(), BpfError> {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BpfError::Detach {
                interface: self.interface.clone(),
                reason: "simulated detach failure".to_string(),
            });
        }
        self.attached.store(false, Ordering::SeqCst);
        Ok(())
    }
}
