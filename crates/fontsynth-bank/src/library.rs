//! Sound bank loading and caching.

use crate::bank::SoundBank;
use crate::error::Result;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Handle to a bank held by a [`BankLibrary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BankHandle(usize);

impl BankHandle {
    /// Get the internal ID (for debugging/logging only)
    pub fn id(&self) -> usize {
        self.0
    }
}

/// Parsed banks cached by path, shareable across threads.
#[derive(Default)]
pub struct BankLibrary {
    banks: DashMap<usize, Arc<SoundBank>>,
    path_to_handle: DashMap<PathBuf, BankHandle>,
    next_handle: AtomicUsize,
}

impl BankLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a bank from file or return the existing handle for that path.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<BankHandle> {
        let path = path.as_ref().to_path_buf();

        if let Some(handle) = self.path_to_handle.get(&path) {
            return Ok(*handle);
        }

        // Parse outside any map lock
        let bank = SoundBank::load(&path)?;
        info!(
            "Loaded bank '{}' from {} ({} presets)",
            bank.name(),
            path.display(),
            bank.presets.len()
        );

        let handle = self.insert(bank);
        self.path_to_handle.insert(path, handle);
        Ok(handle)
    }

    /// Register a bank built in memory.
    pub fn insert(&self, bank: SoundBank) -> BankHandle {
        let handle = BankHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.banks.insert(handle.0, Arc::new(bank));
        handle
    }

    pub fn get(&self, handle: &BankHandle) -> Option<Arc<SoundBank>> {
        self.banks.get(&handle.0).map(|entry| entry.value().clone())
    }

    /// Drop a bank. Synthesizers already holding it keep their `Arc`.
    pub fn unload(&self, handle: &BankHandle) -> bool {
        self.path_to_handle.retain(|_, h| h != handle);
        self.banks.remove(&handle.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    pub fn handles(&self) -> Vec<BankHandle> {
        self.banks
            .iter()
            .map(|entry| BankHandle(*entry.key()))
            .collect()
    }
}
