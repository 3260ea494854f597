//! Write-once context slots.
//!
//! Steps of one pipeline hand data to each other through a typed
//! context: a struct of [`ContextSlot`]s shared by `Arc` across the
//! steps the factory wires together. Each slot fills monotonically -
//! unset to set, exactly once during forward execution - so a step can
//! rely on "whoever wrote this, wrote it once". Rollback may clear a
//! slot its step wrote.
//!
//! # Example
//!
//! ```
//! use syncmesh_process::ContextSlot;
//!
//! struct DownloadContext {
//!     file_key: ContextSlot<String>,
//! }
//!
//! let ctx = DownloadContext { file_key: ContextSlot::new("file_key") };
//! ctx.file_key.set("F".into()).expect("first write");
//! assert!(ctx.file_key.set("G".into()).is_err());
//! assert_eq!(ctx.file_key.get().unwrap(), "F");
//! ```

use crate::ProcessError;
use parking_lot::Mutex;

/// A single write-once field of a pipeline context.
///
/// | Op | First call | Second call |
/// |----|------------|-------------|
/// | `set` | Ok | `PROCESS_SLOT_ALREADY_SET` |
/// | `get` | value (after set) | value |
/// | `take` | value, empties slot | `PROCESS_SLOT_EMPTY` |
///
/// `clear` exists for rollback paths: a step undoing its work may clear
/// the field it wrote, after which a retry could fill it again.
pub struct ContextSlot<T> {
    name: &'static str,
    cell: Mutex<Option<T>>,
}

impl<T> ContextSlot<T> {
    /// Creates an empty slot. The name appears in error messages.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: Mutex::new(None),
        }
    }

    /// Fills the slot.
    ///
    /// # Errors
    ///
    /// [`ProcessError::SlotAlreadySet`] if the slot already holds a
    /// value - a context field must be written exactly once during the
    /// forward pass.
    pub fn set(&self, value: T) -> Result<(), ProcessError> {
        let mut cell = self.cell.lock();
        if cell.is_some() {
            return Err(ProcessError::SlotAlreadySet(self.name));
        }
        *cell = Some(value);
        Ok(())
    }

    /// Removes and returns the value (single-shot retrieval).
    ///
    /// # Errors
    ///
    /// [`ProcessError::SlotEmpty`] if the slot is empty.
    pub fn take(&self) -> Result<T, ProcessError> {
        self.cell.lock().take().ok_or(ProcessError::SlotEmpty(self.name))
    }

    /// Empties the slot during rollback. Returns the previous value.
    pub fn clear(&self) -> Option<T> {
        self.cell.lock().take()
    }

    /// Returns `true` if the slot holds a value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.cell.lock().is_some()
    }
}

impl<T: Clone> ContextSlot<T> {
    /// Returns a clone of the value.
    ///
    /// # Errors
    ///
    /// [`ProcessError::SlotEmpty`] if the slot is empty.
    pub fn get(&self) -> Result<T, ProcessError> {
        self.cell.lock().clone().ok_or(ProcessError::SlotEmpty(self.name))
    }

    /// Returns a clone of the value, or `None` if unset.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        self.cell.lock().clone()
    }
}

impl<T> std::fmt::Debug for ContextSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSlot")
            .field("name", &self.name)
            .field("set", &self.is_set())
            .finish()
    }
}
