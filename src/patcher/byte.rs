//! This module contains a byte patcher

use std::ptr;

use crate::error::PatchError;

use super::{PatchRecord, Patcher};

/// Patcher for patching memory locations with byte arrays.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytePatcher;
impl BytePatcher {
    /// Creates a new [`BytePatcher`]
    pub fn new() -> Self {
        Self::default()
    }
}
unsafe impl Patcher for BytePatcher {
    type Error = PatchError;

    unsafe fn patch(&self, location: *mut u8, patch: &[u8]) -> Result<PatchRecord, Self::Error> {
        let mut original = Vec::with_capacity(patch.len());

        // Safety: caller must pass in a `location` pointer that is valid for the full length of the patch
        ptr::copy(location, original.as_mut_ptr(), patch.len());

        // Safety: We initialized the vec to patch.len(), so fix the length
        original.set_len(patch.len());

        let record = PatchRecord::new(location, original, patch.to_vec())?;

        // Safety: caller must ensure that `location` is writable
        ptr::copy(patch.as_ptr(), location, patch.len());

        Ok(record)
    }
}
