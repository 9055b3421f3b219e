//! # Patch
//!
//! This module covers patchers, which are used to overwrite locations in memory

use std::slice;

use crate::error::{PatchError, Result};

pub mod byte;
pub mod mem;

/// Patchers overwrite a location and remember what was there
///
/// # Safety
///
/// Patchers are inherently unsafe. The implementor must ensure that the implementation of `patch` works correctly and is properly documented for avoiding undefined behavior
pub unsafe trait Patcher {
    /// Error type that can occur when patching
    type Error;

    /// Patches a given location.
    ///
    /// # Safety
    ///
    /// This function is intended to be used on arbitrary memory addresses, but must be valid for the supplied patcher
    unsafe fn patch(&self, target: *mut u8, patch: &[u8]) -> std::result::Result<PatchRecord, Self::Error>;
}

/// What a patcher wrote and what it overwrote
///
/// Records are not guards: dropping one leaves the patch in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    /// Location of the patch
    location: *mut u8,
    /// Bytes found at `location` before the patch
    original: Vec<u8>,
    /// Bytes written to `location`
    replacement: Vec<u8>,
}

impl PatchRecord {
    /// Creates a record, the two byte strings must have the same length
    pub fn new(location: *mut u8, original: Vec<u8>, replacement: Vec<u8>) -> Result<Self> {
        if original.len() != replacement.len() {
            return Err(PatchError::LengthMismatch {
                expected: original.len(),
                actual: replacement.len(),
            });
        }
        Ok(Self {
            location,
            original,
            replacement,
        })
    }

    /// Location of the patch
    pub fn location(&self) -> *mut u8 {
        self.location
    }

    /// Bytes that were overwritten
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// Bytes that were written
    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }

    /// Number of bytes patched
    pub fn len(&self) -> usize {
        self.replacement.len()
    }

    /// Checks whether the patch wrote nothing
    pub fn is_empty(&self) -> bool {
        self.replacement.is_empty()
    }

    /// Reads the location back and compares it with the replacement
    ///
    /// # Safety
    ///
    /// `location` must still be valid for reads of [`Self::len`] bytes
    pub unsafe fn read_back(&self) -> Result<()> {
        let current = slice::from_raw_parts(self.location as *const u8, self.len());
        match current
            .iter()
            .zip(&self.replacement)
            .position(|(now, written)| now != written)
        {
            Some(offset) => Err(PatchError::ReadBack { offset }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PatchError;
    use crate::patcher::PatchRecord;

    #[test]
    fn test_record_length_mismatch() {
        let mut data = [0u8; 4];
        assert!(matches!(
            PatchRecord::new(data.as_mut_ptr(), vec![1, 2], vec![3]),
            Err(PatchError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    /// Read back spots the first byte that no longer matches
    fn test_read_back() {
        let mut data = [0x90u8, 0x90, 0xc3];
        let record = PatchRecord::new(data.as_mut_ptr(), vec![0x74, 0x06], vec![0x90, 0x90]).unwrap();
        assert!(unsafe { record.read_back() }.is_ok());

        data[1] = 0x06;
        let record = PatchRecord::new(data.as_mut_ptr(), vec![0x74, 0x06], vec![0x90, 0x90]).unwrap();
        assert!(matches!(
            unsafe { record.read_back() },
            Err(PatchError::ReadBack { offset: 1 })
        ));
    }
}
