//! This module contains a patcher which adjusts memory permissions to patch code

use crate::error::PatchError;
use crate::page::{self, PageSpan};
use crate::protect::{self, ProtectionSwitcher, RegionSwitcher};

use super::{PatchRecord, Patcher};

/// This struct wraps patchers to allow them to write to memory that's normally unwritable.
/// It achieves this result by making every page the patch touches readable, writable and executable,
/// and then triggering the patch. Permissions are left that way afterwards.
///
/// # Safety
///
/// `PermissionWrapper` relies on the size of the patch value to determine how many pages to change write permissions,
/// pairing `PermissionWrapper` with a patcher that writes more memory than the size of the patch is undefined behavior.
///
/// As always, casting a `&T` or `&mut T` to a `*mut u8` for use with `PermissionWrapper` can result in  undefined behavior because rust assumes `&T` will never change and `&mut T` will only be changed via that reference.
/// The `*mut u8` **MUST** be memory not tracked by Rust, or ensured that reading from and writing to data tracked by Rust will not trigger undefined behavior.
pub struct PermissionWrapper<P: Patcher, S: ProtectionSwitcher = RegionSwitcher> {
    /// Underlying patcher.
    patcher: P,
    /// Switcher used to unlock the target pages
    switcher: S,
}
impl<P: Patcher> PermissionWrapper<P> {
    /// Creates a new PermissionWrapper that changes protections through the operating system
    pub fn new(patcher: P) -> Self {
        Self::with_switcher(patcher, RegionSwitcher)
    }
}
impl<P: Patcher, S: ProtectionSwitcher> PermissionWrapper<P, S> {
    /// Creates a new PermissionWrapper using a custom protection switcher
    pub fn with_switcher(patcher: P, switcher: S) -> Self {
        Self { patcher, switcher }
    }

    /// Returns the switcher used by this wrapper
    pub fn switcher(&self) -> &S {
        &self.switcher
    }
}

unsafe impl<P, S> Patcher for PermissionWrapper<P, S>
where
    P: Patcher,
    S: ProtectionSwitcher,
    PatchError: From<P::Error>,
{
    type Error = PatchError;

    unsafe fn patch(&self, location: *mut u8, patch: &[u8]) -> Result<PatchRecord, Self::Error> {
        let span = PageSpan::covering(location as usize, patch.len(), page::page_size())?;
        protect::unlock_code(&self.switcher, &span)?;
        Ok(self.patcher.patch(location, patch)?)
    }
}
