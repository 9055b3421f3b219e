//! # Protect
//!
//! This module switches memory protections so code pages can be written

use region::Protection;

use crate::error::{PatchError, Result};
use crate::page::PageSpan;

/// Protection requested for code that is about to be patched.
///
/// Execute stays set: the page holds the code that is running the patch, so dropping it
/// faults the moment control returns to that page.
pub const CODE_WRITABLE: Protection = Protection::READ_WRITE_EXECUTE;

/// Changes the protection of a memory range
///
/// # Safety
///
/// Implementors must either change the protection of exactly the requested pages or fail.
/// Reporting success without making the range writable lets the patcher fault on write.
pub unsafe trait ProtectionSwitcher {
    /// Sets the protection of the pages covering `[base, base + len)` to `protection`
    ///
    /// # Safety
    ///
    /// The range must be mapped, and no code that is executing or about to execute may lose
    /// its execute permission.
    unsafe fn switch(
        &self,
        base: *const u8,
        len: usize,
        protection: Protection,
    ) -> std::result::Result<(), region::Error>;
}

/// Switcher backed by the operating system (`mprotect` on unix)
#[derive(Debug, Default, Clone, Copy)]
pub struct RegionSwitcher;

unsafe impl ProtectionSwitcher for RegionSwitcher {
    unsafe fn switch(
        &self,
        base: *const u8,
        len: usize,
        protection: Protection,
    ) -> std::result::Result<(), region::Error> {
        region::protect(base, len, protection)
    }
}

unsafe impl<S: ProtectionSwitcher + ?Sized> ProtectionSwitcher for &S {
    unsafe fn switch(
        &self,
        base: *const u8,
        len: usize,
        protection: Protection,
    ) -> std::result::Result<(), region::Error> {
        (**self).switch(base, len, protection)
    }
}

/// Rejects protections that make code writable but not executable
pub fn check_code_protection(protection: Protection) -> Result<()> {
    if protection.contains(Protection::WRITE) && !protection.contains(Protection::EXECUTE) {
        return Err(PatchError::WriteWithoutExecute);
    }
    Ok(())
}

/// Requests `protection` for a span of code pages through `switcher`
///
/// # Safety
///
/// `span` must cover mapped memory. See [`ProtectionSwitcher::switch`].
pub unsafe fn request<S>(switcher: &S, span: &PageSpan, protection: Protection) -> Result<()>
where
    S: ProtectionSwitcher + ?Sized,
{
    check_code_protection(protection)?;
    switcher
        .switch(span.as_ptr(), span.len(), protection)
        .map_err(PatchError::Protection)
}

/// Makes a span of code pages readable, writable and executable
///
/// The previous protection is not restored afterwards.
///
/// # Safety
///
/// `span` must cover mapped memory.
pub unsafe fn unlock_code<S>(switcher: &S, span: &PageSpan) -> Result<()>
where
    S: ProtectionSwitcher + ?Sized,
{
    request(switcher, span, CODE_WRITABLE)
}

/// Returns the current protection of the page containing `addr`
pub fn protection_at(addr: *const u8) -> Result<Protection> {
    region::query(addr)
        .map(|region| region.protection())
        .map_err(PatchError::Protection)
}

/// Converts a const pointer to a mutable pointer for use after [`unlock_code`].
///
/// # Safety
///
/// **THIS FUNCTION DOES NOT CHANGE MEMORY PERMISSIONS.**
///
/// Writing through the returned pointer is only valid once the page it points to has been unlocked.
pub unsafe fn to_mut<T>(ptr: *const T) -> *mut T {
    ptr as _
}
