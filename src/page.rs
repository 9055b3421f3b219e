//! # Page
//!
//! Page geometry: the system page size and page-aligned ranges around code addresses

use crate::error::{PatchError, Result};

/// Returns the page size of the running system
pub fn page_size() -> usize {
    region::page::size()
}

/// Aligns `addr` down to the largest multiple of `page_size` that is `<= addr`
///
/// `page_size` must be a power of two, otherwise the mask would clear unrelated bits
/// and the result would land on some other page.
pub fn align_down(addr: usize, page_size: usize) -> Result<usize> {
    if !page_size.is_power_of_two() {
        return Err(PatchError::PageSize { size: page_size });
    }
    // same as `addr & -page_size` for a two's complement page size
    Ok(addr & page_size.wrapping_neg())
}

/// Aligns `addr` up to the next multiple of `page_size`
pub fn align_up(addr: usize, page_size: usize) -> Result<usize> {
    if !page_size.is_power_of_two() {
        return Err(PatchError::PageSize { size: page_size });
    }
    let bumped = addr
        .checked_add(page_size - 1)
        .ok_or(PatchError::Overflow)?;
    align_down(bumped, page_size)
}

/// Whole pages covering a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// First byte of the first page
    base: usize,
    /// Length in bytes, always a multiple of the page size
    len: usize,
}

impl PageSpan {
    /// Computes the smallest run of pages covering `[addr, addr + len)`.
    ///
    /// An empty range still yields the page containing `addr`.
    pub fn covering(addr: usize, len: usize, page_size: usize) -> Result<Self> {
        let base = align_down(addr, page_size)?;
        let end = addr.checked_add(len.max(1)).ok_or(PatchError::Overflow)?;
        let end = align_up(end, page_size)?;
        Ok(Self {
            base,
            len: end - base,
        })
    }

    /// Start of the span
    pub fn base(&self) -> usize {
        self.base
    }

    /// Start of the span as a pointer, for handing to protection calls
    pub fn as_ptr(&self) -> *const u8 {
        self.base as _
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for spans built by [`PageSpan::covering`]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte of the span
    pub fn end(&self) -> usize {
        self.base + self.len
    }

    /// Checks whether `addr` lies inside the span
    pub fn contains(&self, addr: usize) -> bool {
        (self.base..self.end()).contains(&addr)
    }
}
