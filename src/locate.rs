//! # Locate
//!
//! Finds the instruction to patch inside a live code region.
//!
//! The search is a plain byte scan for an opcode, bounded by a [`PatchWindow`]. A bare byte
//! match can land inside another instruction (an immediate or displacement that happens to
//! contain the opcode value), so [`validate_site`] decodes the window along instruction
//! boundaries and checks the hit before anything is written.
//!
//! Both steps assume the machine code of the routine is known and stable for the build in use.

use std::slice;

use iced_x86::{Code, Decoder, DecoderOptions, Instruction};

use crate::error::{PatchError, Result};
use crate::protect::to_mut;

/// Bounded range of code that is scanned for the patch site
#[derive(Debug, Clone, Copy)]
pub struct PatchWindow {
    /// First byte of the window, normally a routine's entry point
    start: *const u8,
    /// Number of bytes that may be scanned
    len: usize,
}

impl PatchWindow {
    /// Creates a window of `len` bytes starting at `start`
    pub fn new(start: *const u8, len: usize) -> Self {
        Self { start, len }
    }

    /// First byte of the window
    pub fn start(&self) -> *const u8 {
        self.start
    }

    /// Length of the window
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the window has no bytes to scan
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Views the window as a byte slice
    ///
    /// # Safety
    ///
    /// `start` must be [valid](https://doc.rust-lang.org/stable/std/ptr/index.html#safety) for reads of `len` bytes,
    /// and nothing may write to the window while the slice is alive.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.len == 0 {
            return &[];
        }
        slice::from_raw_parts(self.start, self.len)
    }
}

/// Returns the offset of the first byte equal to `opcode`
pub fn find_opcode(window: &[u8], opcode: u8) -> Result<usize> {
    window
        .iter()
        .position(|&byte| byte == opcode)
        .ok_or(PatchError::PatternNotFound {
            opcode,
            window: window.len(),
        })
}

/// Scans live memory for `opcode`, never reading past the end of `window`
///
/// # Safety
///
/// See [`PatchWindow::as_slice`].
pub unsafe fn locate(window: &PatchWindow, opcode: u8) -> Result<*mut u8> {
    let offset = find_opcode(window.as_slice(), opcode)?;
    log::debug!(
        "found opcode {:#04x} at {:p} (+{:#x})",
        opcode,
        window.start().add(offset),
        offset
    );
    Ok(to_mut(window.start().add(offset)))
}

/// Checks that `patch_len` bytes starting at `offset` stay inside a window of `window_len` bytes
pub fn check_fits(window_len: usize, offset: usize, patch_len: usize) -> Result<()> {
    match offset.checked_add(patch_len) {
        Some(end) if end <= window_len => Ok(()),
        _ => Err(PatchError::OutOfWindow {
            offset,
            len: patch_len,
            window: window_len,
        }),
    }
}

/// Checks that `offset` starts an `expected` instruction of exactly `patch_len` bytes
///
/// `window` is decoded from its first byte, which must itself be an instruction boundary.
/// `ip` is the address of that first byte and only affects branch targets in the result.
pub fn validate_site(
    window: &[u8],
    offset: usize,
    ip: u64,
    patch_len: usize,
    expected: Code,
) -> Result<Instruction> {
    let mut decoder = Decoder::with_ip(64, window, ip, DecoderOptions::NONE);
    let mut instruction = Instruction::default();

    while decoder.can_decode() {
        let position = decoder.position();
        if position > offset {
            break;
        }
        decoder.decode_out(&mut instruction);

        if position < offset {
            if position + instruction.len() > offset {
                // the match is an operand byte of this instruction
                break;
            }
            continue;
        }

        if instruction.code() != expected {
            return Err(PatchError::UnexpectedInstruction {
                offset,
                mnemonic: format!("{:?}", instruction.mnemonic()),
                len: instruction.len(),
            });
        }
        if instruction.len() != patch_len {
            return Err(PatchError::LengthMismatch {
                expected: instruction.len(),
                actual: patch_len,
            });
        }
        log::debug!(
            "validated {:?} ({} bytes) at +{:#x}, target {:#x}",
            instruction.mnemonic(),
            instruction.len(),
            offset,
            instruction.near_branch_target()
        );
        return Ok(instruction);
    }

    Err(PatchError::Misaligned { offset })
}
