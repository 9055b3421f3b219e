//! # Target
//!
//! The routine that gets patched.
//!
//! Its machine code is written by hand so the instruction stream is the same for every compiler
//! version and optimisation level: one `je rel8` decides which of two results is returned.
//! The decision depends on an argument hidden behind [`black_box`], so nothing is folded away.
//!
//! ```text
//! 85 ff           test edi, edi
//! 74 06           je   unchanged      <- patched to 90 90
//! b8 01 00 00 00  mov  eax, 1
//! c3              ret
//! unchanged:
//! 31 c0           xor  eax, eax
//! c3              ret
//! ```
//!
//! The routine is followed by [`PADDING`] bytes of `int3` so that a bounded scan starting at its
//! entry never runs into unmapped memory.

use std::fmt::{self, Display};
use std::hint::black_box;
use std::slice;

use crate::session::Routine;

/// Bytes of `int3` placed after the routine
pub const PADDING: usize = 256;

/// Machine code of the routine as assembled
pub const PRISTINE: [u8; 13] = [
    0x85, 0xff, 0x74, 0x06, 0xb8, 0x01, 0x00, 0x00, 0x00, 0xc3, 0x31, 0xc0, 0xc3,
];

std::arch::global_asm!(
    ".text",
    ".balign 16",
    ".globl selfpatch_target_routine",
    "selfpatch_target_routine:",
    "test edi, edi",
    "je 2f",
    "mov eax, 1",
    "ret",
    "2:",
    "xor eax, eax",
    "ret",
    // keep in sync with `PADDING`
    ".fill 256, 1, 0xcc",
);

extern "sysv64" {
    /// Returns 0 when `flag` is 0 and the branch is intact, 1 otherwise
    fn selfpatch_target_routine(flag: u32) -> u32;
}

/// Which of its two results the routine produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The branch was taken, the routine is as assembled
    Unchanged,
    /// The branch fell through, it has been patched out
    Modified,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "Code unchanged"),
            Self::Modified => write!(f, "Code modified itself!"),
        }
    }
}

/// Handle to the assembled routine
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetRoutine;

impl TargetRoutine {
    /// Creates a handle to the routine
    pub fn new() -> Self {
        Self
    }

    /// Machine code the routine was assembled from
    pub fn pristine(&self) -> &'static [u8] {
        &PRISTINE
    }

    /// Reads the routine's current machine code
    pub fn current(&self) -> Vec<u8> {
        // Safety: the routine is mapped and at least `PRISTINE.len()` bytes long
        unsafe { slice::from_raw_parts(self.entry(), PRISTINE.len()) }.to_vec()
    }

    /// Checks whether the routine still matches what was assembled
    pub fn is_pristine(&self) -> bool {
        self.current() == PRISTINE
    }
}

impl Routine for TargetRoutine {
    fn entry(&self) -> *const u8 {
        selfpatch_target_routine as *const u8
    }

    fn invoke(&self) -> Outcome {
        // Safety: the routine follows the sysv64 convention whether or not the branch is patched
        match unsafe { selfpatch_target_routine(black_box(0)) } {
            0 => Outcome::Unchanged,
            _ => Outcome::Modified,
        }
    }
}
