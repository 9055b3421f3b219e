//! # Error
//!
//! Errors that abort a patching run

use thiserror::Error;

use crate::session::Stage;

/// Every way a patching run can fail. All of them are fatal.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Page size is zero or not a power of two, so aligning to it is meaningless
    #[error("page size {size:#x} is not a power of two")]
    PageSize {
        /// Offending page size
        size: usize,
    },
    /// Address arithmetic wrapped around the address space
    #[error("address range overflows the address space")]
    Overflow,
    /// Code would be made writable without staying executable
    #[error("refusing to make code writable without execute permission")]
    WriteWithoutExecute,
    /// The platform rejected the protection change
    #[error("failed to change memory protection: {0}")]
    Protection(#[source] region::Error),
    /// The bounded scan ran off the end of the window
    #[error("opcode {opcode:#04x} not found within {window} bytes")]
    PatternNotFound {
        /// Opcode that was searched for
        opcode: u8,
        /// Length of the scanned window
        window: usize,
    },
    /// The instruction to overwrite does not end inside the scanned window
    #[error("{len} bytes at offset {offset:#x} run past the {window} byte window")]
    OutOfWindow {
        /// Offset of the match inside the window
        offset: usize,
        /// Number of bytes that would be written
        len: usize,
        /// Length of the scanned window
        window: usize,
    },
    /// The matched byte is not the first byte of an instruction
    #[error("match at offset {offset:#x} is not on an instruction boundary")]
    Misaligned {
        /// Offset of the match inside the window
        offset: usize,
    },
    /// The matched instruction is not the branch the patch expects
    #[error("unexpected {mnemonic} ({len} bytes) at offset {offset:#x}")]
    UnexpectedInstruction {
        /// Offset of the match inside the window
        offset: usize,
        /// Mnemonic of the decoded instruction
        mnemonic: String,
        /// Length of the decoded instruction
        len: usize,
    },
    /// Replacement length differs from the instruction it replaces
    #[error("instruction is {expected} bytes long but the replacement is {actual}")]
    LengthMismatch {
        /// Length of the original instruction
        expected: usize,
        /// Length of the replacement
        actual: usize,
    },
    /// Bytes read back after the write differ from what was written
    #[error("patched bytes differ from the replacement at offset {offset}")]
    ReadBack {
        /// First differing offset from the patch location
        offset: usize,
    },
    /// A session only runs once
    #[error("session already ran and is {stage}")]
    AlreadyRan {
        /// Stage the session finished in
        stage: Stage,
    },
    /// The routine still behaves like the unpatched original
    #[error("routine output did not change after patching")]
    NoEffect,
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, PatchError>;
