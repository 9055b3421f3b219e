#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
#![doc = include_str!("../README.md")]

#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
compile_error!("selfpatch only supports x86-64 Linux: the patched routine is x86-64 machine code");

pub mod code;
pub mod error;
pub mod locate;
pub mod page;
pub mod patcher;
pub mod protect;
pub mod session;
pub mod target;

pub use error::{PatchError, Result};
pub use session::{Report, Routine, Session, SessionConfig, Stage};
pub use target::{Outcome, TargetRoutine};
