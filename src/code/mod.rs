//! # Code
//!
//! Machine code encodings, per architecture

pub mod x64;
