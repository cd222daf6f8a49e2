//! Architecture backends.
//!
//! Everything above this module is portable: the state machine, the
//! image assembler, and the poke-table codec run unchanged on the host
//! during tests. This module holds the pieces that only make sense on
//! real silicon: the relocatable interpreter blob, the resume
//! trampoline, and the [`crate::suspend::TransitionOps`] implementation
//! that touches system registers.

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::{interpreter_code, resume_code, HwTransition};
