//! Somnus Power Transition Engine
//!
//! Suspend-to-RAM and hibernation-on-memory for SoCs whose power
//! sequencing lives in retained on-chip memory. The main DRAM path and
//! most of the chip power off; a small retained window keeps a
//! relocated interpreter plus poke tables that walk the hardware down
//! and back up.
//!
//! # Architecture
//!
//! ```text
//! Board code hands off, once, at boot:
//!   - Components (drivers implementing the lifecycle trait)
//!   - Retained window (physical base + CPU alias)
//!   - Wake interrupt source and classifier
//!
//! We do everything else:
//!   - Image assembly (descriptor, interpreter copy, enter/exit
//!     tables, resume trampoline) into the window
//!   - Suspend state machine with early-wake retry
//!   - Hibernation: frozen CPU context + firmware resume marker
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use somnus::{register, Platform, PowerState};
//!
//! let platform = Platform {
//!     components,
//!     wake_irq,
//!     classify: board_classify,
//!     window,
//!     interp: somnus::arch::interpreter_code(),
//!     diag: Some(diag_cfg),
//!     hom: Some(hom_cfg),
//! };
//! let mut orch = register(platform, Box::new(ops), Box::new(bus))?;
//!
//! let wake = orch.suspend(PowerState::MemRetained)?;
//! orch.hibernate()?;
//! ```
//!
//! Everything outside [`arch`] is portable and runs on the host under
//! `cargo test`; the poke-table codec itself lives in the separate
//! `poketable` crate so tables can be built and inspected without
//! pulling in the engine. The embedding environment supplies the
//! global allocator.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod addrmap;
pub mod arch;
pub mod component;
pub mod context;
pub mod diag;
pub mod hom;
pub mod image;
pub mod marker;
pub mod mcm;
pub mod platform;
pub mod suspend;
pub mod wake;

pub use component::{Component, ComponentError, PowerState, WakeSources};
pub use context::{FrozenContext, TranslationState};
pub use diag::DiagConfig;
pub use hom::HomConfig;
pub use image::{assemble_into, ImageDescriptor, ImageLayout, RetainedWindow};
pub use mcm::Mcm;
pub use platform::{register, ConfigError, Platform};
pub use suspend::{Orchestrator, Phase, SuspendError, TransitionOps};
pub use wake::{WakeClassifier, WakeEvent, WakeIrq, WakeKind};
