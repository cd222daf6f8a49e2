//! Poke-Table Instruction Format and Interpreter
//!
//! A poke table is a flat array of fixed-width `u32` words describing
//! register writes, read-modify-writes and spin-waits. Tables are authored
//! by per-chip configuration code, relocated into retained memory by the
//! engine, and executed while normal memory and the MMU are being torn
//! down, so nothing here may allocate, log, or grow the stack.
//!
//! # Design Philosophy
//!
//! - **Position-independent**: every operand address is absolute; nothing
//!   in the encoding refers to the table's own location, so a table can be
//!   copied byte-for-byte anywhere and still mean the same thing.
//! - **Fixed-width**: each opcode occupies a fixed number of words, so the
//!   decoder is a cursor, not a parser.
//! - **No services**: the interpreter's only dependency is an [`Mmio`]
//!   implementation. No heap, no timers, no diagnostics.
//!
//! # Instruction Set
//!
//! | Instruction              | Words | Effect                               |
//! |--------------------------|-------|--------------------------------------|
//! | `Poke(addr, val)`        | 3     | `*addr = val`                        |
//! | `Or(addr, mask)`         | 3     | `*addr |= mask`                      |
//! | `Update(addr, clr, set)` | 4     | `*addr = (*addr & !clr) | set`       |
//! | `WaitUntil(addr, m, e)`  | 4     | spin until `*addr & m == e`          |
//! | `End`                    | 1     | stop, return to caller               |
//!
//! `WaitUntil` has **no timeout**. The table author guarantees eventual
//! convergence; a table that never converges hangs the core, and that is
//! the contract.
//!
//! # Usage
//!
//! ```ignore
//! use poketable::{Instruction, encode_into, run};
//!
//! let table = [
//!     Instruction::Poke { addr: 0x8010_1000, val: 0x1 },
//!     Instruction::WaitUntil { addr: 0x8010_1004, mask: 0x2, expected: 0x2 },
//!     Instruction::End,
//! ];
//!
//! let mut words = [0u32; 16];
//! let n = encode_into(&table, &mut words)?;
//!
//! // Later, from the suspend path:
//! run(&mut bus, &words[..n])?;
//! ```

#![cfg_attr(not(test), no_std)]

mod exec;
mod instr;

pub use exec::{run, DeviceMmio, Mmio};
pub use instr::{
    encode_into, encoded_len, words_for, CodecError, InstrReader, Instruction, OP_END, OP_OR,
    OP_POKE, OP_UPDATE, OP_WAIT,
};
