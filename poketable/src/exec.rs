//! Portable poke-table interpreter.
//!
//! Reference semantics for the instruction set, generic over an [`Mmio`]
//! bus. The suspend engine runs this directly for shallow power levels and
//! for host-side tests; the copy that executes with the MMU torn down is
//! the relocatable arch blob, which implements the same loop in assembly.
//!
//! Single-threaded, cooperative, not reentrant. Runs strictly in order
//! until it decodes `End`, then returns. The only blocking operation is
//! the `WaitUntil` spin, which has no timeout by contract.

use crate::instr::{CodecError, InstrReader, Instruction};

/// 32-bit memory-mapped bus access.
///
/// The engine performs no logging or diagnostics through this trait; side
/// effects are direct MMIO and nothing else.
pub trait Mmio {
    fn read32(&mut self, addr: u32) -> u32;
    fn write32(&mut self, addr: u32, val: u32);
}

/// [`Mmio`] over real hardware: volatile accesses through an identity (or
/// equivalent fixed-offset) mapping of the register space.
pub struct DeviceMmio {
    /// Added to every operand address before dereferencing. Zero for a
    /// pure identity mapping.
    offset: usize,
}

impl DeviceMmio {
    /// # Safety
    /// Every address executed through this bus must be mapped, device-type
    /// or uncached, and safe to access at 32-bit width for the lifetime of
    /// the value.
    pub const unsafe fn new(offset: usize) -> Self {
        Self { offset }
    }
}

impl Mmio for DeviceMmio {
    #[inline]
    fn read32(&mut self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile((addr as usize + self.offset) as *const u32) }
    }

    #[inline]
    fn write32(&mut self, addr: u32, val: u32) {
        unsafe { core::ptr::write_volatile((addr as usize + self.offset) as *mut u32, val) }
    }
}

/// Execute one table to completion.
///
/// Returns the number of instructions retired (terminator included) on a
/// clean `End`. A table that runs off the end of the slice without an
/// `End` is a codec error, not a partial success.
pub fn run<B: Mmio>(bus: &mut B, table: &[u32]) -> Result<usize, CodecError> {
    let mut retired = 0usize;
    for instr in InstrReader::new(table) {
        retired += 1;
        match instr? {
            Instruction::Poke { addr, val } => bus.write32(addr, val),
            Instruction::Or { addr, mask } => {
                let v = bus.read32(addr);
                bus.write32(addr, v | mask);
            }
            Instruction::Update { addr, clear, set } => {
                let v = bus.read32(addr);
                bus.write32(addr, (v & !clear) | set);
            }
            Instruction::WaitUntil {
                addr,
                mask,
                expected,
            } => {
                // No timeout: non-convergence is an unrecoverable hang,
                // prevented by table authorship, not detected here.
                while bus.read32(addr) & mask != expected {
                    core::hint::spin_loop();
                }
            }
            Instruction::End => return Ok(retired),
        }
    }
    Err(CodecError::MissingEnd)
}
