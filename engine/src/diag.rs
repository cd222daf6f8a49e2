//! Early diagnostic output.
//!
//! Minimal raw UART output for before any higher-level console exists.
//! The board supplies a register base plus bit-rate parameters; the
//! engine computes the divisor and programs the port directly. No
//! buffering, no interrupts, pure polling, and a bounded wait on the
//! transmit-empty flag so a dead port cannot wedge a suspend attempt.
//!
//! Everything is a silent no-op until [`init`] runs (the orchestrator
//! never logs while executing from retained memory; whatever it wants
//! said must be said before `Enter`).

use poketable::Mmio;
use spin::Once;

/// 16550-style register offsets, 4-byte stride.
const DLL: u32 = 0x00; // divisor latch low (DLAB=1)
const DLM: u32 = 0x04; // divisor latch high (DLAB=1)
const THR: u32 = 0x00; // transmit holding (DLAB=0)
const FCR: u32 = 0x08;
const LCR: u32 = 0x0C;
const LSR: u32 = 0x14;

const LCR_8N1: u32 = 0x03;
const LCR_DLAB: u32 = 0x80;
const FCR_ENABLE: u32 = 0x01;
const LSR_TX_EMPTY: u32 = 0x20;

/// Early-diagnostic descriptor, supplied by the board at registration.
#[derive(Debug, Clone, Copy)]
pub struct DiagConfig {
    /// Register base (uncached/device mapping).
    pub base: u32,
    /// Input clock to the baud generator.
    pub clock_hz: u32,
    /// Requested bit rate.
    pub baud: u32,
}

/// Baud divisor, conventional 16x oversampling, rounded to nearest.
/// A zero bit rate clamps to the fastest divisor instead of faulting;
/// the port stays usable and the misconfiguration shows on the wire.
pub const fn divisor(clock_hz: u32, baud: u32) -> u16 {
    if baud == 0 {
        return 1;
    }
    ((clock_hz + 8 * baud) / (16 * baud)) as u16
}

/// Program the port: divisor latch, 8N1, FIFO on.
pub fn program(bus: &mut dyn Mmio, cfg: &DiagConfig) {
    let div = divisor(cfg.clock_hz, cfg.baud) as u32;
    bus.write32(cfg.base + LCR, LCR_DLAB | LCR_8N1);
    bus.write32(cfg.base + DLL, div & 0xFF);
    bus.write32(cfg.base + DLM, (div >> 8) & 0xFF);
    bus.write32(cfg.base + LCR, LCR_8N1);
    bus.write32(cfg.base + FCR, FCR_ENABLE);
}

struct Port {
    base: u32,
}

impl Port {
    /// Write one byte. Bounded wait, gives up after ~100 spins.
    fn putc(&self, b: u8) {
        unsafe {
            for _ in 0..100 {
                let lsr = core::ptr::read_volatile((self.base + LSR) as usize as *const u32);
                if lsr & LSR_TX_EMPTY != 0 {
                    core::ptr::write_volatile((self.base + THR) as usize as *mut u32, b as u32);
                    return;
                }
                core::hint::spin_loop();
            }
        }
    }
}

static PORT: Once<Port> = Once::new();

/// Program the configured port and route `puts`/`put_hex*` to it.
///
/// # Safety
/// `cfg.base` must be the uncached/device mapping of a present UART,
/// valid for the rest of the process.
pub unsafe fn init(cfg: &DiagConfig) {
    PORT.call_once(|| {
        let mut bus = poketable::DeviceMmio::new(0);
        program(&mut bus, cfg);
        Port { base: cfg.base }
    });
}

/// Write a string. No-op before [`init`].
pub fn puts(s: &str) {
    if let Some(port) = PORT.get() {
        for b in s.bytes() {
            if b == b'\n' {
                port.putc(b'\r');
            }
            port.putc(b);
        }
    }
}

/// Write a u32 as hex (0x prefix).
pub fn put_hex32(val: u32) {
    if let Some(port) = PORT.get() {
        port.putc(b'0');
        port.putc(b'x');
        for i in (0..8).rev() {
            let nibble = ((val >> (i * 4)) & 0xF) as u8;
            let c = if nibble < 10 {
                b'0' + nibble
            } else {
                b'a' + nibble - 10
            };
            port.putc(c);
        }
    }
}

/// Write a u64 as hex.
pub fn put_hex64(val: u64) {
    put_hex32((val >> 32) as u32);
    put_hex32(val as u32);
}

/// Debug log with [PM] prefix.
#[macro_export]
macro_rules! pm_dbg {
    ($($arg:tt)*) => {{
        $crate::diag::puts("[PM] ");
        $crate::diag::puts($($arg)*);
        $crate::diag::puts("\n");
    }};
}
