//! Hibernation marker region.
//!
//! A well-known physical location the boot firmware inspects on every
//! power-up: three signature words followed by one word holding the
//! physical resume-vector address. Matched byte-for-byte by the firmware,
//! so the layout here is a contract, not a convenience; all offset
//! literals stay behind this module.
//!
//! A marker that does not match on what firmware believes is a resume
//! path is fatal with no engine-level recovery; control falls through to
//! the firmware's cold-boot path.
//!
//! # Layout (byte offsets from the marker base)
//!
//! | offset | word        |
//! |--------|-------------|
//! | 0x0    | SIG[0]      |
//! | 0x4    | SIG[1]      |
//! | 0x8    | SIG[2]      |
//! | 0xC    | resume vec  |

use poketable::Mmio;

/// The 3-word signature the firmware matches.
pub const SIGNATURE: [u32; 3] = [0x484F_4D21, 0x5245_5355, 0x4D45_5631]; // "HOM!" "RESU" "MEV1"

const SIG_OFF: [u32; 3] = [0x0, 0x4, 0x8];
const VEC_OFF: u32 = 0xC;

/// Arm the marker: signature plus the physical resume entry point.
pub fn write(bus: &mut dyn Mmio, base: u32, resume_vector: u32) {
    for (i, &sig) in SIGNATURE.iter().enumerate() {
        bus.write32(base + SIG_OFF[i], sig);
    }
    bus.write32(base + VEC_OFF, resume_vector);
}

/// Does the region currently hold a valid marker?
pub fn matches(bus: &mut dyn Mmio, base: u32) -> bool {
    SIGNATURE
        .iter()
        .enumerate()
        .all(|(i, &sig)| bus.read32(base + SIG_OFF[i]) == sig)
}

/// Recorded resume vector. Only meaningful while [`matches`] holds.
pub fn resume_vector(bus: &mut dyn Mmio, base: u32) -> u32 {
    bus.read32(base + VEC_OFF)
}

/// Disarm the marker so an unrelated later reset is not mistaken for a
/// hibernate-resume.
pub fn clear(bus: &mut dyn Mmio, base: u32) {
    for &off in SIG_OFF.iter() {
        bus.write32(base + off, 0);
    }
    bus.write32(base + VEC_OFF, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeBus {
        regs: HashMap<u32, u32>,
    }

    impl Mmio for FakeBus {
        fn read32(&mut self, addr: u32) -> u32 {
            self.regs.get(&addr).copied().unwrap_or(0)
        }
        fn write32(&mut self, addr: u32, val: u32) {
            self.regs.insert(addr, val);
        }
    }

    const BASE: u32 = 0x8060_0000;

    #[test]
    fn test_golden_layout() {
        // Byte-for-byte firmware contract; this test pins it.
        let mut bus = FakeBus::default();
        write(&mut bus, BASE, 0x0180_1234);
        assert_eq!(bus.regs[&(BASE + 0x0)], 0x484F_4D21);
        assert_eq!(bus.regs[&(BASE + 0x4)], 0x5245_5355);
        assert_eq!(bus.regs[&(BASE + 0x8)], 0x4D45_5631);
        assert_eq!(bus.regs[&(BASE + 0xC)], 0x0180_1234);
    }

    #[test]
    fn test_matches_and_vector() {
        let mut bus = FakeBus::default();
        assert!(!matches(&mut bus, BASE));
        write(&mut bus, BASE, 0xCAFE_0000);
        assert!(matches(&mut bus, BASE));
        assert_eq!(resume_vector(&mut bus, BASE), 0xCAFE_0000);
    }

    #[test]
    fn test_partial_signature_does_not_match() {
        let mut bus = FakeBus::default();
        write(&mut bus, BASE, 0x1);
        bus.write32(BASE + 0x4, 0xDEAD_BEEF);
        assert!(!matches(&mut bus, BASE));
    }

    #[test]
    fn test_clear_disarms() {
        let mut bus = FakeBus::default();
        write(&mut bus, BASE, 0x1);
        clear(&mut bus, BASE);
        assert!(!matches(&mut bus, BASE));
        assert_eq!(resume_vector(&mut bus, BASE), 0);
    }
}
