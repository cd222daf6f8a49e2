//! Virtual-to-physical range translation.
//!
//! All translation-window and physical-offset arithmetic for the engine
//! lives here, behind pure functions over an address-space snapshot, so it
//! is unit-testable without a target device. Nothing else in the engine
//! touches raw virt/phys math.

/// A contiguous address range. `len` is in bytes; an empty range is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub base: u32,
    pub len: u32,
}

impl AddrRange {
    pub const fn new(base: u32, len: u32) -> Self {
        Self { base, len }
    }

    /// Exclusive end, or `None` on wrap.
    pub fn end(&self) -> Option<u32> {
        self.base.checked_add(self.len)
    }

    /// Does this range fully contain `other`?
    pub fn contains(&self, other: &AddrRange) -> bool {
        match (self.end(), other.end()) {
            (Some(se), Some(oe)) => other.base >= self.base && oe <= se,
            _ => false,
        }
    }
}

/// One virt→phys segment of the address-space snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub virt: u32,
    pub phys: u32,
    pub len: u32,
}

impl Segment {
    pub const fn new(virt: u32, phys: u32, len: u32) -> Self {
        Self { virt, phys, len }
    }

    fn virt_range(&self) -> AddrRange {
        AddrRange::new(self.virt, self.len)
    }
}

/// Translate a virtual range to physical.
///
/// The range must lie entirely inside one segment; a range that straddles
/// segments is not contiguous in physical space and translates to `None`.
pub fn map_virtual_to_physical(range: AddrRange, segments: &[Segment]) -> Option<AddrRange> {
    for seg in segments {
        if seg.virt_range().contains(&range) {
            let delta = range.base - seg.virt;
            return Some(AddrRange::new(seg.phys.checked_add(delta)?, range.len));
        }
    }
    None
}
