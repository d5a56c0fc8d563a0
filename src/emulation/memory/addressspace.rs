//! Reservation table for the emulated address space.
//!
//! [`AddressSpace`] only tracks which ranges are taken and with what rights; it holds no
//! page contents. Regions never overlap and are kept sorted by base address, so both
//! overlap checks and address lookups are a single ordered-map probe.

use std::collections::BTreeMap;

use crate::{
    emulation::memory::{MemoryProtection, MemoryRegion},
    serialization::{BufferDeserializer, BufferSerializer, Serializable},
    Error, Result,
};

fn align_up(value: u64, granularity: u64) -> Option<u64> {
    let granularity = granularity.max(1);
    match value % granularity {
        0 => Some(value),
        rest => value.checked_add(granularity - rest),
    }
}

/// Non-overlapping set of reserved [`MemoryRegion`]s.
///
/// # Example
///
/// ```rust
/// use emustate::emulation::{AddressSpace, MemoryProtection};
///
/// let mut space = AddressSpace::new();
/// space.reserve(0x1000_0000, 0x3000, "ntdll.dll", MemoryProtection::READ_EXECUTE)?;
///
/// assert!(!space.is_free(0x1000_2000, 0x1000));
/// assert_eq!(space.region_at(0x1000_2FFF).map(|r| r.name.as_str()), Some("ntdll.dll"));
///
/// // Taken: the next 64K-aligned hole above the floor is handed out instead
/// let base = space.find_free(Some(0x1000_0000), 0x1000, 0x1000_0000, 0x1_0000)?;
/// assert_eq!(base, 0x1001_0000);
/// # Ok::<(), emustate::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressSpace {
    regions: BTreeMap<u64, MemoryRegion>,
}

impl AddressSpace {
    /// Creates an empty address space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `[base, base + size)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for an empty range, [`Error::OutOfMemory`] if the
    /// range wraps around the top of the address space and [`Error::AddressInUse`] if it
    /// overlaps an existing reservation.
    pub fn reserve(
        &mut self,
        base: u64,
        size: u64,
        name: impl Into<String>,
        protection: MemoryProtection,
    ) -> Result<()> {
        if size == 0 {
            return Err(malformed_error!("Cannot reserve an empty range at 0x{:X}", base));
        }

        if base.checked_add(size).is_none() {
            return Err(Error::OutOfMemory(size));
        }

        if !self.is_free(base, size) {
            return Err(Error::AddressInUse(base));
        }

        let region = MemoryRegion {
            base,
            size,
            name: name.into(),
            protection,
        };

        log::debug!(
            "reserved 0x{:X}..0x{:X} ({})",
            region.base,
            region.end(),
            region.name
        );
        self.regions.insert(base, region);
        Ok(())
    }

    /// Releases the reservation starting exactly at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionNotFound`] if no reservation starts at `base`.
    pub fn release(&mut self, base: u64) -> Result<MemoryRegion> {
        let region = self
            .regions
            .remove(&base)
            .ok_or(Error::RegionNotFound(base))?;

        log::debug!(
            "released 0x{:X}..0x{:X} ({})",
            region.base,
            region.end(),
            region.name
        );
        Ok(region)
    }

    /// Returns `true` if no reservation intersects `[base, base + size)`.
    #[must_use]
    pub fn is_free(&self, base: u64, size: u64) -> bool {
        let Some(end) = base.checked_add(size) else {
            return false;
        };

        // Regions are disjoint, so only the last one starting before `end` can reach past `base`
        match self.regions.range(..end).next_back() {
            Some((_, region)) => region.end() <= base,
            None => true,
        }
    }

    /// Picks a base for a `size`-byte range.
    ///
    /// `preferred` is used as is when free. Otherwise the lowest `granularity`-aligned
    /// free range at or above `floor` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if no such range exists.
    pub fn find_free(
        &self,
        preferred: Option<u64>,
        size: u64,
        floor: u64,
        granularity: u64,
    ) -> Result<u64> {
        if let Some(preferred) = preferred {
            if self.is_free(preferred, size) {
                return Ok(preferred);
            }
        }

        let mut candidate = align_up(floor, granularity).ok_or(Error::OutOfMemory(size))?;
        for region in self.regions.values() {
            if region.end() <= candidate {
                continue;
            }

            let end = candidate.checked_add(size).ok_or(Error::OutOfMemory(size))?;
            if end <= region.base {
                return Ok(candidate);
            }

            candidate = align_up(region.end(), granularity).ok_or(Error::OutOfMemory(size))?;
        }

        match candidate.checked_add(size) {
            Some(_) => Ok(candidate),
            None => Err(Error::OutOfMemory(size)),
        }
    }

    /// Returns the reservation containing `address`.
    #[must_use]
    pub fn region_at(&self, address: u64) -> Option<&MemoryRegion> {
        self.regions
            .range(..=address)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.contains(address))
    }

    /// Iterates reservations in ascending base address order.
    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.values()
    }

    /// Number of reservations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` if nothing is reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Serializable for AddressSpace {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_map(&self.regions);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let regions: BTreeMap<u64, MemoryRegion> = buffer.read_map()?;

        let mut previous_end = 0u64;
        for (base, region) in &regions {
            if *base != region.base || region.base < previous_end {
                return Err(malformed_error!(
                    "Inconsistent region table entry at 0x{:X}",
                    base
                ));
            }
            previous_end = region.end();
        }

        Ok(AddressSpace { regions })
    }
}
