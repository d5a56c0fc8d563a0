//! Reserved ranges of the emulated address space.

use bitflags::bitflags;

use crate::{
    serialization::{BufferDeserializer, BufferSerializer, Serializable},
    Result,
};

bitflags! {
    /// Memory protection flags for address space regions.
    ///
    /// Derived from PE section characteristics for image regions.
    ///
    /// # Common Combinations
    ///
    /// - [`READ_WRITE`](Self::READ_WRITE) - Data sections (`.data`, `.bss`)
    /// - [`READ_EXECUTE`](Self::READ_EXECUTE) - Code sections (`.text`)
    /// - [`READ`](Self::READ) - Read-only sections (`.rdata`)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemoryProtection: u32 {
        /// Region is readable.
        const READ = 0x01;
        /// Region is writable.
        const WRITE = 0x02;
        /// Region is executable.
        const EXECUTE = 0x04;
        /// Read and write access (common for data sections).
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// Read and execute access (common for code sections).
        const READ_EXECUTE = Self::READ.bits() | Self::EXECUTE.bits();
        /// Read, write, and execute access.
        const READ_WRITE_EXECUTE = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
    }
}

impl MemoryProtection {
    /// IMAGE_SCN_MEM_EXECUTE
    const SCN_MEM_EXECUTE: u32 = 0x2000_0000;
    /// IMAGE_SCN_MEM_READ
    const SCN_MEM_READ: u32 = 0x4000_0000;
    /// IMAGE_SCN_MEM_WRITE
    const SCN_MEM_WRITE: u32 = 0x8000_0000;

    /// Converts PE section characteristics to protection flags.
    #[must_use]
    pub fn from_section_characteristics(characteristics: u32) -> Self {
        let mut protection = MemoryProtection::empty();
        if characteristics & Self::SCN_MEM_EXECUTE != 0 {
            protection |= MemoryProtection::EXECUTE;
        }
        if characteristics & Self::SCN_MEM_READ != 0 {
            protection |= MemoryProtection::READ;
        }
        if characteristics & Self::SCN_MEM_WRITE != 0 {
            protection |= MemoryProtection::WRITE;
        }
        protection
    }
}

/// A reserved range `[base, base + size)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    /// First address of the range
    pub base: u64,
    /// Length of the range in bytes
    pub size: u64,
    /// Label used in diagnostics, usually the image name
    pub name: String,
    /// Access rights of the range
    pub protection: MemoryProtection,
}

impl MemoryRegion {
    /// One past the last address of the range, saturating at `u64::MAX`.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// Returns `true` if `address` lies inside the range.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

impl Serializable for MemoryRegion {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write(&self.base);
        buffer.write(&self.size);
        buffer.write_string(&self.name);
        buffer.write(&self.protection.bits());
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let base = buffer.read()?;
        let size = buffer.read()?;
        let name = buffer.read_string()?;

        let bits = buffer.read::<u32>()?;
        let protection = MemoryProtection::from_bits(bits)
            .ok_or_else(|| malformed_error!("Invalid protection flags - 0x{:X}", bits))?;

        Ok(MemoryRegion {
            base,
            size,
            name,
            protection,
        })
    }
}
