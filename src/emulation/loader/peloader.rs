//! PE image mapper for the module manager.
//!
//! This module provides [`PeMapper`], the [`ModuleMapper`] used for Windows images. It
//! memory-maps the file, parses it with `goblin`, reserves the image range in its
//! [`AddressSpace`] and describes the result as a [`MappedModule`].
//!
//! # Base Selection
//!
//! The image's preferred base from the optional header is used when that range is free.
//! Otherwise the lowest free range at or above
//! [`PeMapperConfig::allocation_base`] that is aligned to
//! [`PeMapperConfig::allocation_granularity`] is taken. Images are never relocated and
//! imports are not resolved; only the reservation and the export directory matter here.
//!
//! # Usage
//!
//! ```rust,no_run
//! use emustate::emulation::{LogLogger, ModuleManager, PeMapper, PeMapperConfig};
//! use std::path::Path;
//!
//! let config = PeMapperConfig::new()
//!     .with_allocation_base(0x7FF0_0000_0000)
//!     .without_permissions();
//! let mut manager = ModuleManager::new(PeMapper::with_config(config));
//!
//! let ntdll = manager.map(Path::new("root/Windows/System32/ntdll.dll"), &LogLogger)?;
//! println!("{} at 0x{:X}", ntdll.name, ntdll.image_base);
//! # Ok::<(), emustate::Error>(())
//! ```

use std::{fs::File, path::Path};

use goblin::pe::PE;
use memmap2::Mmap;

use crate::{
    emulation::{
        memory::{AddressSpace, MemoryProtection},
        module::{ExportedSymbol, MappedModule, ModuleMapper},
    },
    Result,
};

/// Configuration options for [`PeMapper`].
///
/// # Default Configuration
///
/// - Fallback allocations start at `0x1000_0000`
/// - Fallback bases are aligned to 64 KiB, the Windows allocation granularity
/// - Reservations carry the union of the image's section protections
///
/// # Example
///
/// ```rust
/// use emustate::emulation::PeMapperConfig;
///
/// let config = PeMapperConfig::new()
///     .with_allocation_base(0x7FF0_0000_0000)
///     .with_allocation_granularity(0x1000);
/// assert_eq!(config.allocation_base, 0x7FF0_0000_0000);
/// assert!(config.apply_permissions);
/// ```
#[derive(Clone, Debug)]
pub struct PeMapperConfig {
    /// Lowest address considered when the preferred base is taken.
    pub allocation_base: u64,

    /// Alignment of fallback bases.
    pub allocation_granularity: u64,

    /// Whether reservations carry the section protections.
    ///
    /// When `false`, every image is reserved read-write-execute.
    pub apply_permissions: bool,
}

impl Default for PeMapperConfig {
    fn default() -> Self {
        Self {
            allocation_base: 0x1000_0000,
            allocation_granularity: 0x1_0000,
            apply_permissions: true,
        }
    }
}

impl PeMapperConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lowest address used for fallback allocations.
    #[must_use]
    pub fn with_allocation_base(mut self, base: u64) -> Self {
        self.allocation_base = base;
        self
    }

    /// Sets the alignment of fallback bases.
    #[must_use]
    pub fn with_allocation_granularity(mut self, granularity: u64) -> Self {
        self.allocation_granularity = granularity;
        self
    }

    /// Reserves every image read-write-execute regardless of its sections.
    #[must_use]
    pub fn without_permissions(mut self) -> Self {
        self.apply_permissions = false;
        self
    }
}

/// Maps PE files into an [`AddressSpace`].
///
/// The mapper owns the address space it reserves ranges in. Owners that snapshot the
/// emulator write [`PeMapper::address_space`] next to the module table and restore it
/// with [`PeMapper::address_space_mut`].
#[derive(Debug, Default)]
pub struct PeMapper {
    /// Configuration controlling base selection and protections.
    config: PeMapperConfig,
    /// Reservations of every image mapped so far.
    address_space: AddressSpace,
}

impl PeMapper {
    /// Creates a mapper with default configuration and an empty address space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapper with the given configuration and an empty address space.
    #[must_use]
    pub fn with_config(config: PeMapperConfig) -> Self {
        PeMapper {
            config,
            address_space: AddressSpace::new(),
        }
    }

    /// The mapper's configuration.
    #[must_use]
    pub fn config(&self) -> &PeMapperConfig {
        &self.config
    }

    /// Reservations of all images mapped by this mapper.
    #[must_use]
    pub fn address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    /// Mutable access to the reservations, e.g. to restore them from a snapshot or to
    /// block ranges for non-image memory.
    pub fn address_space_mut(&mut self) -> &mut AddressSpace {
        &mut self.address_space
    }

    /// Maps a PE image held in memory.
    ///
    /// `path` is recorded in the returned module and its file name becomes the module
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GoblinErr`] if the bytes are not a PE image,
    /// [`crate::Error::Malformed`] for an unusable header or export directory and
    /// [`crate::Error::OutOfMemory`] if no free range can hold the image.
    pub fn load_bytes(&mut self, pe_bytes: &[u8], path: &Path) -> Result<MappedModule> {
        let pe = PE::parse(pe_bytes)?;

        let Some(optional_header) = pe.header.optional_header else {
            return Err(malformed_error!("Image has no optional header"));
        };

        let size_of_image = optional_header.windows_fields.size_of_image as u64;
        if size_of_image == 0 {
            return Err(malformed_error!("Image has a SizeOfImage of 0"));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let protection = if self.config.apply_permissions {
            let protection = pe
                .sections
                .iter()
                .map(|s| MemoryProtection::from_section_characteristics(s.characteristics))
                .fold(MemoryProtection::empty(), |all, section| all | section);
            if protection.is_empty() {
                MemoryProtection::READ
            } else {
                protection
            }
        } else {
            MemoryProtection::READ_WRITE_EXECUTE
        };

        let image_base = self.address_space.find_free(
            Some(pe.image_base),
            size_of_image,
            self.config.allocation_base,
            self.config.allocation_granularity,
        )?;

        // Exports are collected before reserving so a broken directory leaves no reservation behind
        let exports = collect_exports(&pe, image_base)?;

        self.address_space
            .reserve(image_base, size_of_image, name.clone(), protection)?;

        let mut address_names = std::collections::BTreeMap::new();
        for export in &exports {
            address_names
                .entry(export.address)
                .or_insert_with(|| export.name.clone());
        }

        Ok(MappedModule {
            name,
            path: path.to_path_buf(),
            image_base,
            size_of_image,
            entry_point: image_base
                .wrapping_add(optional_header.standard_fields.address_of_entry_point as u64),
            exports,
            address_names,
        })
    }
}

impl ModuleMapper for PeMapper {
    fn load(&mut self, canonical_path: &Path) -> Result<MappedModule> {
        let file = File::open(canonical_path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        self.load_bytes(&mmap, canonical_path)
    }

    fn unload(&mut self, module: &MappedModule) -> Result<()> {
        self.address_space.release(module.image_base)?;
        Ok(())
    }
}

/// Builds the named exports goblin found, in name table order.
///
/// goblin lists named exports in the order of the name pointer table, which is also the
/// order of the ordinal table.
fn collect_exports(pe: &PE, image_base: u64) -> Result<Vec<ExportedSymbol>> {
    let Some(export_data) = pe.export_data.as_ref() else {
        return Ok(Vec::new());
    };

    let ordinal_base = export_data.export_directory_table.ordinal_base;
    let function_count = export_data.export_address_table.len();
    let ordinals = &export_data.export_ordinal_table;

    let named: Vec<(&str, usize)> = pe
        .exports
        .iter()
        .filter_map(|export| export.name.map(|name| (name, export.rva)))
        .collect();

    if named.len() != ordinals.len() {
        return Err(malformed_error!(
            "Export directory lists {} names but {} ordinals",
            named.len(),
            ordinals.len()
        ));
    }

    named
        .into_iter()
        .zip(ordinals.iter())
        .map(|((name, rva), &index)| {
            if usize::from(index) >= function_count {
                return Err(malformed_error!(
                    "Export ordinal index {} exceeds {} functions",
                    index,
                    function_count
                ));
            }

            let rva = rva as u64;
            Ok(ExportedSymbol {
                name: name.to_string(),
                ordinal: ordinal_base.wrapping_add(u32::from(index)),
                rva,
                address: image_base.wrapping_add(rva),
            })
        })
        .collect()
}
