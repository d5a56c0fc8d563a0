//! Records describing images mapped into the emulated address space.
//!
//! A [`MappedModule`] is produced by a [`crate::emulation::ModuleMapper`] and owned by
//! the [`crate::emulation::ModuleManager`]. Both records are part of every snapshot, so
//! their encodings are fixed here:
//!
//! - [`ExportedSymbol`]: `name`, `ordinal`, `rva`, `address`
//! - [`MappedModule`]: `name`, `path` (UTF-16), `image_base`, `size_of_image`,
//!   `entry_point`, `exports`, `address_names`

use std::{collections::BTreeMap, path::PathBuf};

use crate::{
    serialization::{BufferDeserializer, BufferSerializer, Serializable},
    Result,
};

/// A single entry of an image's export directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportedSymbol {
    /// Exported name, empty for ordinal-only exports
    pub name: String,
    /// Biased export ordinal
    pub ordinal: u32,
    /// Relative virtual address of the export
    pub rva: u64,
    /// Absolute virtual address at the module's current base
    pub address: u64,
}

impl Serializable for ExportedSymbol {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write(&self.name);
        buffer.write(&self.ordinal);
        buffer.write(&self.rva);
        buffer.write(&self.address);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        Ok(ExportedSymbol {
            name: buffer.read()?,
            ordinal: buffer.read()?,
            rva: buffer.read()?,
            address: buffer.read()?,
        })
    }
}

/// An executable image currently mapped into the emulated address space.
///
/// `image_base` is the module's identity within a [`crate::emulation::ModuleManager`];
/// `path` is always the canonical path the image was loaded from.
///
/// # Example
///
/// ```rust
/// use emustate::emulation::{ExportedSymbol, MappedModule};
///
/// let mut module = MappedModule {
///     name: "ntdll.dll".into(),
///     image_base: 0x7FF0_0000,
///     size_of_image: 0x1000,
///     ..Default::default()
/// };
/// module.exports.push(ExportedSymbol {
///     name: "NtClose".into(),
///     ordinal: 1,
///     rva: 0x100,
///     address: 0x7FF0_0100,
/// });
/// module.address_names.insert(0x7FF0_0100, "NtClose".into());
///
/// assert!(module.contains(0x7FF0_0FFF));
/// assert!(!module.contains(0x7FF0_1000));
/// assert_eq!(module.symbol_at(0x7FF0_0100), Some("NtClose"));
/// assert_eq!(module.find_export("NtClose").map(|e| e.ordinal), Some(1));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappedModule {
    /// File name of the image
    pub name: String,
    /// Canonical on-disk location
    pub path: PathBuf,
    /// Base address the image was mapped at
    pub image_base: u64,
    /// Size of the mapped image in bytes
    pub size_of_image: u64,
    /// Absolute address of the entry point
    pub entry_point: u64,
    /// Export directory entries, in directory order
    pub exports: Vec<ExportedSymbol>,
    /// Absolute export address to exported name
    pub address_names: BTreeMap<u64, String>,
}

impl MappedModule {
    /// Returns `true` if `address` lies in `[image_base, image_base + size_of_image)`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address
            .checked_sub(self.image_base)
            .is_some_and(|offset| offset < self.size_of_image)
    }

    /// Looks up an export by name.
    #[must_use]
    pub fn find_export(&self, name: &str) -> Option<&ExportedSymbol> {
        self.exports.iter().find(|export| export.name == name)
    }

    /// Returns the exported name at exactly `address`, if any.
    #[must_use]
    pub fn symbol_at(&self, address: u64) -> Option<&str> {
        self.address_names.get(&address).map(String::as_str)
    }
}

pub(crate) fn serialize_mapped_module(buffer: &mut BufferSerializer, module: &MappedModule) {
    buffer.write_string(&module.name);
    buffer.write(&module.path);

    buffer.write(&module.image_base);
    buffer.write(&module.size_of_image);
    buffer.write(&module.entry_point);

    buffer.write_vector(&module.exports);
    buffer.write_map(&module.address_names);
}

pub(crate) fn deserialize_mapped_module(
    buffer: &mut BufferDeserializer<'_>,
) -> Result<MappedModule> {
    let name = buffer.read_string()?;
    let path = buffer.read()?;

    let image_base = buffer.read()?;
    let size_of_image = buffer.read()?;
    let entry_point = buffer.read()?;

    let exports = buffer.read_vector()?;
    let address_names = buffer.read_map()?;

    Ok(MappedModule {
        name,
        path,
        image_base,
        size_of_image,
        entry_point,
        exports,
        address_names,
    })
}

impl_serializable_with!(
    MappedModule,
    serialize_mapped_module,
    deserialize_mapped_module
);
