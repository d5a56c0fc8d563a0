//! Table of images mapped into the emulated process.
//!
//! [`ModuleManager`] deduplicates load requests by canonical path, delegates the actual
//! mapping to a [`ModuleMapper`] and keeps the resulting [`MappedModule`] records keyed
//! by base address. The table is part of the emulator snapshot and is written with
//! [`ModuleManager::serialize`].
//!
//! # Path Canonicalization
//!
//! Guest code frequently refers to images through NT object paths (`\??\C:\...`). Every
//! requested path has these prefixes stripped and is then resolved to an absolute,
//! symlink-free host path before it is compared against the table, see
//! [`canonicalize_module_path`].

use std::{
    collections::{btree_map::Entry, BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use crate::{
    emulation::{logger::Logger, module::mapped::MappedModule},
    serialization::{BufferDeserializer, BufferSerializer},
    Error, Result,
};

const NT_PREFIX: &str = r"\??\";

/// Loads and unloads images on behalf of a [`ModuleManager`].
///
/// Implementations own the emulated memory side of a module: reserving its address
/// range, choosing a base and reading its export directory. They must never hand out
/// overlapping ranges, the manager relies on that.
pub trait ModuleMapper {
    /// Maps the image at `canonical_path` and describes the result.
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller of [`ModuleManager::map`] as
    /// [`Error::ModuleLoad`].
    fn load(&mut self, canonical_path: &Path) -> Result<MappedModule>;

    /// Releases everything [`ModuleMapper::load`] reserved for `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if the module's range is not known to the mapper.
    fn unload(&mut self, module: &MappedModule) -> Result<()>;
}

/// Strips leading `\??\` prefixes and resolves `path` to an absolute, symlink-free path.
///
/// # Errors
///
/// Returns [`Error::FileError`] if the path cannot be resolved, most commonly because it
/// does not exist.
///
/// # Example
///
/// ```rust,no_run
/// use emustate::emulation::canonicalize_module_path;
/// use std::path::Path;
///
/// let path = canonicalize_module_path(Path::new(r"\??\C:\Windows\System32\ntdll.dll"))?;
/// assert!(path.is_absolute());
/// # Ok::<(), emustate::Error>(())
/// ```
pub fn canonicalize_module_path(path: &Path) -> Result<PathBuf> {
    let mut current = path;
    while let Some(stripped) = current.to_str().and_then(|s| s.strip_prefix(NT_PREFIX)) {
        current = Path::new(stripped);
    }

    let absolute = std::path::absolute(current)?;
    Ok(std::fs::canonicalize(absolute)?)
}

/// Owner of all [`MappedModule`] records of an emulated process.
///
/// At most one record exists per canonical path and per base address. References handed
/// out by [`ModuleManager::map`] and the lookup functions borrow the manager, so the
/// table cannot change while they are alive.
///
/// # Example
///
/// ```rust,no_run
/// use emustate::emulation::{LogLogger, ModuleManager, PeMapper};
/// use std::path::Path;
///
/// let mut manager = ModuleManager::new(PeMapper::new());
/// let base = manager.map(Path::new("ntdll.dll"), &LogLogger)?.image_base;
///
/// // Second request for the same image is served from the table
/// assert_eq!(manager.map(Path::new("./ntdll.dll"), &LogLogger)?.image_base, base);
/// assert!(manager.unmap(base)?);
/// # Ok::<(), emustate::Error>(())
/// ```
#[derive(Debug)]
pub struct ModuleManager<M: ModuleMapper> {
    modules: BTreeMap<u64, MappedModule>,
    mapper: M,
}

impl<M: ModuleMapper> ModuleManager<M> {
    /// Creates an empty table backed by `mapper`.
    pub fn new(mapper: M) -> Self {
        ModuleManager {
            modules: BTreeMap::new(),
            mapper,
        }
    }

    /// Maps the image at `path`, or returns the record of an earlier mapping of the same
    /// canonical path.
    ///
    /// A fresh mapping is reported through `logger.info`, a failed one through
    /// `logger.error`. Repeated requests for an already mapped image are silent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModuleLoad`] if the path cannot be canonicalized or the mapper
    /// fails, and [`Error::AddressInUse`] if the mapper hands out a base that is already
    /// in the table.
    pub fn map(&mut self, path: &Path, logger: &dyn Logger) -> Result<&MappedModule> {
        let canonical = match canonicalize_module_path(path) {
            Ok(canonical) => canonical,
            Err(error) => return Err(Self::load_failed(path, &error, logger)),
        };

        let existing = self
            .modules
            .values()
            .find(|module| module.path == canonical)
            .map(|module| module.image_base);

        if let Some(base) = existing {
            return self.modules.get(&base).ok_or(Error::RegionNotFound(base));
        }

        let module = match self.mapper.load(&canonical) {
            Ok(module) => module,
            Err(error) => return Err(Self::load_failed(path, &error, logger)),
        };

        match self.modules.entry(module.image_base) {
            Entry::Vacant(entry) => {
                logger.info(&format!(
                    "Mapped {} at 0x{:X}",
                    module.path.display(),
                    module.image_base
                ));
                Ok(entry.insert(module))
            }
            Entry::Occupied(_) => {
                let base = module.image_base;
                logger.error(&format!("Failed to map {}", path.display()));
                self.mapper.unload(&module)?;
                Err(Error::AddressInUse(base))
            }
        }
    }

    fn load_failed(path: &Path, error: &Error, logger: &dyn Logger) -> Error {
        logger.error(&format!("Failed to map {}", path.display()));
        Error::ModuleLoad {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    /// Unmaps the module whose base address is exactly `address`.
    ///
    /// Returns `Ok(false)` and leaves the table untouched if no module starts there.
    ///
    /// # Errors
    ///
    /// Propagates the mapper's error if it cannot release the module. The record stays
    /// in the table in that case.
    pub fn unmap(&mut self, address: u64) -> Result<bool> {
        let Some(module) = self.modules.get(&address) else {
            return Ok(false);
        };

        self.mapper.unload(module)?;
        self.modules.remove(&address);

        Ok(true)
    }

    /// Writes the module table as a map from base address to record.
    pub fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_map(&self.modules);
    }

    /// Replaces the module table with one read from `buffer`.
    ///
    /// The mapper's own state is not touched; owners restore it alongside the table. On
    /// error the current table is kept.
    ///
    /// # Errors
    ///
    /// Propagates the first decoding error. Returns [`Error::Malformed`] if an entry is
    /// not keyed by its own base, two entries share a canonical path or two image
    /// ranges overlap.
    pub fn deserialize(&mut self, buffer: &mut BufferDeserializer<'_>) -> Result<()> {
        let modules: BTreeMap<u64, MappedModule> = buffer.read_map()?;
        Self::validate_table(&modules)?;

        self.modules = modules;
        log::debug!("restored {} module(s)", self.modules.len());
        Ok(())
    }

    fn validate_table(modules: &BTreeMap<u64, MappedModule>) -> Result<()> {
        let mut paths = HashSet::with_capacity(modules.len());
        let mut previous_end = None;

        for (&base, module) in modules {
            if base != module.image_base {
                return Err(malformed_error!(
                    "Module {} at 0x{:X} is stored under 0x{:X}",
                    module.name,
                    module.image_base,
                    base
                ));
            }

            if !paths.insert(module.path.as_path()) {
                return Err(malformed_error!(
                    "Module path {} is mapped twice",
                    module.path.display()
                ));
            }

            if previous_end.is_some_and(|end| base < end) {
                return Err(malformed_error!(
                    "Module {} at 0x{:X} overlaps its predecessor",
                    module.name,
                    base
                ));
            }

            previous_end = Some(
                base.checked_add(module.size_of_image)
                    .ok_or_else(|| malformed_error!("Module {} wraps the address space", module.name))?,
            );
        }

        Ok(())
    }

    /// Returns the module whose image range contains `address`.
    #[must_use]
    pub fn find_by_address(&self, address: u64) -> Option<&MappedModule> {
        self.modules
            .range(..=address)
            .next_back()
            .map(|(_, module)| module)
            .filter(|module| module.contains(address))
    }

    /// Returns the first module named `name`, compared ASCII case-insensitively.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&MappedModule> {
        self.modules
            .values()
            .find(|module| module.name.eq_ignore_ascii_case(name))
    }

    /// Returns the module based exactly at `image_base`.
    #[must_use]
    pub fn get(&self, image_base: u64) -> Option<&MappedModule> {
        self.modules.get(&image_base)
    }

    /// Iterates all modules in ascending base address order.
    pub fn modules(&self) -> impl Iterator<Item = &MappedModule> {
        self.modules.values()
    }

    /// Number of mapped modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The mapping collaborator.
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// The mapping collaborator, mutably.
    pub fn mapper_mut(&mut self) -> &mut M {
        &mut self.mapper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{sample_ntdll, RecordingLogger, StubMapper};
    use std::fs;

    fn image_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ntdll.dll"), b"MZ").unwrap();
        fs::write(dir.path().join("kernel32.dll"), b"MZ").unwrap();
        dir
    }

    #[test]
    fn test_canonicalize_strips_nt_prefix() {
        let dir = image_dir();
        let plain = dir.path().join("ntdll.dll");
        let prefixed = PathBuf::from(format!(r"\??\{}", plain.display()));
        let doubled = PathBuf::from(format!(r"\??\\??\{}", plain.display()));

        let expected = fs::canonicalize(&plain).unwrap();
        assert_eq!(canonicalize_module_path(&plain).unwrap(), expected);
        assert_eq!(canonicalize_module_path(&prefixed).unwrap(), expected);
        assert_eq!(canonicalize_module_path(&doubled).unwrap(), expected);
    }

    #[test]
    fn test_canonicalize_missing_file() {
        let dir = image_dir();
        assert!(matches!(
            canonicalize_module_path(&dir.path().join("missing.dll")),
            Err(Error::FileError(_))
        ));
    }

    #[test]
    fn test_map_is_idempotent() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));

        let path = dir.path().join("ntdll.dll");
        let first = manager.map(&path, &logger).unwrap().image_base;
        let second = manager
            .map(&dir.path().join(".").join("ntdll.dll"), &logger)
            .unwrap()
            .image_base;

        assert_eq!(first, second);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.mapper().loads, 1);
        assert_eq!(logger.infos().len(), 1);
        assert!(logger.infos()[0].starts_with("Mapped "));
        assert!(logger.infos()[0].ends_with("at 0x10000000"));
    }

    #[test]
    fn test_map_failure_is_logged() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        manager.mapper_mut().fail = true;

        let path = dir.path().join("ntdll.dll");
        let result = manager.map(&path, &logger);

        assert!(matches!(result, Err(Error::ModuleLoad { .. })));
        assert!(manager.is_empty());
        assert_eq!(logger.errors(), vec![format!("Failed to map {}", path.display())]);
    }

    #[test]
    fn test_map_missing_file() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));

        let result = manager.map(&dir.path().join("missing.dll"), &logger);
        assert!(matches!(result, Err(Error::ModuleLoad { .. })));
        assert_eq!(manager.mapper().loads, 0);
        assert_eq!(logger.errors().len(), 1);
    }

    #[test]
    fn test_map_rejects_duplicate_base() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        manager.mapper_mut().stride = 0;

        manager.map(&dir.path().join("ntdll.dll"), &logger).unwrap();
        let result = manager.map(&dir.path().join("kernel32.dll"), &logger);

        assert!(matches!(result, Err(Error::AddressInUse(0x1000_0000))));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.mapper().unloads, 1);
        assert_eq!(logger.errors().len(), 1);
    }

    #[test]
    fn test_duplicate_base_logged_when_unload_fails() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        manager.mapper_mut().stride = 0;

        manager.map(&dir.path().join("ntdll.dll"), &logger).unwrap();
        manager.mapper_mut().fail_unload = true;

        let path = dir.path().join("kernel32.dll");
        assert!(manager.map(&path, &logger).is_err());
        assert_eq!(logger.errors(), vec![format!("Failed to map {}", path.display())]);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_unmap_and_remap() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        let path = dir.path().join("kernel32.dll");

        let base = manager.map(&path, &logger).unwrap().image_base;
        assert!(!manager.unmap(base + 1).unwrap());
        assert_eq!(manager.len(), 1);

        assert!(manager.unmap(base).unwrap());
        assert!(manager.is_empty());
        assert!(!manager.unmap(base).unwrap());

        manager.map(&path, &logger).unwrap();
        assert_eq!(manager.mapper().loads, 2);
        assert_eq!(manager.mapper().unloads, 1);
    }

    #[test]
    fn test_lookups() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));

        manager.map(&dir.path().join("ntdll.dll"), &logger).unwrap();
        manager.map(&dir.path().join("kernel32.dll"), &logger).unwrap();

        let ntdll = manager.find_by_name("NTDLL.DLL").unwrap();
        assert_eq!(ntdll.image_base, 0x1000_0000);
        assert_eq!(manager.get(0x1000_0000), Some(ntdll));

        let kernel32 = manager.find_by_address(0x1001_0010).unwrap();
        assert_eq!(kernel32.name, "kernel32.dll");
        assert!(manager.find_by_address(0x0FFF_FFFF).is_none());
        assert!(manager.find_by_address(0x1000_0000 + 0x1000).is_none());

        let bases: Vec<_> = manager.modules().map(|m| m.image_base).collect();
        assert_eq!(bases, vec![0x1000_0000, 0x1001_0000]);
    }

    #[test]
    fn test_snapshot_fidelity() {
        let dir = image_dir();
        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        manager.map(&dir.path().join("ntdll.dll"), &logger).unwrap();
        manager.map(&dir.path().join("kernel32.dll"), &logger).unwrap();

        let mut serializer = BufferSerializer::new();
        manager.serialize(&mut serializer);
        let buffer = serializer.take_buffer();

        let mut restored = ModuleManager::new(StubMapper::new(0));
        restored.modules.insert(0x42, sample_ntdll());

        let mut deserializer = BufferDeserializer::new(&buffer);
        restored.deserialize(&mut deserializer).unwrap();

        assert_eq!(restored.modules, manager.modules);
        assert!(!deserializer.has_more_data());
    }

    fn restore(modules: &[(u64, MappedModule)]) -> Result<ModuleManager<StubMapper>> {
        let mut serializer = BufferSerializer::new();
        serializer.write_map(modules.iter().map(|(base, module)| (base, module)));
        let buffer = serializer.take_buffer();

        let mut manager = ModuleManager::new(StubMapper::new(0));
        manager.deserialize(&mut BufferDeserializer::new(&buffer))?;
        Ok(manager)
    }

    #[test]
    fn test_restore_rejects_inconsistent_tables() {
        let ntdll = sample_ntdll();
        assert!(restore(&[(ntdll.image_base, ntdll.clone())]).is_ok());

        // Key differs from the record's base
        assert!(matches!(
            restore(&[(0x42, ntdll.clone())]),
            Err(Error::Malformed { .. })
        ));

        // Same canonical path at two bases
        let mut copy = ntdll.clone();
        copy.image_base = 0x8000_0000;
        assert!(matches!(
            restore(&[(ntdll.image_base, ntdll.clone()), (copy.image_base, copy)]),
            Err(Error::Malformed { .. })
        ));

        // Overlapping ranges
        let mut overlapping = ntdll.clone();
        overlapping.path = PathBuf::from(r"C:\Windows\System32\kernel32.dll");
        overlapping.image_base = ntdll.image_base + 0x1000;
        assert!(matches!(
            restore(&[
                (ntdll.image_base, ntdll.clone()),
                (overlapping.image_base, overlapping)
            ]),
            Err(Error::Malformed { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_restore_keeps_dedup_for_non_utf8_paths() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"n\xFFtdll.dll"));
        fs::write(&path, b"MZ").unwrap();

        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        let base = manager.map(&path, &logger).unwrap().image_base;

        let mut serializer = BufferSerializer::new();
        manager.serialize(&mut serializer);
        let buffer = serializer.take_buffer();

        let mut restored = ModuleManager::new(StubMapper::new(0x2000_0000));
        restored
            .deserialize(&mut BufferDeserializer::new(&buffer))
            .unwrap();

        assert_eq!(restored.map(&path, &logger).unwrap().image_base, base);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.mapper().loads, 0);
    }

    #[test]
    fn test_failed_restore_keeps_table() {
        let mut manager = ModuleManager::new(StubMapper::new(0));
        manager.modules.insert(0x42, sample_ntdll());

        let mut serializer = BufferSerializer::new();
        serializer.write(&1u64);
        let buffer = serializer.take_buffer();

        let mut deserializer = BufferDeserializer::new(&buffer);
        assert!(manager.deserialize(&mut deserializer).is_err());
        assert_eq!(manager.len(), 1);
        assert!(manager.get(0x42).is_some());
    }
}
