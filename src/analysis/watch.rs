//! Object watching: classification of reads from a watched guest object.
//!
//! An [`ObjectWatcher`] covers one guest object (for example a PEB or a
//! `KUSER_SHARED_DATA` page) described by a [`TypeLayout`]. The embedding emulator
//! installs a memory-read hook over the object's range and forwards each hit to
//! [`ObjectWatcher::on_read`], which resolves the member being read and the module the
//! read came from.
//!
//! Reads from the main executable are always reported. Reads from any other module are
//! only reported with [`WatchConfig::verbose`], as system libraries touch these objects
//! constantly.

use std::collections::{BTreeMap, HashSet};

use strum::Display;

use crate::emulation::{Logger, ModuleManager, ModuleMapper};

/// Placeholder used when a member or module cannot be named.
pub const UNKNOWN_NAME: &str = "<N/A>";

/// Member layout of a watched type.
///
/// # Example
///
/// ```rust
/// use emustate::analysis::TypeLayout;
///
/// let layout = TypeLayout::new("PEB")
///     .with_member(0x00, "InheritedAddressSpace")
///     .with_member(0x02, "BeingDebugged")
///     .with_member(0x10, "ImageBaseAddress");
///
/// assert_eq!(layout.member_name(0x02), "BeingDebugged");
/// assert_eq!(layout.member_name(0x14), "ImageBaseAddress");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeLayout {
    type_name: String,
    members: BTreeMap<u64, String>,
}

impl TypeLayout {
    /// Creates a layout without members.
    pub fn new(type_name: impl Into<String>) -> Self {
        TypeLayout {
            type_name: type_name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Adds a member starting at `offset`.
    #[must_use]
    pub fn with_member(mut self, offset: u64, name: impl Into<String>) -> Self {
        self.members.insert(offset, name.into());
        self
    }

    /// Name of the watched type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the member covering `offset`: the one with the greatest start offset not
    /// above it, or [`UNKNOWN_NAME`] if there is none.
    #[must_use]
    pub fn member_name(&self, offset: u64) -> &str {
        self.members
            .range(..=offset)
            .next_back()
            .map_or(UNKNOWN_NAME, |(_, name)| name.as_str())
    }
}

/// Reporting policy of an [`ObjectWatcher`].
#[derive(Clone, Debug, Default)]
pub struct WatchConfig {
    /// Report reads coming from modules other than the main executable.
    pub verbose: bool,

    /// Report each address read by the main executable only once.
    pub cache_addresses: bool,
}

impl WatchConfig {
    /// Creates a configuration that only reports main-executable reads, every time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report reads from other modules.
    #[must_use]
    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Report each main-executable address only once.
    #[must_use]
    pub fn with_address_cache(mut self) -> Self {
        self.cache_addresses = true;
        self
    }
}

/// Where a read came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AccessOrigin {
    /// The instruction belongs to the main executable.
    MainExecutable,
    /// The instruction belongs to another module or to no module at all.
    Foreign,
}

/// A reported read from a watched object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectAccess {
    /// Offset of the read within the object
    pub offset: u64,
    /// Member covering the offset
    pub member: String,
    /// Instruction pointer of the reading instruction
    pub rip: u64,
    /// Name of the module containing `rip`
    pub module: Option<String>,
    /// Whether the read came from the main executable
    pub origin: AccessOrigin,
}

/// Watches reads from one guest object.
#[derive(Clone, Debug)]
pub struct ObjectWatcher {
    base: u64,
    size: u64,
    layout: TypeLayout,
    config: WatchConfig,
    logged_addresses: HashSet<u64>,
}

impl ObjectWatcher {
    /// Creates a watcher for the object at `[base, base + size)`.
    pub fn new(base: u64, size: u64, layout: TypeLayout, config: WatchConfig) -> Self {
        ObjectWatcher {
            base,
            size,
            layout,
            config,
            logged_addresses: HashSet::new(),
        }
    }

    /// Guest address of the watched object.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the watched object in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Layout used to name members.
    #[must_use]
    pub fn layout(&self) -> &TypeLayout {
        &self.layout
    }

    /// Classifies a read of `address` performed by the instruction at `rip`.
    ///
    /// `executable_base` is the base of the main executable, `None` if none is mapped.
    /// Returns the reported access, or `None` if the read is outside the object or is
    /// suppressed by the [`WatchConfig`]. Reported accesses are also written to
    /// `logger`.
    pub fn on_read<M: ModuleMapper>(
        &mut self,
        address: u64,
        rip: u64,
        modules: &ModuleManager<M>,
        executable_base: Option<u64>,
        logger: &dyn Logger,
    ) -> Option<ObjectAccess> {
        let offset = address
            .checked_sub(self.base)
            .filter(|offset| *offset < self.size)?;

        let module = modules.find_by_address(rip);
        let is_main_access = matches!(
            (module, executable_base),
            (Some(module), Some(base)) if module.image_base == base
        );

        if !self.config.verbose && !is_main_access {
            return None;
        }

        if self.config.cache_addresses
            && is_main_access
            && !self.logged_addresses.insert(address)
        {
            return None;
        }

        let member = self.layout.member_name(offset).to_string();
        let module = module.map(|m| m.name.clone());

        logger.info(&format!(
            "Object access: {} - 0x{:X} ({}) at 0x{:X} ({})",
            self.layout.type_name(),
            offset,
            member,
            rip,
            module.as_deref().unwrap_or(UNKNOWN_NAME)
        ));

        Some(ObjectAccess {
            offset,
            member,
            rip,
            module,
            origin: if is_main_access {
                AccessOrigin::MainExecutable
            } else {
                AccessOrigin::Foreign
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{RecordingLogger, StubMapper};
    use std::fs;

    const PEB_BASE: u64 = 0x7FFD_F000;

    fn layout() -> TypeLayout {
        TypeLayout::new("PEB")
            .with_member(0x02, "BeingDebugged")
            .with_member(0x10, "ImageBaseAddress")
    }

    /// Maps `app.exe` at 0x1000_0000 and `ntdll.dll` at 0x1001_0000.
    fn manager(dir: &tempfile::TempDir) -> ModuleManager<StubMapper> {
        fs::write(dir.path().join("app.exe"), b"MZ").unwrap();
        fs::write(dir.path().join("ntdll.dll"), b"MZ").unwrap();

        let logger = RecordingLogger::default();
        let mut manager = ModuleManager::new(StubMapper::new(0x1000_0000));
        manager.map(&dir.path().join("app.exe"), &logger).unwrap();
        manager.map(&dir.path().join("ntdll.dll"), &logger).unwrap();
        manager
    }

    #[test]
    fn test_member_name() {
        let layout = layout();
        assert_eq!(layout.member_name(0x00), UNKNOWN_NAME);
        assert_eq!(layout.member_name(0x02), "BeingDebugged");
        assert_eq!(layout.member_name(0x0F), "BeingDebugged");
        assert_eq!(layout.member_name(0x18), "ImageBaseAddress");
    }

    #[test]
    fn test_main_access_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let modules = manager(&dir);
        let logger = RecordingLogger::default();
        let mut watcher = ObjectWatcher::new(PEB_BASE, 0x1000, layout(), WatchConfig::new());

        let access = watcher
            .on_read(PEB_BASE + 2, 0x1000_0123, &modules, Some(0x1000_0000), &logger)
            .unwrap();

        assert_eq!(access.offset, 2);
        assert_eq!(access.member, "BeingDebugged");
        assert_eq!(access.module.as_deref(), Some("app.exe"));
        assert_eq!(access.origin, AccessOrigin::MainExecutable);
        assert_eq!(
            logger.infos(),
            vec!["Object access: PEB - 0x2 (BeingDebugged) at 0x10000123 (app.exe)".to_string()]
        );
    }

    #[test]
    fn test_foreign_access_needs_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let modules = manager(&dir);
        let logger = RecordingLogger::default();

        let mut quiet = ObjectWatcher::new(PEB_BASE, 0x1000, layout(), WatchConfig::new());
        assert!(quiet
            .on_read(PEB_BASE + 0x10, 0x1001_0010, &modules, Some(0x1000_0000), &logger)
            .is_none());
        assert!(logger.infos().is_empty());

        let mut verbose =
            ObjectWatcher::new(PEB_BASE, 0x1000, layout(), WatchConfig::new().with_verbose());
        let access = verbose
            .on_read(PEB_BASE + 0x10, 0x1001_0010, &modules, Some(0x1000_0000), &logger)
            .unwrap();
        assert_eq!(access.origin, AccessOrigin::Foreign);
        assert_eq!(access.origin.to_string(), "foreign");
        assert_eq!(access.module.as_deref(), Some("ntdll.dll"));
    }

    #[test]
    fn test_unknown_module() {
        let dir = tempfile::tempdir().unwrap();
        let modules = manager(&dir);
        let logger = RecordingLogger::default();
        let mut watcher =
            ObjectWatcher::new(PEB_BASE, 0x1000, layout(), WatchConfig::new().with_verbose());

        let access = watcher
            .on_read(PEB_BASE, 0xDEAD_0000, &modules, Some(0x1000_0000), &logger)
            .unwrap();

        assert_eq!(access.module, None);
        assert_eq!(access.member, UNKNOWN_NAME);
        assert!(logger.infos()[0].ends_with("at 0xDEAD0000 (<N/A>)"));
    }

    #[test]
    fn test_address_cache() {
        let dir = tempfile::tempdir().unwrap();
        let modules = manager(&dir);
        let logger = RecordingLogger::default();
        let mut watcher = ObjectWatcher::new(
            PEB_BASE,
            0x1000,
            layout(),
            WatchConfig::new().with_address_cache(),
        );

        let main = Some(0x1000_0000);
        assert!(watcher.on_read(PEB_BASE + 2, 0x1000_0010, &modules, main, &logger).is_some());
        assert!(watcher.on_read(PEB_BASE + 2, 0x1000_0020, &modules, main, &logger).is_none());
        assert!(watcher.on_read(PEB_BASE + 3, 0x1000_0020, &modules, main, &logger).is_some());
        assert_eq!(logger.infos().len(), 2);
    }

    #[test]
    fn test_out_of_range_read() {
        let dir = tempfile::tempdir().unwrap();
        let modules = manager(&dir);
        let logger = RecordingLogger::default();
        let mut watcher = ObjectWatcher::new(PEB_BASE, 0x1000, layout(), WatchConfig::new());

        let main = Some(0x1000_0000);
        assert!(watcher.on_read(PEB_BASE - 1, 0x1000_0010, &modules, main, &logger).is_none());
        assert!(watcher.on_read(PEB_BASE + 0x1000, 0x1000_0010, &modules, main, &logger).is_none());
    }
}
