use std::{cell::RefCell, collections::BTreeMap, path::Path};

pub use pe::*;

use crate::{
    emulation::{ExportedSymbol, Logger, MappedModule, ModuleMapper},
    Result,
};

// Logger that keeps every message for later inspection
#[derive(Default)]
pub struct RecordingLogger {
    infos: RefCell<Vec<String>>,
    errors: RefCell<Vec<String>>,
}

impl RecordingLogger {
    pub fn infos(&self) -> Vec<String> {
        self.infos.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}

// Mapper that hands out consecutive bases without touching the file contents
pub struct StubMapper {
    pub next_base: u64,
    pub stride: u64,
    pub fail: bool,
    pub fail_unload: bool,
    pub loads: usize,
    pub unloads: usize,
}

impl StubMapper {
    pub fn new(first_base: u64) -> Self {
        StubMapper {
            next_base: first_base,
            stride: 0x1_0000,
            fail: false,
            fail_unload: false,
            loads: 0,
            unloads: 0,
        }
    }
}

impl ModuleMapper for StubMapper {
    fn load(&mut self, canonical_path: &Path) -> Result<MappedModule> {
        if self.fail {
            return Err(malformed_error!("stub mapper failure"));
        }

        let image_base = self.next_base;
        self.next_base += self.stride;
        self.loads += 1;

        let name = canonical_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(MappedModule {
            name: name.clone(),
            path: canonical_path.to_path_buf(),
            image_base,
            size_of_image: 0x1000,
            entry_point: image_base + 0x100,
            exports: vec![ExportedSymbol {
                name: format!("{}_entry", name),
                ordinal: 1,
                rva: 0x100,
                address: image_base + 0x100,
            }],
            address_names: BTreeMap::from([(image_base + 0x100, format!("{}_entry", name))]),
        })
    }

    fn unload(&mut self, _module: &MappedModule) -> Result<()> {
        if self.fail_unload {
            return Err(malformed_error!("stub unload failure"));
        }
        self.unloads += 1;
        Ok(())
    }
}

// Helper function to create the ntdll.dll record used throughout the tests
pub fn sample_ntdll() -> MappedModule {
    MappedModule {
        name: "ntdll.dll".to_string(),
        path: r"C:\Windows\System32\ntdll.dll".into(),
        image_base: 0x7FF0_0000,
        size_of_image: 0x10_0000,
        entry_point: 0x7FF0_1000,
        exports: vec![ExportedSymbol {
            name: "NtClose".to_string(),
            ordinal: 5,
            rva: 0x2000,
            address: 0x7FF0_2000,
        }],
        address_names: BTreeMap::from([(0x7FF0_2000, "NtClose".to_string())]),
    }
}
