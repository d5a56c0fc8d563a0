#![no_main]

use libfuzzer_sys::fuzz_target;
use emustate::{
    emulation::{AddressSpace, ModuleManager, PeMapper},
    BufferDeserializer,
};

fuzz_target!(|data: &[u8]| {
    let mut manager = ModuleManager::new(PeMapper::new());
    let mut buffer = BufferDeserializer::new(data);
    if manager.deserialize(&mut buffer).is_ok() {
        let _ = buffer.read::<AddressSpace>();
    }
});
