//! Analysis helpers built on top of the emulator state.
//!
//! # Components
//!
//! - [`watch`] - Classification of reads from watched guest objects
//!
//! # Usage
//!
//! ```rust,ignore
//! use emustate::analysis::{ObjectWatcher, TypeLayout, WatchConfig};
//!
//! let layout = TypeLayout::new("PEB").with_member(0x02, "BeingDebugged");
//! let mut watcher = ObjectWatcher::new(peb_base, 0x1000, layout, WatchConfig::new());
//!
//! // Called from the emulator's memory-read hook
//! watcher.on_read(address, rip, &modules, executable_base, &logger);
//! ```

pub mod watch;

pub use watch::{AccessOrigin, ObjectAccess, ObjectWatcher, TypeLayout, WatchConfig};
