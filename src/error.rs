use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can report.
///
/// # Error Categories
///
/// ## Stream Errors
/// - [`Error::OutOfBounds`] - A read would run past the end of the buffer
/// - [`Error::CorruptionDetected`] - A debug canary did not echo the expected offset
/// - [`Error::Malformed`] - Decoded bytes do not form a valid value
///
/// ## Module Errors
/// - [`Error::ModuleLoad`] - The mapping collaborator could not load an image
/// - [`Error::AddressInUse`] - A reservation overlaps an existing region
/// - [`Error::RegionNotFound`] - No region is reserved at the given base
/// - [`Error::OutOfMemory`] - No free range is large enough for an image
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// Types without an encoding strategy are rejected at compile time and therefore have no
/// runtime variant.
///
/// # Examples
///
/// ```rust
/// use emustate::{BufferDeserializer, Error};
///
/// let mut buffer = BufferDeserializer::new(&[0x01, 0x02]);
/// match buffer.read::<u64>() {
///     Err(Error::OutOfBounds) => {}
///     other => panic!("unexpected result: {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while decoding a buffer.
    ///
    /// The source buffer is either truncated or was produced by an encoder with a
    /// different call sequence.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A debug canary did not match the offset it was written at.
    ///
    /// Only produced by debug builds. It marks the first point where the reader's call
    /// sequence diverged from the writer's.
    ///
    /// # Fields
    ///
    /// * `offset` - Cursor offset before the raw read
    /// * `echoed` - Offset recorded by the writer
    #[error("Reading from serialized buffer mismatches written data - offset {offset}, echoed {echoed}")]
    CorruptionDetected {
        /// Cursor offset before the raw read
        offset: u64,
        /// Offset recorded by the writer
        echoed: u64,
    },

    /// The decoded data could not be turned into a valid value.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The mapping collaborator failed to load an image.
    #[error("Failed to map {}: {message}", .path.display())]
    ModuleLoad {
        /// Path that was requested
        path: PathBuf,
        /// Description of the underlying failure
        message: String,
    },

    /// A requested address range overlaps an already reserved region.
    #[error("Address range at 0x{0:X} is already in use")]
    AddressInUse(u64),

    /// No region is reserved at the given base address.
    #[error("No region reserved at 0x{0:X}")]
    RegionNotFound(u64),

    /// No free range of the requested size exists.
    #[error("No free address range for 0x{0:X} bytes")]
    OutOfMemory(u64),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}
