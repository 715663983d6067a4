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

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants split into three groups. Binary format errors are raised while reading or
/// writing class files and archives. Removal errors are the unrecoverable conditions of the
/// removal pipeline: a marker that violates its own format, or an initializer whose shape does
/// not allow a removed field store to be patched safely. I/O errors wrap the filesystem and zip
/// layers.
///
/// Recoverable conditions, such as a superclass that lives outside the archive, are never
/// reported through this type; they are logged and processing continues.
///
/// # Examples
///
/// ```rust,no_run
/// use coderemover::{archive, registry::LoadOptions, Error};
///
/// match archive::load("app.jar", &LoadOptions::default()) {
///     Ok(registry) => println!("{} classes", registry.len()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed class file: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Binary format errors
    /// The data is damaged and could not be parsed or encoded.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing a class file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// Raised for class files without the `0xCAFEBABE` magic.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A class entry of the archive could not be parsed.
    ///
    /// Only returned when the registry is built in strict mode; lenient builds keep the
    /// entry as an opaque resource instead.
    #[error("Failed to parse class entry {entry}: {source}")]
    ClassParse {
        /// Archive entry name of the class
        entry: String,
        /// The underlying parse failure
        #[source]
        source: Box<Error>,
    },

    // Removal errors
    /// A removal marker does not carry exactly one boolean `remove` value.
    ///
    /// This is a build error of the processed artifact and aborts the whole run.
    #[error("Malformed removal marker on {element}: {message}")]
    MalformedMarker {
        /// The class, field or method carrying the marker
        element: String,
        /// What is wrong with the marker
        message: String,
    },

    /// A store to a removed field does not have the instruction shape the patcher relies on.
    ///
    /// Patching it anyway could produce bytecode with a broken operand stack, so the run is
    /// aborted instead.
    #[error("Unexpected initializer shape in {class}.{method} at instruction {position}: {message}")]
    UnexpectedShape {
        /// Internal name of the class being patched
        class: String,
        /// Name and descriptor of the initializer
        method: String,
        /// Index of the offending instruction in the method body
        position: usize,
        /// What was expected
        message: String,
    },

    // I/O and external errors
    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the zip layer while reading or writing an archive.
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
