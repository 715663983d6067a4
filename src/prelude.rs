//! # coderemover Prelude
//!
//! This module provides a convenient prelude for the most commonly used types of the
//! coderemover library. Import it to get quick access to the pipeline, the registry and the
//! class model.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all coderemover operations
pub use crate::Error;

/// The result type used throughout coderemover
pub use crate::Result;

// ================================================================================================
// Pipeline
// ================================================================================================

/// Main entry point of the removal pipeline
pub use crate::pipeline::CodeRemover;

/// Pipeline configuration
pub use crate::pipeline::config::{RemovalMode, RemoverConfig};

/// Outcome of a run
pub use crate::pipeline::{
    events::{Event, EventKind, EventLog},
    records::RemovalRecords,
    result::RemovalResult,
};

/// Building blocks for custom passes
pub use crate::pipeline::pass::{ClassPass, PassContext};

// ================================================================================================
// Archive and Registry
// ================================================================================================

/// Archive loading and storing
pub use crate::archive;

/// The in-memory class graph
pub use crate::registry::{LoadOptions, Registry, DEFAULT_MARKER};

/// Class, field and method records
pub use crate::registry::record::{
    ClassKind, ClassRecord, FieldKey, FieldRecord, MethodRecord,
};

// ================================================================================================
// Class Files and Instructions
// ================================================================================================

/// Class file reading, writing and synthesis
pub use crate::classfile::{builder::ClassBuilder, reader::parse_class, writer::write_class};

/// The instruction model
pub use crate::instruction::{code::CodeBody, list::InsnList, Instruction, Label};
