// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # coderemover
//!
//! Strips classes, fields and methods annotated with a removal marker out of JVM archives, and
//! repairs the bytecode that referenced them so the result still verifies.
//!
//! A typical use is shipping one code base in several editions: development-only classes,
//! debug fields or test hooks carry `@Removable(remove = true)` and disappear from the release
//! archive, while `@Removable(remove = false)` documents code that was considered and kept. The
//! marker itself never reaches the output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coderemover::prelude::*;
//!
//! let remover = CodeRemover::new(RemoverConfig::default());
//! let result = remover.process_file("app.jar", "app-release.jar")?;
//! println!("{}", result.summary());
//! # Ok::<(), coderemover::Error>(())
//! ```
//!
//! ## What gets removed and repaired
//!
//! - Marked classes and interfaces are deleted, together with every nested class whose name
//!   descends from them (`Outer$Inner`, `Outer$1`, ...).
//! - Survivors lose removed interfaces from their interface lists. A subclass of a removed class
//!   is re-parented to the nearest surviving ancestor, and every field, method and type
//!   reference to the removed ancestor inside it is retargeted.
//! - Marked fields and methods are deleted. Constructors and static initializers that assigned a
//!   removed field are patched: constant assignments disappear, computed ones keep the
//!   computation and discard its result.
//!
//! ## Architecture
//!
//! - [`archive`] - reading and writing jar archives
//! - [`registry`] - the in-memory class graph of an archive
//! - [`classfile`] - class file reader, writer and builder
//! - [`instruction`] - the editable instruction model of method bodies
//! - [`pipeline`] - the removal passes and the [`pipeline::CodeRemover`] driving them
//! - [`Error`] and [`Result`] - error handling
//!
//! Progress is reported through the `log` facade; every structural change is also recorded in
//! the [`pipeline::events::EventLog`] returned with the result.

#[macro_use]
pub(crate) mod error;

pub mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use coderemover::prelude::*;
///
/// let mut registry = archive::load("app.jar", &LoadOptions::default())?;
/// let result = CodeRemover::default().process(&mut registry)?;
/// println!("{} types removed", result.records.len());
/// # Ok::<(), coderemover::Error>(())
/// ```
pub mod prelude;

pub mod archive;
pub mod classfile;
pub mod instruction;
pub mod pipeline;
pub mod registry;

/// `coderemover` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `coderemover` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,no_run
/// use coderemover::{archive, registry::LoadOptions, Error};
///
/// match archive::load("app.jar", &LoadOptions::default()) {
///     Ok(registry) => println!("{} classes", registry.len()),
///     Err(Error::ClassParse { entry, .. }) => println!("Bad class: {}", entry),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Bounds-checked reading cursor over a byte slice.
pub use file::parser::Parser;
