//! Reading and writing jar archives.
//!
//! Archives are read fully into memory and turned into a [`Registry`]; writing serializes the
//! whole registry into an in-memory zip first, so a failure never leaves a partial output file
//! behind.
//!
//! Output entry order:
//!
//! 1. `META-INF/MANIFEST.MF`, if the input had one
//! 2. every class as `<internal name>.class`, in registry order
//! 3. every resource, byte for byte, in registry order
//! 4. a directory entry for every parent path of the entries above
//!
//! # Examples
//!
//! ```rust
//! use coderemover::{
//!     archive,
//!     classfile::builder::ClassBuilder,
//!     registry::{LoadOptions, Registry},
//! };
//!
//! let options = LoadOptions::default();
//! let class = ClassBuilder::new("demo/Main").build(&options.marker)?;
//! let registry = Registry::build(vec![("demo/Main.class".to_string(), class)], &options)?;
//!
//! let jar = archive::store_to_mem(&registry)?;
//! let reloaded = archive::load_from_mem(&jar, &options)?;
//! assert!(reloaded.contains("demo/Main"));
//! # Ok::<(), coderemover::Error>(())
//! ```

use std::{
    collections::BTreeSet,
    io::{Cursor, Read, Seek, Write},
    path::Path,
};

use log::debug;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::{
    classfile::writer::write_class,
    registry::{LoadOptions, Registry, CLASS_SUFFIX, MANIFEST_PATH},
    Result,
};

/// Load the archive at `path`.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if the file cannot be read, [`crate::Error::Zip`] if it
/// is not a valid zip archive, and the errors of [`Registry::build`].
pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Registry> {
    let path = path.as_ref();
    debug!("Loading archive {}", path.display());
    let data = std::fs::read(path)?;
    load_from_mem(&data, options)
}

/// Load an archive from memory.
///
/// Entries are handed to the registry in container order; directory entries are skipped.
///
/// # Errors
/// Returns [`crate::Error::Zip`] for an invalid archive and the errors of [`Registry::build`].
pub fn load_from_mem(data: &[u8], options: &LoadOptions) -> Result<Registry> {
    let entries = read_entries(Cursor::new(data))?;
    Registry::build(entries, options)
}

fn read_entries<R: Read + Seek>(reader: R) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
        file.read_to_end(&mut data)?;
        entries.push((file.name().to_string(), data));
    }
    Ok(entries)
}

/// Write `registry` as an archive to `path`.
///
/// The archive is assembled in memory before the file is created.
///
/// # Errors
/// Returns an error if a class cannot be serialized or the file cannot be written.
pub fn store(path: impl AsRef<Path>, registry: &Registry) -> Result<()> {
    let data = store_to_mem(registry)?;
    let path = path.as_ref();
    std::fs::write(path, &data)?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Serialize `registry` into an archive in memory.
///
/// # Errors
/// Returns an error if a class cannot be serialized or the zip layer fails.
pub fn store_to_mem(registry: &Registry) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut directories = BTreeSet::new();

    if let Some(manifest) = registry.manifest() {
        write_entry(&mut zip, MANIFEST_PATH, manifest, options, &mut directories)?;
    }

    for class in registry.classes() {
        let data = write_class(class)?;
        let entry = format!("{}{}", class.name, CLASS_SUFFIX);
        write_entry(&mut zip, &entry, &data, options, &mut directories)?;
    }

    for (entry, data) in registry.resources() {
        write_entry(&mut zip, entry, data, options, &mut directories)?;
    }

    for directory in directories {
        zip.add_directory(directory, options)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    entry: &str,
    data: &[u8],
    options: SimpleFileOptions,
    directories: &mut BTreeSet<String>,
) -> Result<()> {
    zip.start_file(entry, options)?;
    zip.write_all(data)?;
    directories.extend(parent_directories(entry));
    Ok(())
}

/// Every parent path of `entry`, outermost first, each with a trailing `/`.
fn parent_directories(entry: &str) -> impl Iterator<Item = String> + '_ {
    entry
        .match_indices('/')
        .map(move |(index, _)| entry[..=index].to_string())
}
