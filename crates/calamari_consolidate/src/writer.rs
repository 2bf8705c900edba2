//! Functionality for writing consolidated packages.

use std::io::{Seek, Write};
use std::str::FromStr;

use calamari_digest::copy_and_hash;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dedup::unique_files_by_archive;
use crate::index::{write_index, IndexPackage, INDEX_ENTRY_NAME};
use crate::source::open_archive;
use crate::{ConsolidateError, SourceFileDescriptor};

/// Select the compression level to use for the entries of the package.
///
/// Consolidated packages are rebuilt whenever one of their inputs changes, so
/// the default favours speed over size.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Use the lowest compression level (deflate: 1)
    #[default]
    Lowest,
    /// Use the highest compression level (deflate: 9)
    Highest,
    /// Use the default compression level (deflate: 6)
    Default,
    /// Use a numeric compression level (deflate: 1-9)
    Numeric(u32),
}

impl CompressionLevel {
    fn to_deflate_level(self) -> Result<i64, std::io::Error> {
        match self {
            CompressionLevel::Lowest => Ok(1),
            CompressionLevel::Highest => Ok(9),
            CompressionLevel::Default => Ok(6),
            CompressionLevel::Numeric(n) => {
                if (1..=9).contains(&n) {
                    Ok(i64::from(n))
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "deflate compression level must be between 1 and 9",
                    ))
                }
            }
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lowest" => Ok(Self::Lowest),
            "highest" => Ok(Self::Highest),
            "default" => Ok(Self::Default),
            _ => s.parse::<u32>().map(Self::Numeric).map_err(|_| {
                format!("'{s}' is not a compression level, expected lowest, default, highest or 1-9")
            }),
        }
    }
}

/// Entries of 4 GiB and more need the ZIP64 extensions.
fn needs_large_file(size: u64) -> bool {
    size >= u64::from(u32::MAX)
}

/// Write a consolidated package.
///
/// Every distinct file is copied once from its source archive to
/// `{hash}/{path}`. Source archives are opened one at a time. The index is
/// written last, as the [`INDEX_ENTRY_NAME`] entry.
///
/// Returns the number of files that were written, not counting the index.
///
/// # Errors
///
/// Fails if a source archive cannot be read, if the content of an entry no
/// longer matches the hash it was indexed with, or if the writer returns an
/// error.
pub fn write_consolidated_package<W: Write + Seek>(
    writer: W,
    files: &[SourceFileDescriptor],
    index: &[IndexPackage],
    compression_level: CompressionLevel,
) -> Result<usize, ConsolidateError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level.to_deflate_level()?));

    let mut package = ZipWriter::new(writer);
    let mut written = 0;
    for (archive_path, files) in unique_files_by_archive(files) {
        let mut source = open_archive(archive_path)?;
        for file in files {
            let entry = source
                .by_name(&file.source_entry_name)
                .map_err(|e| ConsolidateError::ReadArchive(archive_path.to_path_buf(), e))?;

            let entry_options = options.large_file(needs_large_file(entry.size()));
            package
                .start_file(file.consolidated_entry_name(), entry_options)
                .map_err(ConsolidateError::WriteArchive)?;
            let hash = copy_and_hash(entry, &mut package)?;
            if hash != file.content_hash {
                return Err(ConsolidateError::ContentChanged {
                    archive: archive_path.to_path_buf(),
                    entry: file.source_entry_name.clone(),
                });
            }
            written += 1;
        }
    }

    package
        .start_file(INDEX_ENTRY_NAME, options)
        .map_err(ConsolidateError::WriteArchive)?;
    write_index(&mut package, index).map_err(ConsolidateError::SerializeIndex)?;
    package.finish().map_err(ConsolidateError::WriteArchive)?;

    Ok(written)
}
