//! Naming of consolidated packages.
//!
//! A consolidated package is named after a fingerprint of the packages that
//! went into it and the version of the engine that produced it. If a package
//! with the expected name already exists it is assumed to be up to date.

use std::path::{Path, PathBuf};

use calamari_digest::{compute_bytes_hash, ContentHash};
use fs_err as fs;
use itertools::Itertools;

use crate::PackageReference;

/// The glob every consolidated package name matches.
pub const OUTPUT_FILE_PATTERN: &str = "Calamari.*.zip";

/// Computes the fingerprint of a combination of packages.
///
/// Only pass the references that take part in consolidation. The result does
/// not depend on the order of `references`.
pub fn compute_fingerprint<'a>(
    references: impl IntoIterator<Item = &'a PackageReference>,
    engine_version: &str,
) -> ContentHash {
    let mut combination = references
        .into_iter()
        .sorted_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)))
        .map(|reference| format!("{}{}", reference.name, reference.version))
        .join(",");
    combination.push_str(engine_version);
    compute_bytes_hash(combination)
}

/// Returns the file name of the consolidated package with the given
/// fingerprint.
pub fn output_file_name(fingerprint: &ContentHash) -> String {
    format!("Calamari.{fingerprint}.zip")
}

/// Deletes every previously consolidated package in `output_dir` and returns
/// the paths that were removed.
pub fn delete_stale_outputs(output_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(OUTPUT_FILE_PATTERN)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let mut deleted = Vec::new();
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| pattern.matches(name));
        if matches && entry.file_type()?.is_file() {
            let path = entry.path();
            tracing::debug!("deleting stale package {}", path.display());
            fs::remove_file(&path)?;
            deleted.push(path);
        }
    }
    Ok(deleted)
}
