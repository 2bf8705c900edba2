//! Removes duplicate content from the extracted files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use calamari_digest::ContentHash;

use crate::SourceFileDescriptor;

/// Groups the files that need to be written to the consolidated package by the
/// archive they are read from.
///
/// Files with the same destination and hash are stored once. The first file of
/// such a group is the one that gets copied.
pub(crate) fn unique_files_by_archive(
    files: &[SourceFileDescriptor],
) -> BTreeMap<&Path, Vec<&SourceFileDescriptor>> {
    let mut unique: BTreeMap<(&str, ContentHash), &SourceFileDescriptor> = BTreeMap::new();
    for file in files {
        unique
            .entry((file.destination_entry_name.as_str(), file.content_hash))
            .or_insert(file);
    }

    let mut by_archive: BTreeMap<&Path, Vec<&SourceFileDescriptor>> = BTreeMap::new();
    for file in unique.into_values() {
        by_archive
            .entry(file.source_archive_path.as_path())
            .or_default()
            .push(file);
    }
    by_archive
}

/// Two or more different contents that claim the same path within one
/// package, version and platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryConflict {
    /// The logical package.
    pub package_id: String,
    /// The package version.
    pub version: String,
    /// The platform.
    pub platform: String,
    /// The path that is claimed more than once.
    pub destination_entry_name: String,
    /// The distinct hashes found for the path, in ascending order.
    pub hashes: Vec<ContentHash>,
}

/// Finds every path that has more than one content within the same package,
/// version and platform.
pub(crate) fn find_conflicts(files: &[SourceFileDescriptor]) -> Vec<EntryConflict> {
    let mut claims: BTreeMap<(&str, &str, &str, &str), BTreeSet<ContentHash>> = BTreeMap::new();
    for file in files {
        claims
            .entry((
                file.package_id.as_str(),
                file.version.as_str(),
                file.platform.as_str(),
                file.destination_entry_name.as_str(),
            ))
            .or_default()
            .insert(file.content_hash);
    }

    claims
        .into_iter()
        .filter(|(_, hashes)| hashes.len() > 1)
        .map(
            |((package_id, version, platform, destination_entry_name), hashes)| EntryConflict {
                package_id: package_id.to_owned(),
                version: version.to_owned(),
                platform: platform.to_owned(),
                destination_entry_name: destination_entry_name.to_owned(),
                hashes: hashes.into_iter().collect(),
            },
        )
        .collect()
}
