//! Reads the files of the two supported package layouts.
//!
//! `Calamari*` packages are a single `.nupkg` whose entries all target one
//! platform. `Sashimi.*` packages carry a `tools` directory with zip archives
//! that contain one top level folder per platform.

use std::path::{Path, PathBuf};

use calamari_digest::compute_reader_hash;
use fs_err as fs;
use zip::ZipArchive;

use crate::{ConsolidateError, PackageReference, SourceFileDescriptor};

/// Names starting with this prefix are read as a single `.nupkg`.
pub const CALAMARI_PREFIX: &str = "Calamari";

/// Names starting with this prefix are read from their `tools` directory.
pub const SASHIMI_PREFIX: &str = "Sashimi.";

/// The platform of the packages that target the full .NET framework.
pub const NETFX_PLATFORM: &str = "netfx";

const CALAMARI_PACKAGE_ID: &str = "Calamari";
const CLOUD_PACKAGE_ID: &str = "Calamari.Cloud";
const TOOLS_DIR: &str = "tools";

/// A package reference together with the layout its files are read from.
#[derive(Debug, Clone, Copy)]
pub enum PackageSource<'a> {
    /// A `Calamari*` package.
    Nupkg(&'a PackageReference),

    /// A `Sashimi.*` package.
    ToolArchives(&'a PackageReference),
}

impl<'a> PackageSource<'a> {
    /// Selects the layout of a package by its name. Returns `None` for packages
    /// that do not take part in consolidation.
    pub fn from_reference(reference: &'a PackageReference) -> Option<Self> {
        if reference.name.starts_with(CALAMARI_PREFIX) {
            Some(Self::Nupkg(reference))
        } else if reference.name.starts_with(SASHIMI_PREFIX) {
            Some(Self::ToolArchives(reference))
        } else {
            None
        }
    }

    /// The package reference this source reads from.
    pub fn reference(&self) -> &'a PackageReference {
        match self {
            Self::Nupkg(reference) | Self::ToolArchives(reference) => reference,
        }
    }

    /// Reads and hashes every file this package contributes.
    pub fn source_files(&self) -> Result<Vec<SourceFileDescriptor>, ConsolidateError> {
        match self {
            Self::Nupkg(reference) => read_nupkg(reference),
            Self::ToolArchives(reference) => read_tool_archives(reference),
        }
    }
}

/// Returns the platform a `Calamari*` package targets.
pub fn nupkg_platform(name: &str) -> Result<&str, ConsolidateError> {
    if name == CALAMARI_PACKAGE_ID || name == CLOUD_PACKAGE_ID {
        return Ok(NETFX_PLATFORM);
    }
    match name.split('.').nth(1) {
        Some(platform) if !platform.is_empty() => Ok(platform),
        _ => Err(ConsolidateError::InvalidPackageName(name.to_owned())),
    }
}

/// Returns the logical package a `Calamari*` package belongs to. All platform
/// specific packages collapse into `Calamari`.
pub fn nupkg_package_id(name: &str) -> &'static str {
    if name == CLOUD_PACKAGE_ID {
        CLOUD_PACKAGE_ID
    } else {
        CALAMARI_PACKAGE_ID
    }
}

/// Returns the location of the `.nupkg` inside the resolved package directory.
/// The package cache stores these with a lowercase file name.
pub fn nupkg_path(reference: &PackageReference) -> PathBuf {
    reference.resolved_path.join(
        format!("{}.{}.nupkg", reference.name, reference.version).to_lowercase(),
    )
}

/// Entries that belong to the NuGet packaging format rather than to the
/// package contents.
fn is_package_metadata(entry_name: &str) -> bool {
    entry_name == "[Content_Types].xml"
        || entry_name.starts_with("_rels")
        || entry_name.starts_with("package/services")
}

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<fs::File>, ConsolidateError> {
    let file = fs::File::open(path)?;
    ZipArchive::new(file).map_err(|e| ConsolidateError::ReadArchive(path.to_path_buf(), e))
}

fn read_nupkg(reference: &PackageReference) -> Result<Vec<SourceFileDescriptor>, ConsolidateError> {
    let platform = nupkg_platform(&reference.name)?;
    let package_id = nupkg_package_id(&reference.name);

    let archive_path = nupkg_path(reference);
    if !archive_path.is_file() {
        return Err(ConsolidateError::MissingPackageArchive(archive_path));
    }

    let mut archive = open_archive(&archive_path)?;
    let mut files = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ConsolidateError::ReadArchive(archive_path.clone(), e))?;
        if entry.is_dir() || is_package_metadata(entry.name()) {
            continue;
        }

        let entry_name = entry.name().to_owned();
        let content_hash = compute_reader_hash(&mut entry)?;
        files.push(SourceFileDescriptor {
            package_id: package_id.to_owned(),
            version: reference.version.clone(),
            platform: platform.to_owned(),
            source_archive_path: archive_path.clone(),
            source_entry_name: entry_name.clone(),
            destination_entry_name: entry_name,
            content_hash,
        });
    }

    tracing::debug!("read {} files from {}", files.len(), archive_path.display());
    Ok(files)
}

fn read_tool_archives(
    reference: &PackageReference,
) -> Result<Vec<SourceFileDescriptor>, ConsolidateError> {
    let tools_dir = reference.resolved_path.join(TOOLS_DIR);
    if !tools_dir.is_dir() {
        tracing::info!(
            "skipping {} as it does not have a tools folder: {}",
            reference.name,
            tools_dir.display()
        );
        return Ok(Vec::new());
    }

    let mut tool_archives = Vec::new();
    for entry in fs::read_dir(&tools_dir)? {
        let path = entry?.path();
        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip && path.is_file() {
            tool_archives.push(path);
        }
    }

    if tool_archives.is_empty() {
        tracing::info!(
            "skipping {} as it does not have any zip files in the tools folder: {}",
            reference.name,
            tools_dir.display()
        );
        return Ok(Vec::new());
    }

    tool_archives.sort();

    let mut files = Vec::new();
    for archive_path in tool_archives {
        files.extend(read_tool_archive(reference, &archive_path)?);
    }
    Ok(files)
}

/// Reads a tool zip. Every file lives in a folder named after its platform.
fn read_tool_archive(
    reference: &PackageReference,
    archive_path: &Path,
) -> Result<Vec<SourceFileDescriptor>, ConsolidateError> {
    let package_id = archive_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut archive = open_archive(archive_path)?;
    let mut files = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ConsolidateError::ReadArchive(archive_path.to_path_buf(), e))?;
        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_owned();
        let Some((platform, destination)) = entry_name.split_once('/') else {
            tracing::warn!(
                "ignoring '{}' in {} as it is not inside a platform folder",
                entry_name,
                archive_path.display()
            );
            continue;
        };

        let content_hash = compute_reader_hash(&mut entry)?;
        files.push(SourceFileDescriptor {
            package_id: package_id.clone(),
            version: reference.version.clone(),
            platform: platform.to_owned(),
            source_archive_path: archive_path.to_path_buf(),
            source_entry_name: entry_name.clone(),
            destination_entry_name: destination.to_owned(),
            content_hash,
        });
    }

    tracing::debug!("read {} files from {}", files.len(), archive_path.display());
    Ok(files)
}
