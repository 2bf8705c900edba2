use std::collections::BTreeSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use calamari_digest::ContentHash;
use rayon::prelude::*;

use crate::dedup::{find_conflicts, EntryConflict};
use crate::fingerprint::{compute_fingerprint, delete_stale_outputs, output_file_name};
use crate::index::{build_index, IndexPackage};
use crate::source::PackageSource;
use crate::writer::{write_consolidated_package, CompressionLevel};
use crate::{ConsolidateError, PackageReference, SourceFileDescriptor};

/// Options that control a consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidateConfig {
    /// Part of the fingerprint, so that a new engine never reuses packages
    /// produced by an older one. Defaults to the version of this crate.
    pub engine_version: String,

    /// The compression used for the entries of the package.
    pub compression: CompressionLevel,

    /// Read the input packages on the rayon thread pool.
    pub parallel_extraction: bool,
}

impl Default for ConsolidateConfig {
    fn default() -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_owned(),
            compression: CompressionLevel::default(),
            parallel_extraction: true,
        }
    }
}

/// A package that was written by a consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidatedPackage {
    /// The location of the package.
    pub path: PathBuf,

    /// The fingerprint of the input packages.
    pub fingerprint: ContentHash,

    /// The number of distinct files stored in the package.
    pub file_count: usize,

    /// The index that was embedded in the package.
    pub index: Vec<IndexPackage>,

    /// Paths that have more than one content within the same package, version
    /// and platform. All contents are stored.
    pub conflicts: Vec<EntryConflict>,
}

/// The result of a consolidation run that did not fail outright.
#[derive(Debug, Clone)]
pub enum ConsolidationOutcome {
    /// A new package was written.
    Created(ConsolidatedPackage),

    /// A package for the same combination of inputs already existed.
    Reused(PathBuf),

    /// The output directory does not exist. Nothing was written.
    OutputDirectoryMissing(PathBuf),
}

impl ConsolidationOutcome {
    /// Returns true if a package is available at [`Self::output_path`].
    pub fn success(&self) -> bool {
        !matches!(self, Self::OutputDirectoryMissing(_))
    }

    /// Returns the location of the consolidated package, if there is one.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Created(package) => Some(&package.path),
            Self::Reused(path) => Some(path),
            Self::OutputDirectoryMissing(_) => None,
        }
    }
}

/// Consolidates Calamari packages into a single deduplicated package.
#[derive(Debug, Clone, Default)]
pub struct Consolidator {
    config: ConsolidateConfig,
}

impl Consolidator {
    /// Constructs a new instance.
    pub fn new(config: ConsolidateConfig) -> Self {
        Self { config }
    }

    /// Consolidates the packages in `references` into `output_dir`.
    ///
    /// References whose name does not start with `Calamari` or `Sashimi.` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// A missing output directory is reported through
    /// [`ConsolidationOutcome::OutputDirectoryMissing`]. A `Calamari` package
    /// without its `.nupkg`, or any failure to read or write an archive, is
    /// returned as an error and leaves no package behind.
    pub fn execute(
        &self,
        output_dir: &Path,
        references: &[PackageReference],
    ) -> Result<ConsolidationOutcome, ConsolidateError> {
        if !output_dir.is_dir() {
            tracing::error!("the output directory {} does not exist", output_dir.display());
            return Ok(ConsolidationOutcome::OutputDirectoryMissing(
                output_dir.to_path_buf(),
            ));
        }

        let sources = references
            .iter()
            .filter_map(PackageSource::from_reference)
            .collect::<Vec<_>>();

        let fingerprint = compute_fingerprint(
            sources.iter().map(PackageSource::reference),
            &self.config.engine_version,
        );
        tracing::info!("hash of the package combination is {fingerprint}");

        let destination = output_dir.join(output_file_name(&fingerprint));
        if destination.is_file() {
            tracing::info!(
                "{} already exists for this package combination",
                destination.display()
            );
            return Ok(ConsolidationOutcome::Reused(destination));
        }

        let deleted = delete_stale_outputs(output_dir)?;
        if !deleted.is_empty() {
            tracing::debug!("deleted {} stale consolidated packages", deleted.len());
        }

        tracing::info!("scanning {} packages", sources.len());
        let files = self.source_files(&sources)?;

        tracing::info!("creating consolidated package {}", destination.display());
        let start = Instant::now();
        let index = build_index(&files);
        let conflicts = find_conflicts(&files);
        for conflict in &conflicts {
            tracing::warn!(
                "{} {} for {} contains {} different files at '{}'",
                conflict.package_id,
                conflict.version,
                conflict.platform,
                conflict.hashes.len(),
                conflict.destination_entry_name
            );
        }

        let file_count = self.write_package(output_dir, &destination, &files, &index)?;
        tracing::info!("package creation took {}ms", start.elapsed().as_millis());

        let packaged = files
            .iter()
            .map(|file| (file.package_id.as_str(), file.platform.as_str()))
            .collect::<BTreeSet<_>>();
        for (package_id, platform) in packaged {
            tracing::info!("packaged {package_id} for {platform}");
        }

        Ok(ConsolidationOutcome::Created(ConsolidatedPackage {
            path: destination,
            fingerprint,
            file_count,
            index,
            conflicts,
        }))
    }

    /// Reads the files of every source. The order of the result does not
    /// matter to the steps that follow.
    fn source_files(
        &self,
        sources: &[PackageSource<'_>],
    ) -> Result<Vec<SourceFileDescriptor>, ConsolidateError> {
        let per_source: Vec<Vec<SourceFileDescriptor>> = if self.config.parallel_extraction {
            sources
                .par_iter()
                .map(PackageSource::source_files)
                .collect::<Result<_, _>>()?
        } else {
            sources
                .iter()
                .map(PackageSource::source_files)
                .collect::<Result<_, _>>()?
        };
        Ok(per_source.into_iter().flatten().collect())
    }

    /// Writes the package to a temporary file next to `destination` and moves
    /// it into place once it is complete.
    fn write_package(
        &self,
        output_dir: &Path,
        destination: &Path,
        files: &[SourceFileDescriptor],
        index: &[IndexPackage],
    ) -> Result<usize, ConsolidateError> {
        let mut temp_file = tempfile::Builder::new()
            .prefix(".calamari-")
            .suffix(".tmp")
            .tempfile_in(output_dir)?;

        let file_count = {
            let mut writer = BufWriter::new(temp_file.as_file_mut());
            let file_count =
                write_consolidated_package(&mut writer, files, index, self.config.compression)?;
            writer.flush()?;
            file_count
        };

        match temp_file.persist_noclobber(destination) {
            Ok(_) => Ok(file_count),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(file_count),
            Err(e) => Err(e.error.into()),
        }
    }
}
