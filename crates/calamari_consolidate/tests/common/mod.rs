#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use calamari_consolidate::PackageReference;
use zip::write::SimpleFileOptions;

/// Writes a zip archive. Names ending with `/` are added as directories.
/// Contents are text to keep the fixtures readable.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// Creates a resolved `Calamari*` package below `root` the way the package
/// cache lays it out, including the NuGet metadata entries.
pub fn calamari_package(
    root: &Path,
    name: &str,
    version: &str,
    files: &[(&str, &str)],
) -> PackageReference {
    let resolved_path = root.join(name.to_lowercase()).join(version);
    let mut entries: Vec<(&str, &str)> = vec![
        ("[Content_Types].xml", "<Types />"),
        ("_rels/.rels", "<Relationships />"),
        (
            "package/services/metadata/core-properties/0123.psmdcp",
            "<coreProperties />",
        ),
    ];
    entries.extend_from_slice(files);

    let nupkg = resolved_path.join(format!("{name}.{version}.nupkg").to_lowercase());
    write_zip(&nupkg, &entries);
    PackageReference::new(name, version, resolved_path)
}

/// Creates a resolved `Sashimi.*` package with the given tool archives.
pub fn sashimi_package(
    root: &Path,
    name: &str,
    version: &str,
    tool_archives: &[(&str, &[(&str, &str)])],
) -> PackageReference {
    let resolved_path = root.join(name.to_lowercase()).join(version);
    std::fs::create_dir_all(&resolved_path).unwrap();
    for (archive_name, entries) in tool_archives {
        write_zip(&resolved_path.join("tools").join(archive_name), entries);
    }
    PackageReference::new(name, version, resolved_path)
}

/// The five packages that make up a Calamari release.
pub fn calamari_release(root: &Path) -> Vec<PackageReference> {
    vec![
        calamari_package(
            root,
            "Calamari",
            "12.0.2",
            &[
                ("Calamari.exe", "netfx calamari"),
                ("Shared.dll", "shared library"),
            ],
        ),
        calamari_package(
            root,
            "Calamari.Cloud",
            "12.0.2",
            &[
                ("Calamari.Cloud.exe", "cloud calamari"),
                ("Shared.dll", "shared library"),
            ],
        ),
        calamari_package(
            root,
            "Calamari.linux-x64",
            "12.0.2",
            &[
                ("Calamari", "linux calamari"),
                ("Shared.dll", "shared library"),
            ],
        ),
        calamari_package(
            root,
            "Calamari.osx-x64",
            "12.0.2",
            &[
                ("Calamari", "osx calamari"),
                ("Shared.dll", "shared library"),
            ],
        ),
        calamari_package(
            root,
            "Calamari.win-x64",
            "12.0.2",
            &[
                ("Calamari.exe", "win calamari"),
                ("Shared.dll", "shared library"),
            ],
        ),
    ]
}

/// Reads all file entries of a zip archive.
pub fn read_zip(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.insert(entry.name().to_owned(), content);
    }
    entries
}

/// Lists the files in a directory.
pub fn list_dir(path: &Path) -> Vec<PathBuf> {
    let mut files = std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect::<Vec<_>>();
    files.sort();
    files
}
