//! Read-only access to an extracted bundle on disk.
//!
//! A bundle is a directory tree where every artifact directory holds one
//! `.platform` descriptor and any number of payload files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::descriptor::{is_descriptor_name, DescriptorFile};
use crate::domain::{ArtifactDefinition, ArtifactDescriptor, DefinitionPart, DESCRIPTOR_FILE_NAME};
use crate::error::{DeployError, Result};

/// An artifact directory discovered in a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleItem {
    /// Item directory relative to the bundle root, forward slashes
    pub relative_path: String,

    pub descriptor: ArtifactDescriptor,
}

/// Reader over an extracted bundle
#[derive(Debug, Clone)]
pub struct DefinitionStore {
    root: PathBuf,
}

impl DefinitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All descriptor files under the root, in path order
    pub fn descriptor_files(&self) -> Result<Vec<PathBuf>> {
        find_descriptor_files(&self.root)
    }

    /// Every artifact directory with a complete descriptor.
    ///
    /// Malformed or incomplete descriptors are logged and skipped.
    pub fn items(&self) -> Result<Vec<BundleItem>> {
        let mut items = Vec::new();

        for path in self.descriptor_files()? {
            if path.file_name().and_then(|n| n.to_str()) != Some(DESCRIPTOR_FILE_NAME) {
                continue;
            }

            let descriptor = match DescriptorFile::read(&path).and_then(|f| f.into_descriptor(&path)) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unusable descriptor");
                    continue;
                }
            };

            let item_dir = path.parent().unwrap_or(&self.root);
            items.push(BundleItem {
                relative_path: relative_slash_path(&self.root, item_dir),
                descriptor,
            });
        }

        Ok(items)
    }

    /// Read the definition of the artifact at `relative_item_path`
    pub fn read_definition(&self, relative_item_path: &str) -> Result<ArtifactDefinition> {
        let item_dir = self.root.join(relative_item_path);
        let descriptor_path = item_dir.join(DESCRIPTOR_FILE_NAME);

        if !descriptor_path.is_file() {
            return Err(DeployError::MalformedDescriptor {
                path: descriptor_path,
                reason: "descriptor file not found".to_string(),
            });
        }

        let descriptor = DescriptorFile::read(&descriptor_path)?.into_descriptor(&descriptor_path)?;

        let mut parts = Vec::new();
        for file in walk_files(&item_dir)? {
            if file.file_name().and_then(|n| n.to_str()) == Some(DESCRIPTOR_FILE_NAME) {
                continue;
            }

            let bytes = std::fs::read(&file).map_err(|e| DeployError::io(&file, e))?;
            parts.push(DefinitionPart::new(relative_slash_path(&item_dir, &file), bytes));
        }
        parts.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            item = %relative_item_path,
            parts = parts.len(),
            "Loaded artifact definition"
        );

        Ok(ArtifactDefinition { descriptor, parts })
    }
}

/// Recursively find descriptor files (`.platform`, `*.platform`) under `root`
pub fn find_descriptor_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = walk_files(root)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(is_descriptor_name)
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// All regular files below `dir`, including hidden ones.
///
/// Fails on the first entry that cannot be read.
fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DeployError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "directory not found"),
        ));
    }

    let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern)
        .map_err(|e| DeployError::Config(format!("Invalid bundle path pattern: {}", e)))?;

    // A partial listing would upload an incomplete definition, so any
    // unreadable entry fails the walk
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            DeployError::io(path, e.into_error())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `path` relative to `base`, joined with forward slashes
pub fn relative_slash_path(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
