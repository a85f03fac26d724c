//! Seam for reading an application name out of a deployable package.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while reading a package descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The package could not be opened.
    #[error("failed to read package '{}': {source}", path.display())]
    Read {
        /// Package path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The package was readable but carried no usable name.
    #[error("package '{}' does not declare an application name", path.display())]
    MissingName {
        /// Package path.
        path: PathBuf,
    },
}

/// Extracts the application name declared by a deployable package.
pub trait PackageDescriptor: Send + Sync {
    /// Returns the name the package installs under.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when the package cannot be read or names
    /// no application.
    fn application_name(&self, package: &Path) -> Result<String, DescriptorError>;
}

/// Descriptor that always yields the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedName {
    name: String,
}

impl FixedName {
    /// Builds a descriptor returning `name` for every package.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PackageDescriptor for FixedName {
    fn application_name(&self, package: &Path) -> Result<String, DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::MissingName {
                path: package.to_path_buf(),
            });
        }
        Ok(self.name.clone())
    }
}

/// Descriptor naming the application after the package's file stem.
///
/// The package must exist and be a regular file; `orders.ear` installs as
/// `orders`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStem;

impl PackageDescriptor for ArchiveStem {
    fn application_name(&self, package: &Path) -> Result<String, DescriptorError> {
        let metadata = fs::metadata(package).map_err(|source| DescriptorError::Read {
            path: package.to_path_buf(),
            source,
        })?;
        let stem = package
            .file_stem()
            .and_then(std::ffi::OsStr::to_str)
            .map(str::trim)
            .filter(|name| metadata.is_file() && !name.is_empty());
        stem.map(str::to_owned)
            .ok_or_else(|| DescriptorError::MissingName {
                path: package.to_path_buf(),
            })
    }
}
