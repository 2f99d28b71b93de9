//! Model file discovery.
//!
//! Walks a directory tree top-down: the matching files of a directory in name
//! order, then each sub-directory in name order. Directories are read one at a
//! time as the walk reaches them.

use crate::domain::XsectError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::vec;

/// File-name rule deciding which files are models.
///
/// A file qualifies when its name matches an include pattern and no exclude
/// pattern. The default rule keeps `*.p2dx` and drops the `*data.p2dx`
/// companions the application writes next to each model.
#[derive(Debug, Clone)]
pub struct DiscoveryRule {
    include: GlobSet,
    exclude: GlobSet,
}

impl DiscoveryRule {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, DiscoveryError> {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    pub fn matches_file_name(&self, file_name: impl AsRef<Path>) -> bool {
        let file_name = file_name.as_ref();
        self.include.is_match(file_name) && !self.exclude.is_match(file_name)
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, DiscoveryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = Glob::new(pattern).map_err(|source| DiscoveryError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|source| DiscoveryError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|pattern| pattern.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("directory not found: '{}'", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read directory '{}': {source}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid discovery pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

impl DiscoveryError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound { path } | Self::ReadDirectory { path, .. } => Some(path),
            Self::InvalidPattern { .. } => None,
        }
    }
}

impl From<DiscoveryError> for XsectError {
    fn from(error: DiscoveryError) -> Self {
        let message = error.to_string();
        match error {
            DiscoveryError::NotFound { .. } => {
                XsectError::input_validation("INPUT.ROOT_DIR", message)
            }
            DiscoveryError::ReadDirectory { .. } => XsectError::io_system("IO.DISCOVERY", message),
            DiscoveryError::InvalidPattern { .. } => {
                XsectError::input_validation("INPUT.DISCOVERY_PATTERN", message)
            }
        }
    }
}

/// Checks that `root` is an existing directory and returns its absolute form.
pub fn resolve_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotFound {
            path: root.to_path_buf(),
        });
    }
    std::path::absolute(root).map_err(|source| DiscoveryError::ReadDirectory {
        path: root.to_path_buf(),
        source,
    })
}

/// Lazy iterator over the model files below a root directory.
///
/// An unreadable sub-directory yields one `Err` item and the walk goes on
/// with its siblings.
pub struct ModelFiles {
    rule: DiscoveryRule,
    stack: Vec<DirectoryFrame>,
}

struct DirectoryFrame {
    files: vec::IntoIter<PathBuf>,
    directories: vec::IntoIter<PathBuf>,
}

pub fn discover_model_files(
    root: &Path,
    rule: DiscoveryRule,
) -> Result<ModelFiles, DiscoveryError> {
    let root = resolve_root(root)?;
    let frame = read_frame(&root, &rule)?;
    Ok(ModelFiles {
        rule,
        stack: vec![frame],
    })
}

impl Iterator for ModelFiles {
    type Item = Result<PathBuf, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some(file) = frame.files.next() {
                return Some(Ok(file));
            }
            match frame.directories.next() {
                Some(directory) => match read_frame(&directory, &self.rule) {
                    Ok(child) => self.stack.push(child),
                    Err(error) => return Some(Err(error)),
                },
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

fn read_frame(directory: &Path, rule: &DiscoveryRule) -> Result<DirectoryFrame, DiscoveryError> {
    let read_error = |source| DiscoveryError::ReadDirectory {
        path: directory.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for entry in fs::read_dir(directory).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let file_type = entry.file_type().map_err(read_error)?;
        let path = entry.path();

        if file_type.is_dir() {
            directories.push(path);
            continue;
        }

        if rule.matches_file_name(entry.file_name()) {
            files.push(path);
        }
    }

    files.sort();
    directories.sort();
    Ok(DirectoryFrame {
        files: files.into_iter(),
        directories: directories.into_iter(),
    })
}
