use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use log::debug;
use walkdir::WalkDir;

use crate::{temp_path, Result};

const WORKING_DIRECTORY_PREFIX: &str = "onbuild";

/// Filesystem operations used to stage a build.
pub trait FileSystem {
    /// Creates a new, uniquely named, empty directory.
    fn create_working_directory(&self) -> Result<PathBuf>;

    /// Recursively copies `source` to `target`, creating missing parents of `target`.
    fn copy(&self, source: &Path, target: &Path) -> Result<()>;

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn remove_directory(&self, path: &Path) -> Result<()>;

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
}

/// [`FileSystem`] on the local disk. Working directories are created under `root`.
#[derive(Debug)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSystem for LocalFileSystem {
    fn create_working_directory(&self) -> Result<PathBuf> {
        let dir = temp_path::random_path(&self.root, WORKING_DIRECTORY_PREFIX, "");
        // Fails rather than reuse an existing directory.
        fs::create_dir(&dir)?;
        debug!("created working directory {dir:?}");
        Ok(dir)
    }

    fn copy(&self, source: &Path, target: &Path) -> Result<()> {
        debug!("copying {source:?} to {target:?}");
        let metadata = fs::metadata(source)
            .map_err(|error| format!("failed to read source {source:?}: {error}"))?;
        if !metadata.is_dir() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source, target)?;
            return Ok(());
        }

        // Walk canonical paths so a target inside the source can be recognized and skipped.
        fs::create_dir_all(target)?;
        let source = fs::canonicalize(source)?;
        let skip = fs::canonicalize(target)?;
        let walker = WalkDir::new(&source)
            .into_iter()
            .filter_entry(|entry| !entry.path().starts_with(&skip));
        for entry in walker {
            let entry = entry?;
            let relative = entry.path().strip_prefix(&source)?;
            let destination = target.join(relative);
            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&destination)?;
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &destination)?;
            } else {
                fs::copy(entry.path(), &destination)?;
            }
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents)?;
        Ok(())
    }

    fn remove_directory(&self, path: &Path) -> Result<()> {
        debug!("removing {path:?}");
        fs::remove_dir_all(path)?;
        Ok(())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    fs::copy(source, target)?;
    Ok(())
}
