use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use regex::Regex;
use walkdir::WalkDir;

use crate::{temp_path, Result};

/// Default exclusion for `--exclude`, matching `.git` at any depth.
pub const DEFAULT_EXCLUDE: &str = r"(^|/)\.git(/|$)";

pub trait Archiver {
    /// Writes a tar archive of the contents of `dir` into a new file inside `base` and returns its
    /// path. Entry paths are relative to `dir`.
    fn create_tar_file(&self, base: &Path, dir: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Default)]
pub struct TarArchiver {
    exclude: Option<Regex>,
}

impl TarArchiver {
    /// Skips every entry whose `/`-separated path relative to the archived directory matches
    /// `exclude`, along with everything below it.
    pub fn with_exclude(exclude: Regex) -> Self {
        Self {
            exclude: Some(exclude),
        }
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        let relative = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        exclude.is_match(&relative)
    }
}

impl Archiver for TarArchiver {
    fn create_tar_file(&self, base: &Path, dir: &Path) -> Result<PathBuf> {
        let path = temp_path::random_path(base, "tar", ".tar");
        debug!("archiving {dir:?} into {path:?}");

        let mut builder = tar::Builder::new(fs::File::create(&path)?);
        builder.follow_symlinks(false);

        let mut walker = WalkDir::new(dir).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry?;
            let relative = entry.path().strip_prefix(dir)?;
            if self.is_excluded(relative) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }
            builder.append_path_with_name(entry.path(), relative)?;
        }

        builder.into_inner()?.sync_all()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
        use std::io::Read;

        let mut archive = tar::Archive::new(fs::File::open(path).unwrap());
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents).unwrap();
                (name, contents)
            })
            .collect()
    }

    fn source_tree() -> tempfile::TempDir {
        let work = tempfile::tempdir().unwrap();
        let src = work.path().join("upload/src");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::create_dir_all(src.join(".git/objects")).unwrap();
        fs::write(src.join("Dockerfile"), "FROM base:latest\n").unwrap();
        fs::write(src.join("lib/app.py"), "print('hi')\n").unwrap();
        fs::write(src.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        work
    }

    #[test]
    fn archive_is_relative_to_dir_and_created_in_base() {
        let work = source_tree();
        let src = work.path().join("upload/src");

        let path = TarArchiver::default()
            .create_tar_file(work.path(), &src)
            .unwrap();
        assert_eq!(path.parent(), Some(work.path()));

        let entries = entries(&path);
        assert_eq!(entries["Dockerfile"], b"FROM base:latest\n");
        assert_eq!(entries["lib/app.py"], b"print('hi')\n");
        assert_eq!(entries[".git/HEAD"], b"ref: refs/heads/main\n");
        assert!(!entries.keys().any(|name| name.contains("upload")));
    }

    #[test]
    fn extraction_reproduces_the_tree() {
        let work = source_tree();
        let src = work.path().join("upload/src");
        let path = TarArchiver::default()
            .create_tar_file(work.path(), &src)
            .unwrap();

        let out = tempfile::tempdir().unwrap();
        tar::Archive::new(fs::File::open(&path).unwrap())
            .unpack(out.path())
            .unwrap();

        for entry in WalkDir::new(&src).min_depth(1) {
            let entry = entry.unwrap();
            let relative = entry.path().strip_prefix(&src).unwrap();
            let extracted = out.path().join(relative);
            if entry.file_type().is_dir() {
                assert!(extracted.is_dir(), "{relative:?}");
            } else {
                assert_eq!(
                    fs::read(entry.path()).unwrap(),
                    fs::read(&extracted).unwrap(),
                    "{relative:?}"
                );
            }
        }
    }

    #[test]
    fn excluded_entries_are_skipped() {
        let work = source_tree();
        let src = work.path().join("upload/src");
        let archiver = TarArchiver::with_exclude(Regex::new(DEFAULT_EXCLUDE).unwrap());

        let entries = entries(&archiver.create_tar_file(work.path(), &src).unwrap());
        assert!(entries.contains_key("Dockerfile"));
        assert!(entries.contains_key("lib/app.py"));
        assert!(!entries.keys().any(|name| name.starts_with(".git")));
    }
}
