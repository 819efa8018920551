use std::{path::Path, sync::LazyLock};

use log::info;
use regex::Regex;

use crate::{process, Result};

/// Version control operations used to fetch a remote source.
pub trait Vcs {
    /// Returns true if `source` should be cloned rather than copied from the filesystem.
    fn valid_clone_spec(&self, source: &str) -> bool;

    fn clone(&self, source: &str, target_dir: &Path) -> Result<()>;

    fn checkout(&self, repo_dir: &Path, git_ref: &str) -> Result<()>;
}

const ALLOWED_SCHEMES: &[&str] = &["git", "http", "https", "file", "ssh"];

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.-]*)://").unwrap());

/// Returns true if `source` is a URL with one of [`ALLOWED_SCHEMES`], an scp-like `git@host:path`
/// location, or a scheme-less path ending in `.git`.
pub fn is_clone_spec(source: &str) -> bool {
    if let Some(captures) = SCHEME.captures(source) {
        let scheme = captures[1].to_ascii_lowercase();
        return ALLOWED_SCHEMES.contains(&scheme.as_str());
    }
    source.ends_with(".git") || (source.starts_with("git@") && source.contains(':'))
}

/// [`Vcs`] backed by the `git` command line.
#[derive(Debug, Default)]
pub struct GitCli;

impl Vcs for GitCli {
    fn valid_clone_spec(&self, source: &str) -> bool {
        is_clone_spec(source)
    }

    fn clone(&self, source: &str, target_dir: &Path) -> Result<()> {
        info!("Cloning {source:?}...");
        process::command!(
            "git",
            "clone",
            "--quiet",
            "--recursive",
            "--",
            source,
            target_dir
        )
        .status()?;
        Ok(())
    }

    fn checkout(&self, repo_dir: &Path, git_ref: &str) -> Result<()> {
        info!("Checking out {git_ref:?}...");
        process::command!("git", "-C", repo_dir, "checkout", "--quiet", git_ref).status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    #[test]
    fn remote_urls_are_clone_specs() {
        for source in [
            "https://github.com/example/app",
            "http://example.com/app.git",
            "git://example.com/app",
            "ssh://git@example.com/app.git",
            "file:///srv/git/app",
            "HTTPS://example.com/app",
        ] {
            assert!(is_clone_spec(source), "{source}");
        }
    }

    #[test]
    fn scp_like_and_dot_git_are_clone_specs() {
        assert!(is_clone_spec("git@github.com:example/app.git"));
        assert!(is_clone_spec("git@github.com:example/app"));
        assert!(is_clone_spec("/srv/git/app.git"));
    }

    #[test]
    fn plain_paths_are_not_clone_specs() {
        for source in [
            "/tmp/app",
            "app",
            ".",
            "./src",
            "git@nocolon",
            "ftp://example.com/app",
        ] {
            assert!(!is_clone_spec(source), "{source}");
        }
    }

    fn git_available() -> bool {
        process::command!("git", "--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        process::Command::new("git")
            .args(
                [OsStr::new("-C"), dir.as_os_str()]
                    .into_iter()
                    .chain(args.iter().map(OsStr::new)),
            )
            .output()
            .unwrap();
    }

    #[test]
    fn clone_and_checkout_local_repository() {
        if !git_available() {
            return;
        }
        let origin = tempfile::tempdir().unwrap();
        git(origin.path(), &["init", "--quiet"]);
        git(origin.path(), &["config", "user.email", "onbuild@example.com"]);
        git(origin.path(), &["config", "user.name", "onbuild"]);
        git(origin.path(), &["config", "commit.gpgsign", "false"]);
        std::fs::write(origin.path().join("run"), "v1").unwrap();
        git(origin.path(), &["add", "."]);
        git(origin.path(), &["commit", "--quiet", "-m", "v1"]);
        git(origin.path(), &["tag", "v1"]);
        std::fs::write(origin.path().join("run"), "v2").unwrap();
        git(origin.path(), &["commit", "--quiet", "-am", "v2"]);

        let work = tempfile::tempdir().unwrap();
        let target = work.path().join("upload").join("src");
        let source = format!("file://{}", origin.path().display());
        assert!(GitCli.valid_clone_spec(&source));

        GitCli.clone(&source, &target).unwrap();
        assert_eq!(std::fs::read_to_string(target.join("run")).unwrap(), "v2");

        GitCli.checkout(&target, "v1").unwrap();
        assert_eq!(std::fs::read_to_string(target.join("run")).unwrap(), "v1");

        assert!(GitCli.checkout(&target, "no-such-ref").is_err());
    }
}
