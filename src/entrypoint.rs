use std::{fs, path::Path, sync::LazyLock};

use log::debug;
use regex::Regex;

use crate::Result;

static VALID_ENTRYPOINTS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"^run(\.sh)?$").unwrap(),
        Regex::new(r"^start(\.sh)?$").unwrap(),
        Regex::new(r"^exec$").unwrap(),
        Regex::new(r"^execute$").unwrap(),
    ]
});

/// Returns the command that most likely starts the application in `source_dir`.
///
/// Only regular files directly inside `source_dir`, or symlinks to them, are considered, in name order. A file
/// qualifies when its name is one of `run`, `run.sh`, `start`, `start.sh`, `exec` or `execute`
/// and, on Unix, it has an executable bit set. The result is relative to `source_dir`, for
/// example `./run`.
pub fn guess_entrypoint(source_dir: &Path) -> Result<String> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;
        // Follows symlinks, a `run` link to a script qualifies.
        if matches!(fs::metadata(entry.path()), Ok(metadata) if metadata.is_file()) {
            names.push(entry.file_name());
        }
    }
    names.sort();

    for name in names {
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_valid_entrypoint(&source_dir.join(name))? {
            debug!("found valid entrypoint {name:?}");
            return Ok(format!("./{name}"));
        }
    }

    Err(format!(
        "no valid entrypoint found in {source_dir:?}, expected an executable `run`, `start`, `exec` or `execute` script"
    )
    .into())
}

fn is_valid_entrypoint(path: &Path) -> Result<bool> {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return Ok(false);
    };
    if !VALID_ENTRYPOINTS
        .iter()
        .any(|pattern| pattern.is_match(name))
    {
        return Ok(false);
    }
    is_executable(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    Ok(fs::metadata(path)?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> Result<bool> {
    Ok(true)
}
