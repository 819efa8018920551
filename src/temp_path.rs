use std::path::{Path, PathBuf};

const LEN: usize = 16;

/// Returns `<dir>/<prefix><16 random alphanumerics><ext>`. Nothing is created on disk.
pub fn random_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    use rand::distributions::{Alphanumeric, DistString};

    let mut name = String::with_capacity(prefix.len() + LEN + ext.len());
    name.push_str(prefix);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, LEN);
    name.push_str(ext);
    dir.join(name)
}
