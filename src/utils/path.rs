//! Path utilities: expand `~` and make export targets absolute.

use std::env;
use std::path::PathBuf;

pub fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(path.trim_start_matches("~/"));
    }
    PathBuf::from(path)
}

/// Expand `~` and resolve relative paths against the current directory.
pub fn absolutize(path: &str) -> PathBuf {
    let p = expand_tilde(path);
    if p.is_absolute() {
        return p;
    }
    env::current_dir().map(|cwd| cwd.join(&p)).unwrap_or(p)
}
