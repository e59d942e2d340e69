//! Path policy shared by the file tools.

use std::path::PathBuf;

/// Paths blocked by default for both reading and writing.
pub fn default_forbidden() -> Vec<String> {
    [
        "~/.ssh",
        "~/.gnupg",
        "~/.aws",
        "/etc/shadow",
        "/etc/sudoers",
        "/proc",
        "/sys",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Reject `path` if it falls under any forbidden prefix.
pub fn check_path(path: &str, forbidden: &[String]) -> Result<(), String> {
    let candidate = expand_home(path);
    for prefix in forbidden {
        let prefix = expand_home(prefix);
        if candidate.starts_with(&prefix) {
            return Err(format!("path '{path}' is under forbidden prefix '{prefix}'"));
        }
    }
    Ok(())
}

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~") {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        return format!("{}{rest}", home.display());
    }
    path.to_string()
}
