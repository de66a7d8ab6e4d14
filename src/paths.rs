//! Offline-store path derivation.

use std::path::PathBuf;

/// Derive the offline-store file path for an account.
///
/// `data_folder` must already end with a path separator. The literal
/// `(1)` suffix is required by the host client's naming convention; the
/// store is not recognized without it.
pub fn offline_store_path(data_folder: &str, email: &str, profile_name: &str) -> String {
    format!("{data_folder}{email} - {profile_name}(1).ost")
}

/// Default data folder: the client's store directory under the per-user
/// local data directory, with a trailing separator.
pub fn default_data_folder() -> Option<String> {
    let base = dirs::data_local_dir()?;
    Some(join_with_separator(base, &["Microsoft", "Outlook"]))
}

fn join_with_separator(base: PathBuf, parts: &[&str]) -> String {
    let mut folder = base;
    for part in parts {
        folder.push(part);
    }
    let mut s = folder.to_string_lossy().into_owned();
    s.push(std::path::MAIN_SEPARATOR);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_store_path_literal_suffix() {
        assert_eq!(
            offline_store_path("C:\\data\\", "a@x.com", "P"),
            "C:\\data\\a@x.com - P(1).ost"
        );
    }

    #[test]
    fn test_default_data_folder_has_trailing_separator() {
        if let Some(folder) = default_data_folder() {
            assert!(folder.ends_with(std::path::MAIN_SEPARATOR));
            assert!(folder.contains("Outlook"));
        }
    }
}
