use std::collections::HashSet;
use std::fs;

#[cfg(unix)]
use std::ffi::CString;

/// Directories listed in the `PATH` environment variable, in order.
/// An unset `PATH` yields an empty list.
pub fn path_directories() -> Vec<String> {
    match std::env::var("PATH") {
        Ok(path) => split_path(&path),
        Err(_) => Vec::new(),
    }
}

/// Split a search-path string on the platform list separator.
/// Interior empty segments survive; a trailing separator contributes nothing.
pub fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }

    let separator = if cfg!(windows) { ';' } else { ':' };
    let mut directories: Vec<String> = path.split(separator).map(str::to_string).collect();
    if path.ends_with(separator) {
        directories.pop();
    }
    directories
}

/// Resolve a command name to the first matching executable on `PATH`.
pub fn find_executable(name: &str) -> Option<String> {
    find_executable_in_dirs(&path_directories(), name)
}

pub fn find_executable_in_dirs(directories: &[String], name: &str) -> Option<String> {
    for dir in directories {
        let filepath = format!("{dir}/{name}");
        if is_executable(&filepath) {
            return Some(filepath);
        }
    }
    None
}

/// Executable names on `PATH` that start with `prefix`, de-duplicated across
/// directories. Missing or unreadable directories contribute nothing.
pub fn matching_executables(prefix: &str, sort: bool) -> Vec<String> {
    matching_executables_in_dirs(&path_directories(), prefix, sort)
}

pub fn matching_executables_in_dirs(
    directories: &[String],
    prefix: &str,
    sort: bool,
) -> Vec<String> {
    let mut unique_names = HashSet::new();

    for dir in directories {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            if is_executable(&format!("{dir}/{name}")) {
                unique_names.insert(name);
            }
        }
    }

    let mut matches: Vec<String> = unique_names.into_iter().collect();
    if sort {
        matches.sort_unstable();
    }
    matches
}

/// POSIX: a regular file the effective user is permitted to execute.
#[cfg(unix)]
pub fn is_executable(filepath: &str) -> bool {
    let Ok(metadata) = fs::metadata(filepath) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    let Ok(c_path) = CString::new(filepath) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
}

/// Windows: an existing non-directory with a known executable extension.
#[cfg(not(unix))]
pub fn is_executable(filepath: &str) -> bool {
    let Ok(metadata) = fs::metadata(filepath) else {
        return false;
    };
    if metadata.is_dir() {
        return false;
    }

    match std::path::Path::new(filepath)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => matches!(
            ext.to_ascii_lowercase().as_str(),
            "exe" | "bat" | "ps1" | "cmd" | "com"
        ),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn split_path_preserves_interior_empty_segments() {
        assert_eq!(split_path("/a::/b"), vec!["/a", "", "/b"]);
    }

    #[test]
    fn split_path_drops_trailing_separator() {
        let sep = if cfg!(windows) { ';' } else { ':' };
        assert_eq!(split_path(&format!("/a{sep}/b{sep}")), vec!["/a", "/b"]);
        assert_eq!(split_path(&format!("{sep}")), vec![""]);
    }

    #[test]
    fn split_path_empty_string_is_empty() {
        assert!(split_path("").is_empty());
    }

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "coquille_resolver_{label}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[cfg(unix)]
    fn write_with_mode(dir: &Path, name: &str, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn find_executable_takes_first_directory_in_order() {
        let first = scratch_dir("find_first");
        let second = scratch_dir("find_second");
        write_with_mode(&first, "tool", 0o755);
        write_with_mode(&second, "tool", 0o755);

        let dirs = vec![
            first.to_string_lossy().to_string(),
            second.to_string_lossy().to_string(),
        ];
        let found = find_executable_in_dirs(&dirs, "tool").unwrap();
        assert!(found.starts_with(&dirs[0]), "found: {found}");

        let _ = fs::remove_dir_all(&first);
        let _ = fs::remove_dir_all(&second);
    }

    #[cfg(unix)]
    #[test]
    fn find_executable_skips_non_executable_files() {
        let dir = scratch_dir("find_nonexec");
        write_with_mode(&dir, "data", 0o644);

        let dirs = vec![dir.to_string_lossy().to_string()];
        assert_eq!(find_executable_in_dirs(&dirs, "data"), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn find_executable_ignores_missing_directories() {
        let dir = scratch_dir("find_missing");
        write_with_mode(&dir, "tool", 0o755);

        let dirs = vec![
            "/nonexistent-path-for-tests".to_string(),
            dir.to_string_lossy().to_string(),
        ];
        assert!(find_executable_in_dirs(&dirs, "tool").is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn directories_are_never_executables() {
        let dir = scratch_dir("find_dir");
        fs::create_dir_all(dir.join("subcmd")).unwrap();

        let dirs = vec![dir.to_string_lossy().to_string()];
        assert_eq!(find_executable_in_dirs(&dirs, "subcmd"), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn matching_executables_filters_sorts_and_dedupes() {
        let first = scratch_dir("match_first");
        let second = scratch_dir("match_second");
        write_with_mode(&first, "grep", 0o755);
        write_with_mode(&first, "groups", 0o755);
        write_with_mode(&first, "grand-plain", 0o644);
        write_with_mode(&second, "grep", 0o755);
        write_with_mode(&second, "ls", 0o755);

        let dirs = vec![
            first.to_string_lossy().to_string(),
            second.to_string_lossy().to_string(),
        ];
        let matches = matching_executables_in_dirs(&dirs, "gr", true);
        assert_eq!(matches, vec!["grep", "groups"]);

        let _ = fs::remove_dir_all(&first);
        let _ = fs::remove_dir_all(&second);
    }

    #[cfg(unix)]
    #[test]
    fn matching_executables_with_empty_prefix_lists_everything() {
        let dir = scratch_dir("match_all");
        write_with_mode(&dir, "aa", 0o755);
        write_with_mode(&dir, "bb", 0o755);

        let dirs = vec![dir.to_string_lossy().to_string()];
        let matches = matching_executables_in_dirs(&dirs, "", true);
        assert_eq!(matches, vec!["aa", "bb"]);

        let _ = fs::remove_dir_all(&dir);
    }
}
