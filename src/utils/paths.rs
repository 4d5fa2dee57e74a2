use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Ensures parent directories exist for a given path
///
/// # Errors
///
/// Returns an error if the parent directories cannot be created
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create parent directories for {}", path.display())
        })?;
    }
    Ok(())
}

/// Expands tilde in path to home directory
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    if let Some(path_str) = path.to_str() {
        if path_str.starts_with("~/") || path_str == "~" {
            let home = dirs::home_dir().context("Could not find home directory")?;
            if path_str == "~" {
                Ok(home)
            } else {
                Ok(home.join(&path_str[2..]))
            }
        } else {
            Ok(path.to_path_buf())
        }
    } else {
        Ok(path.to_path_buf())
    }
}

/// Makes a path absolute, resolving relative paths from current directory
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined
pub fn make_absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir()?;
        Ok(current_dir.join(path))
    }
}

/// Final path component as a lossy string, or the whole path when there is none
/// (e.g. `/`).
#[must_use]
pub fn file_base_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_parent_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let nested_file = temp_dir.path().join("a/b/c/file.txt");

        ensure_parent_dirs(&nested_file)?;
        assert!(temp_dir.path().join("a/b/c").is_dir());
        Ok(())
    }

    #[test]
    fn test_expand_tilde() -> Result<()> {
        let Some(home) = dirs::home_dir() else {
            return Ok(());
        };

        assert_eq!(expand_tilde(Path::new("~/documents"))?, home.join("documents"));
        assert_eq!(expand_tilde(Path::new("~"))?, home);

        let no_tilde = PathBuf::from("/absolute/path");
        assert_eq!(expand_tilde(&no_tilde)?, no_tilde);
        Ok(())
    }

    #[test]
    fn test_make_absolute() -> Result<()> {
        let absolute = PathBuf::from("/absolute/path");
        assert_eq!(make_absolute(&absolute)?, absolute);

        let result = make_absolute(Path::new("relative/path"))?;
        assert!(result.is_absolute());
        assert!(result.ends_with("relative/path"));
        Ok(())
    }

    #[test]
    fn test_file_base_name() {
        assert_eq!(file_base_name(Path::new("/var/log/syslog")), "syslog");
        assert_eq!(file_base_name(Path::new("report.tar.gz")), "report.tar.gz");
        assert_eq!(file_base_name(Path::new("/")), "/");
    }
}
