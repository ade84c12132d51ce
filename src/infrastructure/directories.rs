use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub archive_root: PathBuf,
}

/// Creates the log and archive roots; `archive_override` wins over the
/// configured root.
pub fn ensure_directories(
    cfg: &DirectoryConfig,
    archive_override: Option<&Path>,
) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(Path::new(&cfg.logs_dir))?;
    let archive_root = ensure_dir(archive_override.unwrap_or(Path::new(&cfg.archive_root)))?;

    let marker = archive_root.join(".write-test");
    fs::write(&marker, b"ok")
        .with_context(|| format!("archive root {} is not writable", archive_root.display()))?;
    fs::remove_file(&marker)?;

    Ok(ResolvedPaths {
        logs_dir,
        archive_root,
    })
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o755);
            let _ = fs::set_permissions(dir, perms);
        }
    }
    Ok(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_configured_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = DirectoryConfig {
            archive_root: tmp.path().join("Database").display().to_string(),
            logs_dir: tmp.path().join("logs").display().to_string(),
        };
        let custom = tmp.path().join("elsewhere");

        let paths = ensure_directories(&cfg, Some(&custom)).unwrap();

        assert!(paths.logs_dir.is_dir());
        assert!(paths.archive_root.ends_with("elsewhere"));
        assert!(!tmp.path().join("Database").exists());
        assert!(!paths.archive_root.join(".write-test").exists());
    }

    #[test]
    fn defaults_to_configured_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = DirectoryConfig {
            archive_root: tmp.path().join("Database").display().to_string(),
            logs_dir: tmp.path().join("logs").display().to_string(),
        };
        let paths = ensure_directories(&cfg, None).unwrap();
        assert!(paths.archive_root.ends_with("Database"));
        assert!(paths.archive_root.is_dir());
    }
}
