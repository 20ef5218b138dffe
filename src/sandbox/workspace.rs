use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "code_exec_";
const WORKSPACE_PERMISSIONS: u32 = 0o700;
const SOURCE_PERMISSIONS: u32 = 0o600;

/// Directory owned by a single execution.
///
/// Removed when dropped, whatever the outcome of the execution was.
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates a fresh owner-only directory under `root`
    pub fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .with_context(|| format!("Failed to create workspace under {}", root.display()))?;
        fs::set_permissions(dir.path(), Permissions::from_mode(WORKSPACE_PERMISSIONS))?;

        let path = dir.path().to_path_buf();
        log::debug!("Created workspace {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the submitted source under `file_name`, readable by the owner only
    pub fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf> {
        if Path::new(file_name).file_name().and_then(|n| n.to_str()) != Some(file_name) {
            bail!("Refusing to write source outside the workspace: {file_name}");
        }

        let source_path = self.path.join(file_name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(SOURCE_PERMISSIONS)
            .open(&source_path)
            .with_context(|| format!("Failed to create {}", source_path.display()))?;
        file.write_all(code.as_bytes())?;

        Ok(source_path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => log::debug!("Removed workspace {}", self.path.display()),
            Err(e) => log::warn!("Unable to remove workspace {}: {e}", self.path.display()),
        }
    }
}
