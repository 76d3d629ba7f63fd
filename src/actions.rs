//! Per-entry actions for the presentation layer. They only need a path and
//! never touch catalog state.

use std::path::Path;
use std::process::Command;

use crate::{CatalogError, Result};

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(CatalogError::MissingFile(path.to_path_buf()))
    }
}

/// Opens the file with the platform's default application.
pub fn open_externally(path: &Path) -> Result<()> {
    ensure_exists(path)?;
    open::that_detached(path).map_err(|e| CatalogError::CommandExecution(e.to_string()))
}

/// Shows the file selected in the platform file manager. Where the file
/// manager cannot select a file, its containing folder is opened instead.
pub fn reveal(path: &Path) -> Result<()> {
    ensure_exists(path)?;

    match reveal_command(path) {
        Some(mut cmd) => {
            cmd.spawn()
                .map_err(|e| CatalogError::CommandExecution(e.to_string()))?;
            Ok(())
        }
        None => {
            let folder = path.parent().unwrap_or(path);
            open::that_detached(folder).map_err(|e| CatalogError::CommandExecution(e.to_string()))
        }
    }
}

/// The command that selects `path` in the file manager, if this platform has
/// one.
pub fn reveal_command(path: &Path) -> Option<Command> {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("explorer.exe");
        cmd.arg(format!("/select,{}", path.display()));
        Some(cmd)
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg("-R").arg(path);
        Some(cmd)
    } else {
        None
    }
}
