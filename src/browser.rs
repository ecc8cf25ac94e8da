use std::path::Path;

use tokio::process::Command;

/// Build the command that opens `path` in the platform's default viewer.
fn opener(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        // the empty string is the window title `start` expects first
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else {
        let program = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        let mut cmd = Command::new(program);
        cmd.arg(path);
        cmd
    }
}

/// Open a file in the default viewer, logging instead of failing.
pub async fn open_in_browser(path: &Path) -> bool {
    match opener(path).status().await {
        Ok(status) if status.success() => {
            tracing::info!("Opened {} in the default viewer", path.display());
            true
        }
        Ok(status) => {
            tracing::warn!("Viewer exited with {status} for {}", path.display());
            false
        }
        Err(e) => {
            tracing::warn!("Could not launch a viewer for {}: {e}", path.display());
            false
        }
    }
}
