use anyhow::{Context, Result};
use std::process::Stdio;
use tracing::{info, warn};

/// External media player launched with a signed media URL.
#[derive(Debug, Clone)]
pub struct Player {
    program: String,
    auto_exit: bool,
}

impl Player {
    pub fn new(program: impl Into<String>, auto_exit: bool) -> Self {
        Self {
            program: program.into(),
            auto_exit,
        }
    }

    pub fn args(&self, url: &str) -> Vec<String> {
        let mut args = Vec::new();
        if self.auto_exit {
            args.push("--play-and-exit".to_string());
        }
        args.push(url.to_string());
        args
    }

    /// With auto-exit the player is waited on; otherwise it is left running
    /// detached from the menu.
    pub async fn play(&self, url: &str) -> Result<()> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if self.auto_exit {
            info!("Playing with {} until it exits", self.program);
            let status = cmd
                .status()
                .await
                .with_context(|| format!("failed to launch {}", self.program))?;
            if !status.success() {
                warn!("{} exited with {}", self.program, status);
            }
        } else {
            info!("Launching {} in the background", self.program);
            cmd.kill_on_drop(false);
            // Own process group, so closing the terminal does not take it down.
            #[cfg(unix)]
            cmd.process_group(0);
            let child = cmd
                .spawn()
                .with_context(|| format!("failed to launch {}", self.program))?;
            drop(child);
        }

        Ok(())
    }
}
