use crate::error::AppResult;
use crate::websocket::WsBroadcaster;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// A terminal-like process host: takes one composed command line, runs it in
/// the workspace root, and never reports the outcome back to the caller. The
/// external tool's failures are visible only in the relayed output.
pub trait Terminal: Send + Sync {
    fn run(&self, command_line: &str, cwd: &Path, show: bool) -> AppResult<()>;
}

/// Spawns a fresh shell per command and relays raw output to the panel.
pub struct TerminalRunner {
    ws: Arc<WsBroadcaster>,
}

impl TerminalRunner {
    pub fn new(ws: Arc<WsBroadcaster>) -> Self {
        Self { ws }
    }

    #[cfg(not(windows))]
    fn shell_command(command_line: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }

    #[cfg(windows)]
    fn shell_command(command_line: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    }
}

impl Terminal for TerminalRunner {
    fn run(&self, command_line: &str, cwd: &Path, show: bool) -> AppResult<()> {
        let mut child = Self::shell_command(command_line)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        tracing::info!("Running `{}` in {}", command_line, cwd.display());

        if show {
            self.ws.show_terminal();
        }
        self.ws.terminal_output(format!("$ {command_line}\r\n"));

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_output(stdout, Arc::clone(&self.ws)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_output(stderr, Arc::clone(&self.ws)));
        }

        // Fire and forget: the exit status is logged, never interpreted.
        let line = command_line.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!("`{}` exited with {}", line, status),
                Err(e) => tracing::error!("Failed waiting on `{}`: {}", line, e),
            }
        });

        Ok(())
    }
}

async fn pump_output<R>(mut reader: R, ws: Arc<WsBroadcaster>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; 8192];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                ws.terminal_output(String::from_utf8_lossy(&buffer[..n]).into_owned());
            }
            Err(e) => {
                tracing::error!("Terminal read error: {}", e);
                break;
            }
        }
    }
}
