//! PowerShell invocation for the SQL Server and Active Directory adapters.

use std::process::Command;

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Default PowerShell executable (Windows PowerShell 5.1).
pub const DEFAULT_EXECUTABLE: &str = "powershell";

/// Runs scripts through a PowerShell executable.
#[derive(Debug, Clone)]
pub struct PowerShell {
    executable: String,
}

impl Default for PowerShell {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

impl PowerShell {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args([
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            script,
        ]);
        cmd
    }

    /// Run a script and return its standard output.
    pub fn run(&self, script: &str) -> anyhow::Result<String> {
        self.run_with_env(script, &[])
    }

    /// Run a script with extra environment variables for the child process.
    ///
    /// Secrets go through here rather than being interpolated into script text.
    pub fn run_with_env(&self, script: &str, env: &[(&str, &str)]) -> anyhow::Result<String> {
        let mut cmd = self.command(script);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute {}", self.executable))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "PowerShell script failed ({}): {}",
                output.status,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("PowerShell output is not valid UTF-8")
    }

    /// Run a script that ends in `ConvertTo-Json` and deserialize its output.
    pub fn run_json<T: DeserializeOwned>(&self, script: &str) -> anyhow::Result<T> {
        let stdout = self.run(script)?;
        parse_json_output(&stdout)
    }
}

/// Parse JSON printed by `ConvertTo-Json`.
pub fn parse_json_output<T: DeserializeOwned>(stdout: &str) -> anyhow::Result<T> {
    // Windows PowerShell may prefix output with a byte-order mark.
    let trimmed = stdout.trim().trim_start_matches('\u{feff}');
    if trimmed.is_empty() {
        anyhow::bail!("PowerShell script produced no output");
    }
    serde_json::from_str(trimmed)
        .with_context(|| format!("Unexpected PowerShell output: {}", trimmed))
}

/// Quote a value as a single-quoted PowerShell string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
