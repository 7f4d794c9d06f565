//! The record a capture session produces.

use serde::{Deserialize, Serialize};

/// Exit code and full stdio transcript of one capture session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureResult {
    pub code: i32,
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
}

impl CaptureResult {
    pub fn new(
        code: i32,
        stdin: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            code,
            stdin: stdin.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Render as a JSON object with `code`, `stdin`, `stdout` and `stderr` keys.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
