//! The esbuild collaborator: a process-spawning implementation shelling out
//! to a real `esbuild` binary, plus a null implementation for tests and
//! environments where esbuild isn't installed.
//!
//! A fixed, non-attacker-controlled binary invoked via `tokio::process::Command`
//! rather than a shell string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    Ts,
    Tsx,
    Js,
    Jsx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Esm,
    Cjs,
    Iife,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsbuildOptions {
    pub loader: Loader,
    #[serde(default = "default_target")]
    pub target: String,
    pub format: Format,
    #[serde(default)]
    pub jsx: Option<String>,
    #[serde(default)]
    pub sourcemap: bool,
}

fn default_target() -> String {
    "es2022".into()
}

#[derive(Debug, Clone)]
pub struct EsbuildOutput {
    pub code: String,
    pub map: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EsbuildError {
    #[error("esbuild not available")]
    Unavailable,
    #[error("esbuild transport failure: {0}")]
    Transport(String),
    #[error("esbuild reported errors: {0:?}")]
    CompileErrors(Vec<String>),
}

/// The esbuild collaborator, abstracted so tests can avoid a real subprocess.
#[async_trait]
pub trait EsbuildCompiler: Send + Sync {
    async fn compile(&self, source: &str, options: &EsbuildOptions) -> Result<EsbuildOutput, EsbuildError>;
    fn is_available(&self) -> bool;
}

/// Shells out to an `esbuild` binary via stdin/stdout, one process per call.
pub struct CliEsbuildCompiler {
    binary_path: String,
}

impl CliEsbuildCompiler {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self { binary_path: binary_path.into() }
    }
}

#[async_trait]
impl EsbuildCompiler for CliEsbuildCompiler {
    async fn compile(&self, source: &str, options: &EsbuildOptions) -> Result<EsbuildOutput, EsbuildError> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        let loader = match options.loader {
            Loader::Ts => "ts",
            Loader::Tsx => "tsx",
            Loader::Js => "js",
            Loader::Jsx => "jsx",
        };
        let format = match options.format {
            Format::Esm => "esm",
            Format::Cjs => "cjs",
            Format::Iife => "iife",
        };

        let mut args = vec![
            "--loader=".to_string() + loader,
            "--format=".to_string() + format,
            "--target=".to_string() + &options.target,
        ];
        if options.sourcemap {
            args.push("--sourcemap=inline".into());
        }
        if let Some(jsx) = &options.jsx {
            args.push(format!("--jsx={jsx}"));
        }

        debug!(binary = %self.binary_path, ?args, "invoking esbuild");

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EsbuildError::Transport(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .await
                .map_err(|e| EsbuildError::Transport(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EsbuildError::Transport(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            warn!(stderr = %stderr, "esbuild reported errors");
            return Err(EsbuildError::CompileErrors(
                stderr.lines().map(str::to_string).collect(),
            ));
        }

        let code = String::from_utf8_lossy(&output.stdout).to_string();
        let warnings = stderr.lines().map(str::to_string).collect();

        Ok(EsbuildOutput { code, map: None, warnings })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Always unavailable — used in tests and when esbuild isn't installed, so
/// the compile service's routing logic falls back to the regex stripper.
#[derive(Default)]
pub struct NullEsbuildCompiler;

#[async_trait]
impl EsbuildCompiler for NullEsbuildCompiler {
    async fn compile(&self, _source: &str, _options: &EsbuildOptions) -> Result<EsbuildOutput, EsbuildError> {
        Err(EsbuildError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_compiler_is_never_available() {
        let c = NullEsbuildCompiler;
        assert!(!c.is_available());
        let err = c
            .compile(
                "const x = 1;",
                &EsbuildOptions {
                    loader: Loader::Ts,
                    target: default_target(),
                    format: Format::Esm,
                    jsx: None,
                    sourcemap: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EsbuildError::Unavailable));
    }
}
