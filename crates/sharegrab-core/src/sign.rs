//! Request signing capability.
//!
//! Some platforms require a signature computed by their own obfuscated
//! JavaScript. The core never runs that code: it asks a `Signer`, which in
//! production is an external command the user configures.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

pub trait Signer: Send + Sync {
    /// Returns the signature for `input` (usually a query string).
    fn sign(&self, input: &str) -> Result<String>;
}

impl<F> Signer for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn sign(&self, input: &str) -> Result<String> {
        self(input)
    }
}

/// Runs `program args...`, writes the input to its stdin and reads the
/// signature from stdout.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Signer for CommandSigner {
    fn sign(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start signer {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .context("failed to write signer input")?;
        }
        let output = child
            .wait_with_output()
            .context("failed to wait for signer")?;

        if !output.status.success() {
            bail!(
                "signer {} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let signature = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if signature.is_empty() {
            bail!("signer {} produced no output", self.program);
        }
        tracing::debug!(program = %self.program, len = signature.len(), "signature computed");
        Ok(signature)
    }
}
