//! Pluggable per-message post-processing.
//!
//! The configured conversion program (e.g. an eml-to-pdf tool) is modeled as
//! a post-processing step invoked once per archived message. It is not part
//! of the core pipeline: a post-processing failure is reported by the caller
//! but does not fail the message.

use std::path::Path;
use std::process::Command;

use crate::error::{Result, StashError};

/// A step run once per archived `.eml` file.
pub trait PostProcessor {
    /// Process the archived file at `eml_path`.
    fn run(&self, eml_path: &Path) -> Result<()>;
}

/// Post-processor that invokes an external program with the archived file
/// path as its single argument and requires a zero exit status.
pub struct CommandPostProcessor {
    program: std::path::PathBuf,
}

impl CommandPostProcessor {
    pub fn new(program: impl Into<std::path::PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PostProcessor for CommandPostProcessor {
    fn run(&self, eml_path: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .arg(eml_path)
            .status()
            .map_err(|e| StashError::io(&self.program, e))?;

        if !status.success() {
            return Err(StashError::io(
                eml_path,
                std::io::Error::other(format!(
                    "'{}' exited with {status}",
                    self.program.display()
                )),
            ));
        }
        Ok(())
    }
}
