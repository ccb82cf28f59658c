//! Hands resolved targets to an external viewer or browser.
//!
//! The viewer is spawned as a detached child process and never awaited.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::info;

use crate::library::Target;

/// Something that can show a file or URL to the user
pub trait Opener {
    /// Launch a viewer for `target`; returns once the viewer was started
    fn open(&self, target: &Target) -> Result<()>;
}

/// Opener backed by the platform's default handler (or a configured program)
#[derive(Debug, Clone, Default)]
pub struct SystemOpener {
    /// Program used instead of the platform default
    program: Option<String>,
}

impl SystemOpener {
    /// Use the platform default handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific program, e.g. a PDF viewer
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    /// Program and arguments used to open `target`
    pub fn command_for(&self, target: &Target) -> (String, Vec<String>) {
        let arg = target.to_string();

        if let Some(program) = &self.program {
            return (program.clone(), vec![arg]);
        }

        if cfg!(target_os = "windows") {
            (
                "cmd".to_string(),
                vec!["/C".to_string(), "start".to_string(), String::new(), arg],
            )
        } else if cfg!(target_os = "macos") {
            ("open".to_string(), vec![arg])
        } else {
            ("xdg-open".to_string(), vec![arg])
        }
    }
}

impl Opener for SystemOpener {
    fn open(&self, target: &Target) -> Result<()> {
        let (program, args) = self.command_for(target);

        Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch '{}' for {}", program, target))?;

        info!(%target, program = %program, "Opened");
        Ok(())
    }
}
