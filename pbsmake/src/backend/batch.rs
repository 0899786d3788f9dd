// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Batch-scheduler backend: shells out to the cluster's `qsub`-family
//! submission CLI rather than linking the scheduler's own client library,
//! the closest idiomatic stand-in for "the abstract submission interface".

use std::path::Path;
use std::process::Command;

use indexmap::IndexMap;
use thiserror::Error;

use super::Backend;

/// Maps a logical attribute name to the flag the submission CLI expects it
/// under. `depend` and the split `l:<resource>` sub-attributes are handled
/// separately; `v` (variable list) is forwarded as `-v`.
fn flag_for(key: &str) -> Option<&'static str> {
    match key {
        "N" => Some("-N"),
        "S" => Some("-S"),
        "v" => Some("-v"),
        _ => None,
    }
}

/// Submits task files to a `qsub`-compatible CLI (default: `qsub` on `PATH`).
pub struct Batch {
    command: String,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            command: "qsub".to_string(),
        }
    }

    /// Override the submission command, for testing against a stub script.
    pub fn with_command(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Batch {
    fn submit(
        &mut self,
        _name: &str,
        task_file: &Path,
        attrs: &IndexMap<String, String>,
        queue: Option<&str>,
        _lastid: Option<&str>,
    ) -> Result<String, super::Error> {
        let mut command = Command::new(&self.command);

        for (key, value) in attrs {
            if key == "depend" {
                command.arg("-W").arg(format!("depend={value}"));
            } else if let Some(resource) = key.strip_prefix("l:") {
                command.arg("-l").arg(format!("{resource}={value}"));
            } else if let Some(flag) = flag_for(key) {
                command.arg(flag).arg(value);
            }
        }

        if let Some(queue) = queue {
            command.arg("-q").arg(queue);
        }

        command.arg(task_file);

        let output = command
            .output()
            .map_err(|source| Error::Spawn(self.command.clone(), source))?;

        if !output.status.success() {
            return Err(Error::Rejected {
                attrs: attrs.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn `{0}`")]
    Spawn(String, #[source] std::io::Error),
    #[error("submission rejected: {stderr} (attrs: {attrs:?})")]
    Rejected {
        attrs: IndexMap<String, String>,
        stderr: String,
    },
}
