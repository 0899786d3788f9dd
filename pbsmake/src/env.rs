// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Two-level variable store with lexical interpolation and shell-capture
//! expansion.

use std::process::Command;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// The reserved interpolation token whose expansion is deferred until a
/// pattern target's wildcard capture is known.
pub const TARGET_MATCH: &str = "pm_target_match";

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());
static CAPTURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\(([^()]*)\)").unwrap());

/// A local overlay over an inherited parent map.
///
/// Lookup prefers `local`, falling back to `parent`; mutation always writes
/// to `local`. `deep_copy` produces an independent overlay so per-target
/// environments can diverge without leaking back into the recipe-level one.
#[derive(Debug, Clone, Default)]
pub struct Env {
    local: IndexMap<String, String>,
    parent: IndexMap<String, String>,
}

impl Env {
    /// Construct an `Env` whose parent is the current process environment.
    pub fn from_process() -> Self {
        Self {
            local: IndexMap::new(),
            parent: std::env::vars().collect(),
        }
    }

    pub fn with_parent(parent: IndexMap<String, String>) -> Self {
        Self {
            local: IndexMap::new(),
            parent,
        }
    }

    /// Look up `key`, preferring a non-empty local value, falling back to
    /// the parent overlay.
    pub fn get(&self, key: &str) -> Result<&str, Error> {
        match self.local.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => self.parent.get(key).map(String::as_str).ok_or_else(|| Error::UndefinedVariable(key.to_string())),
        }
    }

    /// Like [`Env::get`] but treats an undefined variable as empty, which is
    /// what `NAME += VALUE` needs when `NAME` has never been set.
    pub fn get_or_default(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// True if `key` is present (and possibly empty) in the local overlay.
    pub fn has_local(&self, key: &str) -> bool {
        self.local.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.local.insert(key.into(), value.into());
    }

    /// Write to `local` only if `key` is not already present there.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.local.contains_key(&key) {
            self.local.insert(key, value.into());
        }
    }

    /// Flatten `parent` then `local` (local wins) for export to a child
    /// process, preserving insertion order.
    pub fn as_flat_map(&self) -> IndexMap<String, String> {
        let mut flat = self.parent.clone();
        for (key, value) in &self.local {
            flat.insert(key.clone(), value.clone());
        }
        flat
    }

    /// Deep-copy this overlay into an independent one.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Expand every `${NAME}` token in `string`, left to right, resuming the
    /// scan immediately after the tail of each replacement (never rescanning
    /// the text just inserted). A `\` immediately before `${` suppresses
    /// expansion of that occurrence (the backslash is dropped, the token is
    /// left intact). When `defer_target_match` is set, occurrences of
    /// `${pm_target_match}` are left untouched entirely (backslash and all).
    pub fn interp(&self, string: &str, defer_target_match: bool) -> Result<String, Error> {
        let mut out = String::with_capacity(string.len());
        let mut rest = string;

        loop {
            let Some(found) = TOKEN.find(rest) else {
                out.push_str(rest);
                break;
            };

            let name = TOKEN.captures(rest).unwrap().get(1).unwrap().as_str().to_string();
            let escaped = found.start() > 0 && rest.as_bytes()[found.start() - 1] == b'\\';

            if escaped {
                out.push_str(&rest[..found.start() - 1]);
                out.push_str(found.as_str());
            } else if defer_target_match && name == TARGET_MATCH {
                out.push_str(&rest[..found.end()]);
            } else {
                out.push_str(&rest[..found.start()]);
                out.push_str(self.get(&name)?);
            }

            rest = &rest[found.end()..];
        }

        Ok(out)
    }

    /// Run every `$(cmd args…)` span through the host shell, replacing the
    /// span with its trailing-newline-stripped stdout. Non-empty stderr is
    /// fatal.
    pub fn shell_capture(&self, string: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(string.len());
        let mut rest = string;

        while let Some(found) = CAPTURE.find(rest) {
            out.push_str(&rest[..found.start()]);

            let cmd = CAPTURE.captures(rest).unwrap().get(1).unwrap().as_str().to_string();
            let output = Command::new("sh")
                .arg("-c")
                .arg(&cmd)
                .envs(self.as_flat_map())
                .output()
                .map_err(|source| Error::ShellCaptureSpawn(cmd.clone(), source))?;

            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() || !output.status.success() {
                return Err(Error::ShellCaptureFailure(cmd, stderr.trim().to_string()));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            out.push_str(stdout.trim_end_matches('\n'));

            rest = &rest[found.end()..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("spawn shell capture `{0}`")]
    ShellCaptureSpawn(String, #[source] std::io::Error),
    #[error("shell capture `{0}` failed: {1}")]
    ShellCaptureFailure(String, String),
}
