// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Local execution backend: runs the task file under a shell on the
//! current host instead of a batch scheduler, mirroring
//! `boulder::build::Builder::build`'s subprocess spawn/log/exit-status
//! handling.

use std::io::{self, BufRead};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{self, Stdio};
use std::thread;

use indexmap::IndexMap;
use nix::sys::signal::Signal;
use thiserror::Error;

use super::Backend;

/// Runs each task file via `/bin/sh` (or the target's `S` attribute),
/// inheriting the flattened per-target environment. Always returns the
/// constant id `"local"`, since there is nothing further to thread.
pub struct Local;

impl Local {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Local {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Local {
    fn submit(
        &mut self,
        name: &str,
        task_file: &Path,
        attrs: &IndexMap<String, String>,
        _queue: Option<&str>,
        _lastid: Option<&str>,
    ) -> Result<String, super::Error> {
        let shell = attrs.get("S").map(String::as_str).unwrap_or("/bin/sh");
        let envs = var_list(attrs);

        let mut child = process::Command::new(shell)
            .arg(task_file)
            .envs(envs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn(name.to_string(), source))?;

        let stdout_log = log(name, child.stdout.take().unwrap());
        let stderr_log = log(name, child.stderr.take().unwrap());

        let status = child.wait().map_err(|source| Error::Spawn(name.to_string(), source))?;

        let _ = stdout_log.join();
        let _ = stderr_log.join();

        if !status.success() {
            let error = match status.code() {
                Some(code) => Error::Code(name.to_string(), code),
                None => match status.signal().and_then(|raw| Signal::try_from(raw).ok()) {
                    Some(signal) => Error::Signal(name.to_string(), signal),
                    None => Error::UnknownSignal(name.to_string()),
                },
            };
            return Err(error.into());
        }

        Ok("local".to_string())
    }
}

/// Parse the `k=v,k=v,…` variable-list attribute back into child-process
/// environment pairs.
fn var_list(attrs: &IndexMap<String, String>) -> Vec<(String, String)> {
    attrs
        .get("v")
        .map(|value| {
            value
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn log<R>(name: &str, pipe: R) -> thread::JoinHandle<()>
where
    R: io::Read + Send + 'static,
{
    let name = name.to_string();
    thread::spawn(move || {
        let mut lines = io::BufReader::new(pipe).lines();
        while let Some(Ok(line)) = lines.next() {
            println!("{name}| {line}");
        }
    })
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn task for {0}")]
    Spawn(String, #[source] io::Error),
    #[error("{0} failed with status code {1}")]
    Code(String, i32),
    #[error("{0} stopped by signal {}", .1.as_str())]
    Signal(String, Signal),
    #[error("{0} stopped by unknown signal")]
    UnknownSignal(String),
}
