// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The submission interface: a narrow trait standing in for the batch
//! scheduler's own connection handle and attribute-building primitives,
//! which are explicitly out of scope.

pub mod batch;
pub mod graph;
pub mod local;

use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;

pub use batch::Batch;
pub use graph::Graph;
pub use local::Local;

/// One job submission. `attrs` has already had defaults populated,
/// dependencies threaded, and values interpolated through the target's env
/// by [`crate::submit`]; `queue` is the destination queue if one was given,
/// and `lastid` is set only by the post-schedule sweep.
pub trait Backend {
    fn submit(
        &mut self,
        name: &str,
        task_file: &Path,
        attrs: &IndexMap<String, String>,
        queue: Option<&str>,
        lastid: Option<&str>,
    ) -> Result<String, Error>;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("batch submission")]
    Batch(#[from] batch::Error),
    #[error("local execution")]
    Local(#[from] local::Error),
}
