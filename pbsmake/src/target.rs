// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The in-memory representation of a single recipe target.

use indexmap::IndexMap;

use crate::env::Env;

pub const DEFAULT_KIND: &str = "afterok";

/// A named unit of work with commands, attributes and declared dependencies.
#[derive(Debug, Clone)]
pub struct Target {
    /// The name this target is keyed by in [`crate::recipe::Recipe::targets`].
    /// Equal to `base_name` when `kind == "afterok"`, otherwise
    /// `"{base_name}::{kind}"` (the default-kind suffix is stripped, per
    /// invariant 1; any other kind stays part of the canonical name).
    pub canonical_name: String,
    /// The name without its `::KIND` qualifier, used by the post-schedule
    /// sweep to find this target's same-named `afterok` sibling.
    pub base_name: String,
    pub kind: String,
    pub components: Vec<String>,
    pub cmds: Vec<String>,
    pub attrs: IndexMap<String, String>,
    pub env: Env,
    pub pm_target_match: Option<String>,
    pub submission_id: Option<String>,
}

impl Target {
    pub fn new(base_name: impl Into<String>, kind: Option<String>) -> Self {
        let base_name = base_name.into();
        let kind = kind.unwrap_or_else(|| DEFAULT_KIND.to_string());
        let canonical_name = if kind == DEFAULT_KIND {
            base_name.clone()
        } else {
            format!("{base_name}::{kind}")
        };

        Self {
            canonical_name,
            base_name,
            kind,
            components: Vec::new(),
            cmds: Vec::new(),
            attrs: IndexMap::new(),
            env: Env::default(),
            pm_target_match: None,
            submission_id: None,
        }
    }

    /// A pattern target's name contains exactly one `%` wildcard.
    pub fn is_pattern(&self) -> bool {
        self.canonical_name.matches('%').count() == 1
    }
}
