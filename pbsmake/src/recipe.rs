// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The parsed, immutable recipe. Kept as a distinct type from the resolved
//! plan, so parsing a recipe once and resolving it against several different
//! requested target sets never mutates the shared parsed state.

use indexmap::IndexMap;

use crate::env::Env;
use crate::target::Target;

#[derive(Debug, Clone)]
pub struct Recipe {
    /// Insertion-ordered, keyed by [`Target::canonical_name`].
    pub targets: IndexMap<String, Target>,
    /// The first non-pattern target ever added; stable across further
    /// additions (invariant 2).
    pub default: Option<String>,
    pub env: Env,
}

impl Recipe {
    pub fn new(env: Env) -> Self {
        Self {
            targets: IndexMap::new(),
            default: None,
            env,
        }
    }

    /// Insert or replace a target, recording it as `default` if it's the
    /// first non-pattern target ever seen.
    pub fn insert(&mut self, target: Target) {
        if self.default.is_none() && !target.is_pattern() {
            self.default = Some(target.canonical_name.clone());
        }
        self.targets.insert(target.canonical_name.clone(), target);
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Target> {
        self.targets.get_mut(name)
    }

    /// All targets whose name contains exactly one `%` wildcard, in
    /// insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &Target> {
        self.targets.values().filter(|t| t.is_pattern())
    }
}
