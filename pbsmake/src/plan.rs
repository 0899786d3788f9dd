// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The resolved, per-build plan, kept separate from the parsed
//! [`crate::recipe::Recipe`] rather than mutating it in place.

use indexmap::IndexMap;

use crate::target::Target;

/// The pruned, closed target set produced by one `resolve::build` call, each
/// target carrying the `env` derived for it.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub targets: IndexMap<String, Target>,
}

impl Plan {
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Target> {
        self.targets.get_mut(name)
    }
}
