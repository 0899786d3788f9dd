// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

pub mod backend;
pub mod cli;
pub mod env;
pub mod parser;
pub mod plan;
pub mod recipe;
pub mod resolve;
pub mod schedule;
pub mod submit;
pub mod target;

pub use env::Env;
pub use plan::Plan;
pub use recipe::Recipe;
pub use target::Target;
