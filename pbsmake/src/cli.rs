// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Command-line surface: argument parsing and top-level dispatch,
//! grounded on `boulder::cli`'s `Command`/`Global`/`process()` shape.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{
    generate_to,
    shells::{Bash, Fish, Zsh},
};
use clap_mangen::Man;
use fs_err::File;
use thiserror::Error;

use crate::backend::{Batch, Graph, Local};
use crate::env::Env;
use crate::{parser, resolve, schedule, submit};

/// Logical attribute names the submission driver recognises, with their
/// meaning.
const KNOWN_ATTRS_TABLE: &[(&str, &str)] = &[
    ("N", "job name"),
    ("v", "variable list"),
    ("depend", "inter-job dependency clause"),
    ("S", "interpreter shell path"),
    ("l", "resource list (comma-separated res=val entries)"),
    (
        "queue",
        "destination queue (consumed by the driver, not forwarded as an attribute)",
    ),
];

#[derive(Debug, Parser)]
#[command(name = "pbsmake", about = "Submit make-style recipes to a batch scheduler")]
pub struct Command {
    /// Build targets; the recipe's default target is used if none are given.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    #[arg(short = 'f', long = "makefile", default_value = "Makefile")]
    pub makefile: PathBuf,

    /// Run the recipe locally instead of submitting to the batch scheduler.
    #[arg(short, long, conflicts_with = "dot")]
    pub local: bool,

    /// Print the resolved dependency graph as Graphviz `dot` source instead
    /// of submitting anything.
    #[arg(short, long, conflicts_with = "local")]
    pub dot: bool,

    /// Print the table of supported attribute names and exit.
    #[arg(long)]
    pub attrs: bool,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, hide = true)]
    pub generate_manpages: Option<PathBuf>,

    #[arg(long, hide = true)]
    pub generate_completions: Option<PathBuf>,
}

pub fn process() -> Result<(), Error> {
    let command = Command::parse();

    if let Some(dir) = &command.generate_manpages {
        std::fs::create_dir_all(dir)?;
        let man = Man::new(Command::command());
        let mut buffer = File::create(dir.join("pbsmake.1"))?;
        man.render(&mut buffer)?;
        return Ok(());
    }

    if let Some(dir) = &command.generate_completions {
        std::fs::create_dir_all(dir)?;
        let mut cmd = Command::command();
        generate_to(Bash, &mut cmd, "pbsmake", dir)?;
        generate_to(Fish, &mut cmd, "pbsmake", dir)?;
        generate_to(Zsh, &mut cmd, "pbsmake", dir)?;
        return Ok(());
    }

    if command.attrs {
        for (name, meaning) in KNOWN_ATTRS_TABLE {
            println!("{name:<8} {meaning}");
        }
        return Ok(());
    }

    let source = fs_err::read_to_string(&command.makefile).map_err(Error::ReadMakefile)?;
    let cwd = std::env::current_dir()?;
    let recipe = parser::parse(&source, Env::from_process())?;

    let requested = if command.targets.is_empty() {
        vec![recipe.default.clone().ok_or(Error::NoDefaultTarget)?]
    } else {
        command.targets.clone()
    };

    if command.verbose {
        println!("makefile: {}", command.makefile.display());
        println!("targets: {}", requested.join(", "));
    }

    let mut plan = resolve::build(&recipe, &requested, &cwd)?;
    let order = schedule::order(&plan, &requested)?;

    if command.dot {
        let mut backend = Graph::new();
        submit::run(&mut plan, &order, &mut backend, None)?;
        print!("{}", backend.render());
    } else if command.local {
        let mut backend = Local::new();
        submit::run(&mut plan, &order, &mut backend, None)?;
    } else {
        let mut backend = Batch::new();
        submit::run(&mut plan, &order, &mut backend, None)?;
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("read makefile")]
    ReadMakefile(#[source] std::io::Error),
    #[error("no build targets requested and the recipe defines no default target")]
    NoDefaultTarget,
    #[error("parser")]
    Parser(#[from] parser::Error),
    #[error("resolve")]
    Resolve(#[from] resolve::Error),
    #[error("schedule")]
    Schedule(#[from] schedule::Error),
    #[error("submit")]
    Submit(#[from] submit::Error),
    #[error("io")]
    Io(#[from] std::io::Error),
}
