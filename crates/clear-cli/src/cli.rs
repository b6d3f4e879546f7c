//! Argument definitions for `clearc`.

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

/// Source path (positional). `clearc foo` reads `foo.clr` and writes
/// `foo.clr.b`; a path already ending in `.clr` is accepted as-is.
fn path_arg() -> Arg {
    Arg::new("path")
        .value_name("PATH")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Source file to compile (the .clr suffix may be omitted)")
}

/// Phase traces (--debug).
fn debug_arg() -> Arg {
    Arg::new("debug")
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Emit phase traces and a disassembly to standard output")
}

/// Color output control (--color).
fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("WHEN")
        .default_value("auto")
        .value_parser(["auto", "always", "never"])
        .help("Colorize diagnostics")
}

pub fn build_cli() -> Command {
    Command::new("clearc")
        .about("Compiler for the Clear language")
        .arg(path_arg())
        .arg(debug_arg())
        .arg(color_arg())
}

#[derive(Debug, Clone)]
pub struct CompileParams {
    pub path: PathBuf,
    pub debug: bool,
    pub color: ColorChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn from_flag(value: &str) -> Self {
        match value {
            "always" => Self::Always,
            "never" => Self::Never,
            _ => Self::Auto,
        }
    }

    /// Whether to color a stream that may or may not be a terminal.
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => is_terminal,
        }
    }
}

impl CompileParams {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            path: matches
                .get_one::<PathBuf>("path")
                .expect("path is required")
                .clone(),
            debug: matches.get_flag("debug"),
            color: ColorChoice::from_flag(
                matches
                    .get_one::<String>("color")
                    .map(String::as_str)
                    .unwrap_or("auto"),
            ),
        }
    }
}
