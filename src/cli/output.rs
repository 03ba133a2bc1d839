use colored::Colorize;
use serde::Serialize;

use crate::error::OpaiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Plain,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Plain
        }
    }
}

/// Print a command result: the whole value as JSON, or just `plain`.
pub fn print_result<T: Serialize>(value: &T, plain: &str, mode: OutputMode) {
    match mode {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
        OutputMode::Plain => println!("{plain}"),
    }
}

pub fn format_error(err: &OpaiError, is_tty: bool) -> String {
    let label = if is_tty {
        "Error".red().bold().to_string()
    } else {
        "Error".to_string()
    };
    format!("{label}: {err}")
}

pub fn print_error(err: &OpaiError, mode: OutputMode, is_tty: bool) {
    match mode {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(&err.to_json()).unwrap_or_default());
        }
        OutputMode::Plain => eprintln!("{}", format_error(err, is_tty)),
    }
}
