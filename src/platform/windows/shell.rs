//! Windows shell operations

use crate::platform::traits::ShellOps;
use std::env;
use std::path::PathBuf;

pub struct WindowsShell;

impl WindowsShell {
    pub fn new() -> Self {
        Self
    }
}

impl ShellOps for WindowsShell {
    fn default_shell(&self) -> PathBuf {
        match env::var("COMSPEC") {
            Ok(comspec) if !comspec.trim().is_empty() => PathBuf::from(comspec),
            _ => PathBuf::from("cmd.exe"),
        }
    }

    fn terminal_env(&self) -> Vec<(&'static str, &'static str)> {
        // ConPTY translates xterm sequences for console programs
        vec![("TERM", "xterm-256color"), ("COLORTERM", "truecolor")]
    }
}
