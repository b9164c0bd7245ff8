//! Unix shell operations

use crate::platform::traits::ShellOps;
use std::env;
use std::path::PathBuf;

pub struct UnixShell;

impl UnixShell {
    pub fn new() -> Self {
        Self
    }
}

impl ShellOps for UnixShell {
    fn default_shell(&self) -> PathBuf {
        match env::var("SHELL") {
            Ok(shell) if !shell.trim().is_empty() => PathBuf::from(shell),
            _ => PathBuf::from("/bin/bash"),
        }
    }

    fn terminal_env(&self) -> Vec<(&'static str, &'static str)> {
        vec![("TERM", "xterm-256color"), ("COLORTERM", "truecolor")]
    }
}
