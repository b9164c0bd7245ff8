//! Shell Type Definitions
//!
//! Shell families recognised from an executable name, and the invocation
//! flags each family needs to come up as an interactive terminal shell.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Type of shell being used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShellType {
    /// Bourne Again Shell
    Bash,
    /// Z Shell
    Zsh,
    /// Fish Shell
    Fish,
    /// Korn Shell
    Ksh,
    /// C Shell
    Csh,
    /// Tcsh
    Tcsh,
    /// Dash
    Dash,
    /// POSIX sh
    Sh,
    /// PowerShell (Windows PowerShell or pwsh)
    PowerShell,
    /// Command Prompt
    Cmd,
    /// Other/Unknown shell
    #[default]
    Other,
}

impl ShellType {
    /// Get a string representation of the shell type
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellType::Bash => "bash",
            ShellType::Zsh => "zsh",
            ShellType::Fish => "fish",
            ShellType::Ksh => "ksh",
            ShellType::Csh => "csh",
            ShellType::Tcsh => "tcsh",
            ShellType::Dash => "dash",
            ShellType::Sh => "sh",
            ShellType::PowerShell => "powershell",
            ShellType::Cmd => "cmd",
            ShellType::Other => "other",
        }
    }

    /// Get shell type from string (case-insensitive)
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bash" => ShellType::Bash,
            "zsh" => ShellType::Zsh,
            "fish" => ShellType::Fish,
            "ksh" | "mksh" => ShellType::Ksh,
            "csh" => ShellType::Csh,
            "tcsh" => ShellType::Tcsh,
            "dash" => ShellType::Dash,
            "sh" => ShellType::Sh,
            "powershell" | "pwsh" => ShellType::PowerShell,
            "cmd" => ShellType::Cmd,
            _ => ShellType::Other,
        }
    }

    /// Guess the shell family from an executable path such as
    /// `/usr/bin/zsh` or `C:\Windows\System32\cmd.exe`.
    pub fn detect(executable: &Path) -> Self {
        // Windows paths are not split by `Path` on Unix hosts
        let raw = executable.to_string_lossy();
        let file_name = raw.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
        let stem = file_name
            .strip_suffix(".exe")
            .or_else(|| file_name.strip_suffix(".EXE"))
            .unwrap_or(file_name);
        Self::from_string(stem)
    }

    /// Flags that make the shell interactive when it runs on a pty.
    ///
    /// `login` asks shells that distinguish login sessions to read their
    /// profile files as well.
    pub fn interactive_args(&self, login: bool) -> Vec<String> {
        let flags: &[&str] = match self {
            ShellType::Bash | ShellType::Zsh if login => &["-l", "-i"],
            ShellType::Bash | ShellType::Zsh => &["-i"],
            ShellType::Fish if login => &["-l", "-i"],
            ShellType::Fish | ShellType::Ksh | ShellType::Dash | ShellType::Sh => &["-i"],
            ShellType::Csh | ShellType::Tcsh => &["-i"],
            ShellType::PowerShell => &["-NoLogo"],
            ShellType::Cmd | ShellType::Other => &[],
        };
        flags.iter().map(|f| f.to_string()).collect()
    }
}
