//! Windows filesystem operations

use crate::platform::traits::FilesystemOps;
use std::env;
use std::path::{Path, PathBuf};

/// Used when `PATHEXT` is unset
const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

pub struct WindowsFilesystem;

impl WindowsFilesystem {
    pub fn new() -> Self {
        Self
    }

    /// Extensions tried when a command is given without one, empty first
    fn extensions() -> Vec<String> {
        let pathext = env::var("PATHEXT").unwrap_or_else(|_| DEFAULT_PATHEXT.to_string());
        std::iter::once(String::new())
            .chain(
                pathext
                    .split(';')
                    .filter(|ext| !ext.is_empty())
                    .map(str::to_lowercase),
            )
            .collect()
    }

    fn with_extensions(base: &str) -> impl Iterator<Item = PathBuf> + '_ {
        Self::extensions()
            .into_iter()
            .map(move |ext| PathBuf::from(format!("{}{}", base, ext)))
    }
}

impl FilesystemOps for WindowsFilesystem {
    fn is_executable(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = format!(".{}", ext.to_lowercase());
        ext == ".ps1" || Self::extensions().contains(&ext)
    }

    fn find_command(&self, command: &str) -> Option<PathBuf> {
        if command.contains('\\') || command.contains('/') {
            return Self::with_extensions(command).find(|candidate| self.is_executable(candidate));
        }

        let path_env = env::var_os("PATH")?;
        env::split_paths(&path_env).find_map(|dir| {
            let base = dir.join(command);
            let base = base.to_string_lossy().into_owned();
            Self::with_extensions(&base).find(|candidate| self.is_executable(candidate))
        })
    }
}
