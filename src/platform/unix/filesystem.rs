//! Unix filesystem operations

use crate::platform::traits::FilesystemOps;
use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub struct UnixFilesystem;

impl UnixFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl FilesystemOps for UnixFilesystem {
    fn is_executable(&self, path: &Path) -> bool {
        if let Ok(metadata) = path.metadata() {
            if metadata.is_file() {
                // Check if file has executable permissions
                let permissions = metadata.permissions();
                return (permissions.mode() & 0o111) != 0;
            }
        }
        false
    }

    fn find_command(&self, command: &str) -> Option<PathBuf> {
        if command.contains('/') {
            let path = PathBuf::from(command);
            return path.is_file().then_some(path);
        }

        let path_env = env::var_os("PATH")?;
        env::split_paths(&path_env)
            .map(|dir| dir.join(command))
            .find(|candidate| self.is_executable(candidate))
    }
}
