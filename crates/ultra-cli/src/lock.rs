//! One build per output directory.
//!
//! `Clean` deletes the output directory unconditionally, so the CLI holds
//! `<output>.lock` for the duration of a build. The lock file is created
//! atomically, holds the owner's pid and is removed when the guard drops.
//! A lock whose owner is no longer running is taken over.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ultra_build::options::lock_path;

use crate::error::{CliError, Result};

/// Guard for an output directory; dropping it releases the lock.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Take the lock for `output`, failing with [`CliError::Locked`] if
    /// another running build holds it.
    pub fn acquire(output: &Path) -> Result<Self> {
        let path = lock_path(output);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if let Some(lock) = Self::try_create(&path)? {
            return Ok(lock);
        }

        let pid = read_pid(&path);
        if let Some(owner) = pid {
            if !process_alive(owner) {
                tracing::warn!(path = %path.display(), pid = owner, "removing stale build lock");
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                if let Some(lock) = Self::try_create(&path)? {
                    return Ok(lock);
                }
            }
        }

        Err(CliError::Locked {
            pid: read_pid(&path).or(pid),
            path,
        })
    }

    /// `None` if the lock file already exists.
    fn try_create(path: &Path) -> Result<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                tracing::debug!(path = %path.display(), "acquired build lock");
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release build lock");
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return true;
    };
    // Signal 0 only checks that the process exists.
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join(".ultra");

        let lock = BuildLock::acquire(&output).unwrap();
        assert_eq!(lock.path(), temp.path().join(".ultra.lock"));
        assert!(lock.path().is_file());

        let err = BuildLock::acquire(&output).unwrap_err();
        match err {
            CliError::Locked { pid, .. } => assert_eq!(pid, Some(std::process::id())),
            other => panic!("unexpected error: {other:?}"),
        }

        drop(lock);
        assert!(!temp.path().join(".ultra.lock").exists());
        BuildLock::acquire(&output).unwrap();
    }

    #[test]
    fn test_unreadable_lock_is_kept() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join(".ultra");
        std::fs::write(temp.path().join(".ultra.lock"), "not a pid").unwrap();

        let err = BuildLock::acquire(&output).unwrap_err();
        assert!(matches!(err, CliError::Locked { pid: None, .. }));
        assert!(temp.path().join(".ultra.lock").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_of_exited_process_is_taken_over() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join(".ultra");

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead = child.id();
        child.wait().unwrap();
        std::fs::write(temp.path().join(".ultra.lock"), format!("{dead}\n")).unwrap();

        let lock = BuildLock::acquire(&output).unwrap();
        assert_eq!(read_pid(lock.path()), Some(std::process::id()));
    }
}
