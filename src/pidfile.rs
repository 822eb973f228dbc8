use nix::unistd::Pid;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Permissions of the PID file: owner read/write
pub const PID_FILE_MODE: u32 = 0o600;

/// Permissions of the log file: owner read/write, group read
pub const LOG_FILE_MODE: u32 = 0o644;

/// Create `path` if missing without truncating it, then apply `mode`
pub fn touch(path: &Path, mode: u32) -> io::Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(mode)
        .open(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Sentinel file holding the PID of a supervised script, or nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file empty if it does not exist and restrict it to the owner
    pub fn touch(&self) -> io::Result<()> {
        touch(&self.path, PID_FILE_MODE)
    }

    /// Read the recorded PID
    ///
    /// A missing file, empty content, or anything that is not a positive
    /// integer all mean "no process tracked".
    pub fn read_pid(&self) -> Option<Pid> {
        let content = fs::read_to_string(&self.path).ok()?;
        parse_pid(&content)
    }

    /// Replace the file content with `pid`
    pub fn write_pid(&self, pid: Pid) -> io::Result<()> {
        fs::write(&self.path, pid.as_raw().to_string())
    }

    /// Truncate the file to empty
    pub fn clear(&self) -> io::Result<()> {
        fs::write(&self.path, b"")
    }
}

fn parse_pid(content: &str) -> Option<Pid> {
    match content.trim().parse::<libc::pid_t>() {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}
