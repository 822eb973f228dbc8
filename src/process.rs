use crate::error::{Result, SupervisorError};
use crate::pidfile::LOG_FILE_MODE;
use crate::script::LogTarget;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{setsid, Pid};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// Everything needed to spawn a supervised script.
///
/// `args` holds plain copies of the script arguments and is not zeroized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub log: LogTarget,
}

/// Answers whether a PID is currently alive
pub trait ProcessProbe {
    fn is_running(&self, pid: Pid) -> bool;
}

/// Spawns a detached child and reports its PID without waiting for it
pub trait ProcessLauncher {
    fn launch(&self, request: &LaunchRequest) -> io::Result<Pid>;
}

/// Signals a process to go away, without waiting for it to do so
pub trait ProcessTerminator {
    /// Polite request (SIGTERM)
    fn terminate(&self, pid: Pid) -> Result<()>;

    /// Uncatchable kill (SIGKILL)
    fn force_kill(&self, pid: Pid) -> Result<()>;
}

/// Probe, launcher and terminator backed by the host OS
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProcessControl;

impl NativeProcessControl {
    pub fn new() -> Self {
        Self
    }
}

/// `waitpid(WNOHANG)` runs on whatever PID is asked about. If that PID was
/// recycled for an unrelated child of the calling program, that child gets
/// reaped here and its exit status is lost to its owner.
impl ProcessProbe for NativeProcessControl {
    fn is_running(&self, pid: Pid) -> bool {
        if pid.as_raw() <= 0 {
            return false;
        }

        // A child of ours that already exited stays in the process table as a
        // zombie until reaped, so reap it first.
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return true,
            Ok(WaitStatus::Exited(_, code)) => {
                debug!(%pid, code, "reaped exited child");
                return false;
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                debug!(%pid, ?signal, "reaped signalled child");
                return false;
            }
            Ok(_) => return true,
            Err(Errno::ECHILD) => {}
            Err(e) => debug!(%pid, error = %e, "waitpid failed, falling back to kill(0)"),
        }

        match kill(pid, None::<Signal>) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

impl ProcessLauncher for NativeProcessControl {
    fn launch(&self, request: &LaunchRequest) -> io::Result<Pid> {
        let (stdout, stderr) = open_log_sink(&request.log)?;

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        // Detach from our session so the script outlives the supervisor
        unsafe {
            command.pre_exec(|| setsid().map(|_| ()).map_err(io::Error::from));
        }

        let child = command.spawn()?;
        let raw = libc::pid_t::try_from(child.id()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("PID {} out of range", child.id()),
            )
        })?;

        Ok(Pid::from_raw(raw))
    }
}

impl ProcessTerminator for NativeProcessControl {
    fn terminate(&self, pid: Pid) -> Result<()> {
        send_signal(pid, Signal::SIGTERM)
    }

    fn force_kill(&self, pid: Pid) -> Result<()> {
        send_signal(pid, Signal::SIGKILL)
    }
}

fn send_signal(pid: Pid, signal: Signal) -> Result<()> {
    match kill(pid, signal) {
        Ok(()) => Ok(()),
        // Already gone
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SupervisorError::SystemError(e)),
    }
}

fn open_log_sink(log: &LogTarget) -> io::Result<(Stdio, Stdio)> {
    match log {
        LogTarget::Null => Ok((Stdio::null(), Stdio::null())),
        LogTarget::File(path) => {
            let stdout = OpenOptions::new()
                .create(true)
                .append(true)
                .mode(LOG_FILE_MODE)
                .open(path)?;
            let stderr = stdout.try_clone()?;
            Ok((Stdio::from(stdout), Stdio::from(stderr)))
        }
    }
}
