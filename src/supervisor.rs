//! PID-file backed lifecycle of a single supervised script.
//!
//! `initialize` creates the PID file (and log file), `start` launches the
//! script detached and records its PID, `is_alive` and `stop` consult the PID
//! file and the live process table on every call. Nothing about liveness is
//! cached between calls.

use crate::config::SupervisorConfig;
use crate::error::{LastError, Result, SupervisorError};
use crate::pidfile::{self, PidFile, LOG_FILE_MODE};
use crate::process::{
    LaunchRequest, NativeProcessControl, ProcessLauncher, ProcessProbe, ProcessTerminator,
};
use crate::script::{LogTarget, SupervisedScript};
use nix::unistd::Pid;
use std::ffi::OsString;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Liveness of the supervised script as seen through its PID file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running(Pid),
    NotRunning,
}

/// Successful result of `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A live process was signalled and is gone
    Stopped(Pid),
    /// Nothing alive was recorded
    AlreadyStopped,
}

/// Starts, polls and stops one script through its PID file
pub struct ProcessSupervisor<C = NativeProcessControl> {
    script: SupervisedScript,
    pid_file: PidFile,
    config: SupervisorConfig,
    control: C,
    initialized: bool,
    last_error: Option<LastError>,
}

impl ProcessSupervisor<NativeProcessControl> {
    /// Supervise `reference` with the host's process table
    pub fn new(
        reference: &str,
        binary: impl Into<PathBuf>,
        config: SupervisorConfig,
    ) -> Result<Self> {
        Self::with_control(reference, binary, config, NativeProcessControl::new())
    }
}

impl<C> ProcessSupervisor<C>
where
    C: ProcessProbe + ProcessLauncher + ProcessTerminator,
{
    /// Supervise `reference` through the given process capabilities
    pub fn with_control(
        reference: &str,
        binary: impl Into<PathBuf>,
        config: SupervisorConfig,
        control: C,
    ) -> Result<Self> {
        let script = SupervisedScript::new(reference, binary, &config)?;
        let pid_file = PidFile::new(script.pid_file());
        Ok(Self {
            script,
            pid_file,
            config,
            control,
            initialized: false,
            last_error: None,
        })
    }

    pub fn script(&self) -> &SupervisedScript {
        &self.script
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The most recent failure, cleared by the next successful operation
    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    /// Create the PID file (0600) and, when logging, the log file (0644)
    ///
    /// Safe to repeat: an already recorded PID is left in place.
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.try_initialize();
        self.record(result)
    }

    /// Launch the script and record its PID
    pub fn start(&mut self) -> Result<Pid> {
        let result = self.try_start();
        self.record(result)
    }

    /// Terminate the recorded process, if any
    pub fn stop(&mut self) -> Result<StopOutcome> {
        let result = self.try_stop();
        self.record(result)
    }

    /// Whether the recorded PID belongs to a live process
    pub fn is_alive(&self) -> bool {
        self.running_pid().is_some()
    }

    pub fn status(&self) -> ProcessStatus {
        match self.running_pid() {
            Some(pid) => ProcessStatus::Running(pid),
            None => ProcessStatus::NotRunning,
        }
    }

    /// PID currently written in the PID file, alive or not
    pub fn recorded_pid(&self) -> Option<Pid> {
        self.pid_file.read_pid()
    }

    fn running_pid(&self) -> Option<Pid> {
        let pid = self.pid_file.read_pid()?;
        let running = self.control.is_running(pid);
        debug!(script = %self.script.script_name(), %pid, running, "probed recorded pid");
        running.then_some(pid)
    }

    fn try_initialize(&mut self) -> Result<()> {
        self.pid_file
            .touch()
            .map_err(|source| SupervisorError::Initialization {
                path: self.pid_file.path().to_path_buf(),
                source,
            })?;

        if let LogTarget::File(log) = self.script.log_target() {
            pidfile::touch(log, LOG_FILE_MODE).map_err(|source| {
                SupervisorError::Initialization {
                    path: log.clone(),
                    source,
                }
            })?;
        }

        self.initialized = true;
        debug!(
            script = %self.script.script_name(),
            pid_file = %self.pid_file.path().display(),
            "initialized"
        );
        Ok(())
    }

    fn try_start(&mut self) -> Result<Pid> {
        self.ensure_initialized()?;

        if let Some(pid) = self.running_pid() {
            return Err(SupervisorError::AlreadyRunning {
                script: self.script.script_name().to_string(),
                pid: pid.as_raw(),
            });
        }

        let request = self.launch_request();
        let pid = self
            .control
            .launch(&request)
            .map_err(|source| SupervisorError::Launch {
                script: self.script.script_name().to_string(),
                source,
            })?;
        debug!(script = %self.script.script_name(), %pid, "spawned");

        if let Err(source) = self.pid_file.write_pid(pid) {
            warn!(%pid, error = %source, "could not save pid, killing orphan");
            self.kill_orphan(pid);
            return Err(SupervisorError::Persist {
                pid: pid.as_raw(),
                source,
            });
        }

        thread::sleep(self.config.grace_interval);

        if !self.control.is_running(pid) {
            warn!(script = %self.script.script_name(), %pid, "died during grace interval");
            self.clear_pid_file();
            return Err(SupervisorError::CrashedAfterStart {
                script: self.script.script_name().to_string(),
                pid: pid.as_raw(),
            });
        }

        info!(script = %self.script.script_name(), %pid, "started");
        Ok(pid)
    }

    fn try_stop(&mut self) -> Result<StopOutcome> {
        self.ensure_initialized()?;

        let Some(pid) = self.pid_file.read_pid() else {
            debug!(script = %self.script.script_name(), "no pid recorded");
            return Ok(StopOutcome::AlreadyStopped);
        };

        if !self.control.is_running(pid) {
            debug!(%pid, "recorded pid is stale, clearing");
            self.clear_pid_file();
            return Ok(StopOutcome::AlreadyStopped);
        }

        self.control.terminate(pid)?;
        if self.config.clear_before_confirm {
            self.clear_pid_file();
        }

        if !self.wait_for_exit(pid) {
            return Err(SupervisorError::Termination { pid: pid.as_raw() });
        }

        self.clear_pid_file();
        info!(script = %self.script.script_name(), %pid, "stopped");
        Ok(StopOutcome::Stopped(pid))
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SupervisorError::NotInitialized(
                self.script.script_name().to_string(),
            ))
        }
    }

    /// `{binary} {script_dir}/{script_name} {arguments...}`
    fn launch_request(&self) -> LaunchRequest {
        let mut args = vec![self.script.script_path().into_os_string()];
        args.extend(self.script.argv().iter().map(OsString::from));
        LaunchRequest {
            program: self.script.binary().to_path_buf(),
            args,
            log: self.script.log_target().clone(),
        }
    }

    /// SIGTERM, then SIGKILL if it is still around after the stop timeout
    fn kill_orphan(&self, pid: Pid) {
        if let Err(e) = self.control.terminate(pid) {
            warn!(%pid, error = %e, "failed to signal orphan");
        }
        if self.wait_for_exit(pid) {
            return;
        }

        warn!(%pid, "orphan survived SIGTERM, sending SIGKILL");
        if let Err(e) = self.control.force_kill(pid) {
            warn!(%pid, error = %e, "failed to kill orphan");
        }
        if !self.wait_for_exit(pid) {
            warn!(%pid, "orphan still alive after SIGKILL");
        }
    }

    /// Re-probe until the process is gone or the stop timeout runs out
    fn wait_for_exit(&self, pid: Pid) -> bool {
        let deadline = Instant::now() + self.config.stop_timeout;
        loop {
            if !self.control.is_running(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn clear_pid_file(&self) {
        if let Err(e) = self.pid_file.clear() {
            warn!(
                pid_file = %self.pid_file.path().display(),
                error = %e,
                "failed to clear pid file"
            );
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                debug!(error = %e, "operation failed");
                self.last_error = Some(LastError::from(e));
            }
        }
        result
    }
}
