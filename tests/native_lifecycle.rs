//! Drives real `/bin/sh` scripts through the native process control.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use pidkeeper::{
    ErrorKind, LoggingMode, NativeProcessControl, ProcessProbe, ProcessSupervisor, StopOutcome,
    SupervisorConfig, SupervisorError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn config() -> SupervisorConfig {
    SupervisorConfig::default()
        .with_grace_interval(Duration::from_millis(200))
        .with_stop_timeout(Duration::from_secs(5))
}

fn wait_for_content(path: &Path, needle: &str) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if fs::read_to_string(path).map_or(false, |c| c.contains(needle)) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

/// Start with the PID file replaced by a directory so the write fails
fn start_with_unwritable_pid_file(name: &str, body: &str) -> i32 {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), name, body);
    let config = config()
        .with_logging(LoggingMode::Disabled)
        .with_stop_timeout(Duration::from_millis(300));

    let mut supervisor =
        ProcessSupervisor::new(script.to_str().unwrap(), "/bin/sh", config).unwrap();
    supervisor.initialize().unwrap();

    let pid_file = dir.path().join(format!(".{}.pid", name));
    fs::remove_file(&pid_file).unwrap();
    fs::create_dir(&pid_file).unwrap();

    let err = supervisor.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persist);
    match err {
        SupervisorError::Persist { pid, .. } => pid,
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn start_poll_stop_real_process() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "worker.sh", "echo \"up $1 $2\"\nexec sleep 30\n");
    let reference = format!("{} alpha beta", script.display());

    let mut supervisor = ProcessSupervisor::new(&reference, "/bin/sh", config()).unwrap();
    supervisor.initialize().unwrap();
    assert!(!supervisor.is_alive());

    let pid = supervisor.start().unwrap();
    assert!(supervisor.is_alive());

    let pid_file = dir.path().join(".worker.sh.pid");
    assert_eq!(fs::read_to_string(&pid_file).unwrap(), pid.as_raw().to_string());

    let log = dir.path().join("worker.sh.log");
    assert!(wait_for_content(&log, "up alpha beta"));

    assert_eq!(supervisor.stop().unwrap(), StopOutcome::Stopped(pid));
    assert!(!supervisor.is_alive());
    assert_eq!(fs::read_to_string(&pid_file).unwrap(), "");

    assert_eq!(supervisor.stop().unwrap(), StopOutcome::AlreadyStopped);
}

#[test]
fn crash_during_grace_interval_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "broken.sh", "exit 3\n");
    let config = config().with_logging(LoggingMode::Disabled);

    let mut supervisor =
        ProcessSupervisor::new(script.to_str().unwrap(), "/bin/sh", config).unwrap();
    supervisor.initialize().unwrap();

    let err = supervisor.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CrashedAfterStart);
    assert_eq!(
        fs::read_to_string(dir.path().join(".broken.sh.pid")).unwrap(),
        ""
    );
    assert!(!dir.path().join("broken.sh.log").exists());
    assert!(!supervisor.is_alive());
}

#[test]
fn missing_binary_is_a_launch_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "job.sh", "sleep 1\n");

    let mut supervisor = ProcessSupervisor::new(
        script.to_str().unwrap(),
        "/nonexistent/bin/interpreter",
        config(),
    )
    .unwrap();
    supervisor.initialize().unwrap();

    let err = supervisor.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Launch);
    assert_eq!(supervisor.last_error().unwrap().code, ErrorKind::Launch.as_exit_code());
    assert_eq!(fs::read_to_string(dir.path().join(".job.sh.pid")).unwrap(), "");
}

#[test]
fn second_supervisor_sees_running_script() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "shared.sh", "exec sleep 30\n");
    let reference = script.to_str().unwrap();

    let mut first = ProcessSupervisor::new(reference, "/bin/sh", config()).unwrap();
    first.initialize().unwrap();
    let pid = first.start().unwrap();

    // A fresh instance only has the PID file to go on
    let mut second = ProcessSupervisor::new(reference, "/bin/sh", config()).unwrap();
    second.initialize().unwrap();
    assert_eq!(second.recorded_pid(), Some(pid));
    assert!(second.is_alive());
    assert_eq!(
        second.start().unwrap_err().kind(),
        ErrorKind::AlreadyRunning
    );

    assert_eq!(second.stop().unwrap(), StopOutcome::Stopped(pid));
    assert!(!first.is_alive());
}

#[test]
fn self_exiting_script_stops_being_alive() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "oneshot.sh", "sleep 1\nexit 0\n");
    let config = config().with_logging(LoggingMode::Disabled);

    let mut supervisor =
        ProcessSupervisor::new(script.to_str().unwrap(), "/bin/sh", config).unwrap();
    supervisor.initialize().unwrap();

    let pid = supervisor.start().unwrap();
    assert!(supervisor.is_alive());
    assert!(wait_until(|| !supervisor.is_alive()));

    // The file still names the exited process until the next stop
    assert_eq!(supervisor.recorded_pid(), Some(pid));
    assert_eq!(supervisor.stop().unwrap(), StopOutcome::AlreadyStopped);
    assert_eq!(
        fs::read_to_string(dir.path().join(".oneshot.sh.pid")).unwrap(),
        ""
    );
}

#[test]
fn script_ignoring_sigterm_survives_stop() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "stubborn.sh",
        "trap '' TERM\nwhile :; do sleep 1; done\n",
    );
    let config = config()
        .with_logging(LoggingMode::Disabled)
        .with_stop_timeout(Duration::from_millis(300));

    let mut supervisor =
        ProcessSupervisor::new(script.to_str().unwrap(), "/bin/sh", config).unwrap();
    supervisor.initialize().unwrap();
    let pid = supervisor.start().unwrap();

    let err = supervisor.stop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Termination);
    assert_eq!(
        fs::read_to_string(dir.path().join(".stubborn.sh.pid")).unwrap(),
        pid.as_raw().to_string()
    );
    assert!(supervisor.is_alive());

    kill(pid, Signal::SIGKILL).unwrap();
    assert!(wait_until(|| !supervisor.is_alive()));
}

#[test]
fn persist_failure_leaves_no_orphan() {
    let pid = start_with_unwritable_pid_file("orphan.sh", "exec sleep 30\n");
    assert!(!NativeProcessControl::new().is_running(Pid::from_raw(pid)));
}

#[test]
fn persist_failure_kills_orphan_that_traps_sigterm() {
    let pid = start_with_unwritable_pid_file(
        "trapper.sh",
        "trap '' TERM\nwhile :; do sleep 1; done\n",
    );
    assert!(!NativeProcessControl::new().is_running(Pid::from_raw(pid)));
}
