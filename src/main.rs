use anyhow::Context;
use pidkeeper::cli::{Action, Cli};
use pidkeeper::error::{ErrorKind, Result, SupervisorError};
use pidkeeper::supervisor::{ProcessStatus, ProcessSupervisor, StopOutcome};
use tracing_subscriber::EnvFilter;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    // Parse command line arguments
    let args = Cli::parse_args();

    if let Err(e) = init_tracing(&args) {
        eprintln!("PIDKEEPER: {:#}", e);
    }

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("PIDKEEPER: {}", e);
        eprintln!("Use \"pidkeeper -h\" to get help");
        return e.exit_code();
    }

    let mut supervisor =
        match ProcessSupervisor::new(&args.script_reference(), &args.binary, args.to_config()) {
            Ok(supervisor) => supervisor,
            Err(e) => {
                eprintln!("PIDKEEPER: {}", e);
                return e.exit_code();
            }
        };

    if let Err(e) = supervisor.initialize() {
        eprintln!("PIDKEEPER: {}", e);
        return e.exit_code();
    }

    match run_action(args.action, &mut supervisor) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("PIDKEEPER: {}", e);
            e.exit_code()
        }
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `-v`
fn init_tracing(args: &Cli) -> anyhow::Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().context("invalid RUST_LOG")?
    } else {
        EnvFilter::new(args.log_filter())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Run one command against the supervisor and return the exit code
fn run_action(action: Action, supervisor: &mut ProcessSupervisor) -> Result<i32> {
    let name = supervisor.script().script_name().to_string();

    match action {
        Action::Status => match supervisor.status() {
            ProcessStatus::Running(pid) => {
                println!("{} is running (pid {})", name, pid);
                Ok(ErrorKind::NoError.as_exit_code())
            }
            ProcessStatus::NotRunning => Err(SupervisorError::NotRunning(name)),
        },
        Action::Start => {
            let pid = supervisor.start()?;
            println!("{} started (pid {})", name, pid);
            Ok(ErrorKind::NoError.as_exit_code())
        }
        Action::Stop => {
            match supervisor.stop()? {
                StopOutcome::Stopped(pid) => println!("{} stopped (pid {})", name, pid),
                StopOutcome::AlreadyStopped => println!("{} was not running", name),
            }
            Ok(ErrorKind::NoError.as_exit_code())
        }
        Action::Run => {
            if let ProcessStatus::Running(pid) = supervisor.status() {
                println!("{} is alive and running (pid {})", name, pid);
            } else {
                let pid = supervisor.start()?;
                println!("{} started (pid {})", name, pid);
            }
            Ok(ErrorKind::NoError.as_exit_code())
        }
    }
}
