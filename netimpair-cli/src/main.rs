use std::{future::Future, process::ExitCode};

use clap::Parser;
use netimpair::{
    device::LinkProbe,
    executor::{CommandFacility, Facility},
    schedule::ToggleSchedule,
    session::{InstallRequest, Session, SessionOptions},
};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod args;

use args::Cli;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("root privileges are required to change traffic control settings (try --dry-run)")]
    NotRoot,
    #[error(transparent)]
    Impair(#[from] netimpair::Error),
    #[error("runtime error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    const fn exit_status(&self) -> u8 {
        match self {
            Self::NotRoot => 1,
            Self::Impair(_) | Self::Io(_) => 5,
        }
    }
}

/// SIGINT and SIGTERM, registered before anything is installed so an early signal still leads to
/// a teardown.
struct Shutdown {
    interrupt: Signal,
    terminate: Signal,
}

impl Shutdown {
    fn register() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "netimpair failed");
            ExitCode::from(err.exit_status())
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    if !cli.dry_run && !nix::unistd::geteuid().is_root() {
        return Err(Error::NotRoot);
    }

    let request = cli.request()?;
    let schedule = cli.schedule();
    let options = SessionOptions::new().with_purge_stale(!cli.no_purge);
    let facility = CommandFacility::new().dry_run(cli.dry_run);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let mut shutdown = Shutdown::register()?;
        let mut session = Session::new(facility).with_options(options);
        impair(&mut session, &request, &schedule, shutdown.recv()).await
    })
}

/// Installs the impairment, drives it until the schedule ends or `shutdown` resolves, then tears
/// the session down.
async fn impair<F, L, S>(
    session: &mut Session<F, L>,
    request: &InstallRequest,
    schedule: &ToggleSchedule,
    shutdown: S,
) -> Result<(), Error>
where
    F: Facility,
    L: LinkProbe,
    S: Future<Output = &'static str>,
{
    // A failed install has already been unwound by the session.
    session.install(request)?;

    let outcome = drive(session, request, schedule, shutdown).await;

    let report = session.teardown();
    if !report.is_clean() {
        warn!(cleanup = %report.cleanup(), "teardown left state behind");
    } else if report.attempted > 0 {
        info!(steps = report.attempted, "impairment removed");
    }

    outcome
}

/// Runs the toggle schedule, or waits for `shutdown` when there is none.
async fn drive<F, L, S>(
    session: &mut Session<F, L>,
    request: &InstallRequest,
    schedule: &ToggleSchedule,
    shutdown: S,
) -> Result<(), Error>
where
    F: Facility,
    L: LinkProbe,
    S: Future<Output = &'static str>,
{
    tokio::pin!(shutdown);

    if schedule.is_empty() {
        info!("press ctrl-c to stop");
        let signal = shutdown.await;
        info!(signal, "stopping");
        return Ok(());
    }

    for step in schedule.steps() {
        session.toggle(&request.device, request.direction, step.enabled)?;
        info!(enabled = step.enabled, seconds = step.duration.as_secs(), "toggled");

        tokio::select! {
            _ = tokio::time::sleep(step.duration) => {}
            signal = &mut shutdown => {
                info!(signal, "stopping");
                return Ok(());
            }
        }
    }

    Ok(())
}
