pub mod catalog;
mod cli;
pub mod disk;
pub mod error;
pub mod item;
pub mod lockfile;
pub mod logger;
pub mod orchestrator;
pub mod paths;
pub mod process;
pub mod progress;
pub mod remote;
pub mod resolver;
pub mod self_update;
pub mod settings;
pub mod transfer;
pub mod updater;
pub mod version;
pub mod version_store;
pub mod zip_utils;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::error::{LauncherError, LauncherResult};
use crate::orchestrator::{InstallOrchestrator, InstallState};
use crate::paths::LauncherPaths;
use crate::progress::{TransferEvent, TransferPhase, TransferProgress};
use crate::remote::{HttpSource, RemoteSource};
use crate::self_update::SelfUpdateCoordinator;
use crate::settings::SettingsStore;

/// Shared pieces every command needs.
struct Launcher {
    paths: LauncherPaths,
    settings: Arc<SettingsStore>,
    source: Arc<dyn RemoteSource>,
}

impl Launcher {
    fn open(paths: LauncherPaths) -> LauncherResult<Self> {
        let settings = Arc::new(SettingsStore::load(&paths)?);
        let source: Arc<dyn RemoteSource> = Arc::new(HttpSource::new()?);
        Ok(Self {
            paths,
            settings,
            source,
        })
    }

    fn orchestrator(&self, game: &str) -> LauncherResult<InstallOrchestrator> {
        let descriptor = catalog::find(game).ok_or_else(|| {
            let known: Vec<String> = catalog::builtin_games().into_iter().map(|g| g.name).collect();
            LauncherError::Validation(format!("Unknown game `{game}` (known: {})", known.join(", ")))
        })?;
        Ok(InstallOrchestrator::new(
            &descriptor,
            &self.paths,
            self.settings.clone(),
            self.source.clone(),
        ))
    }

    /// Orchestrator with its state already resolved.
    async fn resolved(&self, game: &str) -> LauncherResult<InstallOrchestrator> {
        let mut orch = self.orchestrator(game)?;
        orch.resolve().await;
        Ok(orch)
    }
}

fn print_progress(p: &TransferProgress) {
    let line = match p.phase {
        TransferPhase::Downloading => {
            let downloaded = disk::format_bytes(p.downloaded_bytes.unwrap_or(0));
            match p.total_bytes {
                Some(total) => format!(
                    "{}: downloading {:>3}% ({downloaded} / {})",
                    p.item,
                    p.percent,
                    disk::format_bytes(total)
                ),
                None => format!("{}: downloading {:>3}% ({downloaded})", p.item, p.percent),
            }
        }
        TransferPhase::Extracting => format!(
            "{}: extracting {}/{} files",
            p.item,
            p.extracted_files.unwrap_or(0),
            p.total_files.unwrap_or(0)
        ),
    };
    let mut err = std::io::stderr();
    let _ = write!(err, "\r{line:<70}");
    let _ = err.flush();
}

/// Follow a running transfer until it ends, printing progress.
async fn drive(orch: &mut InstallOrchestrator) -> LauncherResult<()> {
    let mut failure = None;
    while let Some(event) = orch.next_event().await {
        match event {
            TransferEvent::Progress(p) => print_progress(&p),
            TransferEvent::Completed { .. } => {}
            TransferEvent::Failed(e) => failure = Some(e),
        }
    }
    eprintln!();
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn describe(orch: &InstallOrchestrator) -> String {
    let local = orch
        .local_version()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".into());
    let remote = match orch.remote_version() {
        Some(v) if orch.remote_version_trusted() => v.to_string(),
        Some(v) => format!("{v} (stale)"),
        None => "-".into(),
    };
    let mut line = format!(
        "{:<10} {:<17} local {:<8} remote {:<14} {}",
        orch.item().name,
        orch.state().to_string(),
        local,
        remote,
        orch.item().install_root.to_string_lossy()
    );
    if orch.is_running() {
        line.push_str("  [running]");
    }
    if let Some(e) = orch.last_error() {
        line.push_str(&format!("\n{:<10} last error: {e}", ""));
    }
    line
}

async fn status(launcher: &Launcher) -> LauncherResult<()> {
    let mut coordinator = SelfUpdateCoordinator::new(launcher.source.clone())?;
    let update = coordinator.check().await.clone();
    match update.remote_version {
        Some(remote) if update.update_available => println!(
            "launcher {} (update {remote} available, run `self-update`)",
            coordinator.current_version()
        ),
        _ => println!("launcher {}", coordinator.current_version()),
    }
    println!(
        "games folder {}",
        launcher.settings.games_install_path().to_string_lossy()
    );

    for game in catalog::builtin_games() {
        let orch = launcher.resolved(&game.name).await?;
        println!("{}", describe(&orch));
    }
    Ok(())
}

async fn install(launcher: &Launcher, game: &str, update: bool) -> LauncherResult<()> {
    let mut orch = launcher.resolved(game).await?;
    if update {
        orch.update().await?;
    } else {
        orch.install().await?;
    }
    drive(&mut orch).await?;
    println!("{}", describe(&orch));
    Ok(())
}

async fn retry(launcher: &Launcher, game: &str) -> LauncherResult<()> {
    let mut orch = launcher.resolved(game).await?;
    if orch.state() == InstallState::Failed {
        orch.retry().await?;
    }
    println!("{}", describe(&orch));
    Ok(())
}

async fn launch(launcher: &Launcher, game: &str) -> LauncherResult<()> {
    let orch = launcher.resolved(game).await?;
    let pid = orch.launch()?;
    println!("{} started (pid {pid})", orch.item().name);
    Ok(())
}

fn relocate(launcher: &Launcher, game: &str, exe: &Path) -> LauncherResult<()> {
    let mut orch = launcher.orchestrator(game)?;
    orch.relocate(exe)?;
    println!(
        "{} now uses {}",
        orch.item().name,
        orch.item().install_root.to_string_lossy()
    );
    Ok(())
}

async fn uninstall(launcher: &Launcher, game: &str) -> LauncherResult<()> {
    let mut orch = launcher.orchestrator(game)?;
    orch.uninstall().await?;
    println!("{} uninstalled", orch.item().name);
    Ok(())
}

fn verify(launcher: &Launcher, game: &str) -> LauncherResult<()> {
    let orch = launcher.orchestrator(game)?;
    if orch.verify() {
        println!("{}: OK", orch.item().name);
        Ok(())
    } else {
        Err(LauncherError::Validation(format!(
            "{} is missing {}",
            orch.item().name,
            orch.item().exe_path().to_string_lossy()
        )))
    }
}

fn set_install_path(launcher: &Launcher, dir: &Path) -> LauncherResult<()> {
    launcher.settings.set_games_install_path(dir)?;
    let free = disk::free_bytes(dir)
        .map(disk::format_bytes)
        .unwrap_or_else(|| "unknown".into());
    println!("games folder set to {} ({free} free)", dir.to_string_lossy());
    Ok(())
}

async fn self_update(launcher: &Launcher) -> LauncherResult<()> {
    let mut coordinator = SelfUpdateCoordinator::new(launcher.source.clone())?;
    let status = coordinator.check().await.clone();
    match status.remote_version {
        Some(remote) if status.update_available => {
            println!("updating launcher {} -> {remote}", coordinator.current_version());
            coordinator.start_update()?;
            Ok(())
        }
        _ => {
            println!("launcher {} is up to date", coordinator.current_version());
            Ok(())
        }
    }
}

async fn dispatch(launcher: &Launcher, command: Commands) -> LauncherResult<()> {
    match command {
        Commands::Status => status(launcher).await,
        Commands::Install { game } => install(launcher, &game, false).await,
        Commands::Update { game } => install(launcher, &game, true).await,
        Commands::Retry { game } => retry(launcher, &game).await,
        Commands::Launch { game } => launch(launcher, &game).await,
        Commands::Relocate { game, exe } => relocate(launcher, &game, &exe),
        Commands::Uninstall { game } => uninstall(launcher, &game).await,
        Commands::Verify { game } => verify(launcher, &game),
        Commands::SetInstallPath { dir } => set_install_path(launcher, &dir),
        Commands::SelfUpdate => self_update(launcher).await,
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let paths = match cli.data_dir {
        Some(dir) => LauncherPaths::with_root(dir),
        None => match LauncherPaths::from_env() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    // File logging (<data root>/logs/nexus-launcher.log)
    if let Err(e) = logger::init(&paths, "nexus-launcher") {
        eprintln!("warning: logging disabled: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to start async runtime: {e}");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let launcher = Launcher::open(paths)?;
        dispatch(&launcher, cli.command.unwrap_or(Commands::Status)).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("command failed ({:?}): {e}", e.kind());
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
