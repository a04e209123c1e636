use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use nexus_launcher_lib::paths::LauncherPaths;
use nexus_launcher_lib::progress::{TransferPhase, TransferProgress};
use nexus_launcher_lib::remote::{HttpSource, RemoteSource};
use nexus_launcher_lib::updater::{self, UpdaterPlan};
use nexus_launcher_lib::{disk, error::LauncherResult, logger};

fn print_progress(p: &TransferProgress) {
    let line = match p.phase {
        TransferPhase::Downloading => format!(
            "Downloading update... {:>3}% ({})",
            p.percent,
            disk::format_bytes(p.downloaded_bytes.unwrap_or(0))
        ),
        TransferPhase::Extracting => "Applying update...".to_string(),
    };
    let mut out = std::io::stdout();
    let _ = write!(out, "\r{line:<60}");
    let _ = out.flush();
}

async fn update() -> LauncherResult<u32> {
    let plan = UpdaterPlan::from_current_exe()?;
    let source: Arc<dyn RemoteSource> = Arc::new(HttpSource::new()?);
    let pid = updater::run(&plan, source, print_progress).await?;
    println!("\nRestarting launcher...");
    Ok(pid)
}

#[tokio::main]
async fn main() -> ExitCode {
    match LauncherPaths::from_env() {
        Ok(paths) => {
            if let Err(e) = logger::init(&paths, "launcher-updater") {
                eprintln!("warning: logging disabled: {e}");
            }
        }
        Err(e) => eprintln!("warning: logging disabled: {e}"),
    }

    match update().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("launcher update failed ({:?}): {e}", e.kind());
            eprintln!("\nLauncher update failed:\n\n{e}\n\nPlease restart the launcher manually.");
            ExitCode::FAILURE
        }
    }
}
