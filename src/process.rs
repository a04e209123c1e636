use std::path::Path;
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

use crate::error::{LauncherError, LauncherResult};

fn normalized(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// PIDs of processes whose name matches `process_name` (case-insensitive,
/// `.exe` optional). The calling process is never included.
///
/// Name-based matching is best effort: an unrelated process with the same
/// name is reported too.
pub fn running_pids(process_name: &str) -> Vec<u32> {
    let wanted = normalized(process_name);
    if wanted.is_empty() {
        return vec![];
    }
    let own_pid = std::process::id();
    let s = System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));

    let mut pids: Vec<u32> = s
        .processes()
        .iter()
        .filter(|(pid, process)| {
            pid.as_u32() != own_pid
                && normalized(&Path::new(process.name()).to_string_lossy()) == wanted
        })
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();
    pids
}

/// Whether a process with this pid exists.
pub fn is_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let s = System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));
    s.process(Pid::from_u32(pid)).is_some()
}

pub fn is_running(process_name: &str) -> bool {
    !running_pids(process_name).is_empty()
}

/// Block until no process named `process_name` remains.
pub async fn wait_for_exit(process_name: &str, poll: Duration) {
    let mut announced = false;
    loop {
        let pids = running_pids(process_name);
        if pids.is_empty() {
            return;
        }
        if !announced {
            log::info!("Waiting for {process_name} to exit (pids {pids:?})");
            announced = true;
        }
        tokio::time::sleep(poll).await;
    }
}

/// Start `exe` as an independent process with `working_dir` as its cwd.
///
/// The child handle is dropped right away; the launcher never waits on it.
pub fn spawn_detached(exe: &Path, working_dir: &Path) -> LauncherResult<u32> {
    let child = std::process::Command::new(exe)
        .current_dir(working_dir)
        .spawn()
        .map_err(|source| LauncherError::Process {
            path: exe.to_path_buf(),
            source,
        })?;
    let pid = child.id();
    log::info!("Started {} (pid {pid})", exe.to_string_lossy());
    Ok(pid)
}
