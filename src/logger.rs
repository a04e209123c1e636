use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::paths::LauncherPaths;

type AnyError = Box<dyn std::error::Error>;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} {M} - {m}{n}";
const ROLL_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROLLED: u32 = 5;

fn err(msg: impl Into<String>) -> AnyError {
    Box::new(std::io::Error::new(std::io::ErrorKind::Other, msg.into()))
}

fn log_paths(paths: &LauncherPaths, file_stem: &str) -> (PathBuf, PathBuf) {
    let logs_dir = paths.logs_dir();
    let log_file = logs_dir.join(format!("{file_stem}.log"));
    (logs_dir, log_file)
}

/// `<stem>.log`, rolled into `<stem>.1.log` .. `<stem>.5.log`.
fn rolling_file(logs_dir: &Path, log_file: &Path, file_stem: &str) -> Result<RollingFileAppender, AnyError> {
    let archive_pattern = logs_dir.join(format!("{file_stem}.{{}}.log"));
    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), KEEP_ROLLED)
        .map_err(|e| err(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_AT_BYTES)), Box::new(roller));

    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(log_file, Box::new(policy))
        .map_err(|e| err(e.to_string()))
}

fn build_config(file: RollingFileAppender) -> Result<Config, AnyError> {
    let mut config = Config::builder().appender(Appender::builder().build("file", Box::new(file)));
    let mut root = Root::builder().appender("file");

    // Debug builds echo to stderr as well.
    if cfg!(debug_assertions) {
        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
            .build();
        config = config.appender(Appender::builder().build("console", Box::new(console)));
        root = root.appender("console");
    }

    config
        .build(root.build(LevelFilter::Info))
        .map_err(|e| err(e.to_string()))
}

/// Install the rolling file logger at `<data root>/logs/<file_stem>.log`.
///
/// A second call is a no-op. Callers treat an error as non-fatal.
pub fn init(paths: &LauncherPaths, file_stem: &str) -> Result<(), AnyError> {
    let (logs_dir, log_file) = log_paths(paths, file_stem);
    std::fs::create_dir_all(&logs_dir).map_err(|e| err(e.to_string()))?;

    let config = build_config(rolling_file(&logs_dir, &log_file, file_stem)?)?;
    if log4rs::init_config(config).is_err() {
        // Another binary entry point or test got there first.
        return Ok(());
    }

    std::panic::set_hook(Box::new(|info| {
        log::error!("panic: {info}");
    }));

    log::info!("{file_stem} {} started", env!("CARGO_PKG_VERSION"));
    log::info!("logging to {}", log_file.to_string_lossy());
    Ok(())
}
