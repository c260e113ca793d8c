use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "node-cycler.log";

/// Where the file sink writes, if anywhere.
#[derive(Debug, Clone)]
pub struct LogSink {
    pub dir: PathBuf,
    pub file_name: String,
    pub enabled: bool,
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink { dir: PathBuf::from(DEFAULT_LOG_DIR), file_name: DEFAULT_LOG_FILE.to_string(), enabled: true }
    }
}

impl LogSink {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Initializes the global logger.
///
/// This function should be called once at the very beginning of `main`.
///
/// Log level is controlled by the `RUST_LOG` environment variable
/// (e.g. `RUST_LOG=debug node-cycler --role worker`) and defaults to `info`.
/// Console output goes to stderr so that stdout only carries the final
/// success marker.
pub fn init(sink: &LogSink) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let base_config = Dispatch::new().level(log_level_filter).level_for("serde", LevelFilter::Warn);

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = base_config.chain(console_config);

    if sink.enabled {
        if let Err(e) = fs::create_dir_all(&sink.dir) {
            eprintln!("Failed to create log directory at '{}': {}", sink.dir.display(), e);
        }

        let log_file_path = sink.path();
        match fern::log_file(&log_file_path) {
            Ok(file) => {
                let file_config = Dispatch::new()
                    .format(|out, message, record| {
                        out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                    })
                    .chain(file);
                dispatch = dispatch.chain(file_config);
            }
            Err(e) => eprintln!("Failed to open log file '{}': {}", log_file_path.display(), e),
        }
    }

    dispatch.apply().unwrap_or_else(|e| {
        eprintln!("Failed to apply logger configuration: {}", e);
    });

    if sink.enabled {
        log::info!("Logger initialized. Logging to console and '{}'.", sink.path().display());
    } else {
        log::info!("Logger initialized. Logging to console only.");
    }
}
