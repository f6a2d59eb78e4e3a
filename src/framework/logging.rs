/*!
 * Logging Configuration
 * Installs and reconfigures the process-wide diagnostic subscriber
 *
 * The subscriber is installed once: a reloadable `EnvFilter` in front of a
 * compact and a JSON fmt layer. Both layers write through one shared sink
 * that forwards to stderr or a log file and drops records whose format is
 * not the active one, so filter, format and destination can all change
 * after installation. `log` records from the backends are bridged in.
 *
 * Options are `;`-separated `key=value` pairs:
 * - `level`: EnvFilter directives (default: `RUST_LOG`, else `info`)
 * - `format`: `compact` or `json` (default: `compact`)
 * - `file`: log file name under the configured path (default: `containers.log`)
 */

use crate::core::{ContainerError, ContainerResult};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

const DEFAULT_LEVEL: &str = "info";
const DEFAULT_FILE: &str = "containers.log";

/// Output format of diagnostic records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ContainerError::unknown(format!("unknown log format {:?}", other))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Parsed logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    pub level: Option<String>,
    pub format: LogFormat,
    pub file: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Compact,
            file: DEFAULT_FILE.to_string(),
        }
    }
}

impl LoggingOptions {
    /// Parse an options string
    ///
    /// Unrecognised keys fail with `InvalidKey`; malformed pairs and bad
    /// values fail with `Unknown`.
    pub fn parse(options: &str) -> ContainerResult<Self> {
        let mut parsed = Self::default();

        for pair in options.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ContainerError::unknown(format!("malformed log option {:?}", pair)))?;
            let value = value.trim();

            match key.trim() {
                "level" => parsed.level = Some(value.to_string()),
                "format" => parsed.format = value.parse()?,
                "file" => {
                    let name = Path::new(value);
                    if value.is_empty() || name.file_name().map(|n| n != name.as_os_str()).unwrap_or(true) {
                        return Err(ContainerError::unknown(format!(
                            "log file must be a plain file name, got {:?}",
                            value
                        )));
                    }
                    parsed.file = value.to_string();
                }
                other => return Err(ContainerError::invalid_key(format!("log option {:?}", other))),
            }
        }

        Ok(parsed)
    }

    fn filter(&self) -> ContainerResult<EnvFilter> {
        match self.level {
            Some(ref directives) => EnvFilter::try_new(directives)
                .map_err(|e| ContainerError::unknown(format!("log level {:?}: {}", directives, e))),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))),
        }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Stderr,
    File {
        path: PathBuf,
        file: Arc<Mutex<File>>,
    },
}

#[derive(Debug)]
struct SinkState {
    format: LogFormat,
    target: Target,
}

/// Shared, swappable destination for every fmt layer
#[derive(Debug, Clone)]
pub struct LogSink {
    state: Arc<RwLock<SinkState>>,
}

impl LogSink {
    fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SinkState {
                format: LogFormat::Compact,
                target: Target::Stderr,
            })),
        }
    }

    fn swap(&self, format: LogFormat, target: Target) {
        let mut state = self.state.write();
        state.format = format;
        state.target = target;
    }

    /// Writer factory for the layer producing `format`
    fn layer_writer(&self, format: LogFormat) -> LayerWriter {
        LayerWriter {
            sink: self.clone(),
            format,
        }
    }

    /// Current log file, if records go to one
    pub fn path(&self) -> Option<PathBuf> {
        match self.state.read().target {
            Target::File { ref path, .. } => Some(path.clone()),
            Target::Stderr => None,
        }
    }

    pub fn format(&self) -> LogFormat {
        self.state.read().format
    }
}

struct LayerWriter {
    sink: LogSink,
    format: LogFormat,
}

impl<'a> MakeWriter<'a> for LayerWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        let state = self.sink.state.read();
        if state.format != self.format {
            return SinkWriter::Discard;
        }
        match state.target {
            Target::Stderr => SinkWriter::Stderr,
            Target::File { ref file, .. } => SinkWriter::File(Arc::clone(file)),
        }
    }
}

/// Writer for one formatted record
pub enum SinkWriter {
    Discard,
    Stderr,
    File(Arc<Mutex<File>>),
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::Discard => Ok(buf.len()),
            SinkWriter::Stderr => io::stderr().write(buf),
            SinkWriter::File(file) => file.lock().write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            SinkWriter::Discard => Ok(()),
            SinkWriter::Stderr => io::stderr().write_all(buf),
            // One lock per record keeps concurrent records from interleaving
            SinkWriter::File(file) => file.lock().write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Discard => Ok(()),
            SinkWriter::Stderr => io::stderr().flush(),
            SinkWriter::File(file) => file.lock().flush(),
        }
    }
}

struct Installed {
    filter: reload::Handle<EnvFilter, Registry>,
    sink: LogSink,
}

static LOGGING: OnceLock<Result<Installed, String>> = OnceLock::new();

fn install() -> Result<Installed, String> {
    let (filter, handle) = reload::Layer::new(EnvFilter::new(DEFAULT_LEVEL));
    let sink = LogSink::new();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(sink.layer_writer(LogFormat::Compact)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(sink.layer_writer(LogFormat::Json)),
        )
        .try_init()
        .map_err(|e| e.to_string())?;

    // The reloadable filter decides; the log facade must not pre-filter
    log::set_max_level(log::LevelFilter::Trace);

    Ok(Installed {
        filter: handle,
        sink,
    })
}

/// Configure diagnostic output
///
/// May be called at any time, before or after a framework exists, and
/// repeatedly. With `path` set, records are appended to `<path>/<file>`;
/// otherwise they go to stderr.
pub fn configure_logging(path: Option<&Path>, options: &str) -> ContainerResult<()> {
    let options = LoggingOptions::parse(options)?;
    let filter = options.filter()?;

    let target = match path {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| {
                ContainerError::unknown(format!("log directory {}: {}", dir.display(), e))
            })?;
            let path = dir.join(&options.file);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| ContainerError::unknown(format!("log file {}: {}", path.display(), e)))?;
            Target::File {
                path,
                file: Arc::new(Mutex::new(file)),
            }
        }
        None => Target::Stderr,
    };

    let installed = LOGGING
        .get_or_init(install)
        .as_ref()
        .map_err(|e| ContainerError::unknown(format!("cannot install log subscriber: {}", e)))?;

    installed
        .filter
        .reload(filter)
        .map_err(|e| ContainerError::unknown(format!("reloading log filter: {}", e)))?;
    installed.sink.swap(options.format, target);

    tracing::debug!(
        format = %options.format,
        file = ?installed.sink.path(),
        "logging configured"
    );
    Ok(())
}

/// The active sink, once logging was configured
pub fn log_sink() -> Option<LogSink> {
    LOGGING
        .get()
        .and_then(|installed| installed.as_ref().ok())
        .map(|installed| installed.sink.clone())
}
