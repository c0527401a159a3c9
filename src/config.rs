use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// Generate JSON instances from a schema and POST them to an HTTP endpoint.
/// Interrupt (Ctrl+C) or terminate to stop and print statistics.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "One and only one of --endpoint-url or --dir must be used"
)]
pub struct CliArgs {
    /// Path to the JSON schema used as a template
    #[arg(short = 't', long, env = "JSONFLOOD_TEMPLATE", value_name = "PATH")]
    pub template: PathBuf,

    /// Endpoint where generated data is POSTed
    #[arg(short = 'e', long, env = "JSONFLOOD_ENDPOINT_URL", value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Store JSON samples in this directory (not implemented)
    #[arg(short = 'd', long, env = "JSONFLOOD_DIR", value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Number of concurrent HTTP clients
    #[arg(short = 'n', long, env = "JSONFLOOD_CLIENTS", default_value = "1", value_name = "NUM")]
    pub clients_number: usize,

    /// Per-client sending frequency in Hz, 0 for unlimited (not implemented)
    #[arg(short = 'f', long, default_value = "0", value_name = "FREQ")]
    pub frequency: f64,

    /// Percentage of malformed requests, in [0, 100] (not implemented)
    #[arg(short = 'P', long, default_value = "0", value_name = "RATE")]
    pub proto_fault_rate: f64,

    /// Percentage of malformed JSON bodies, in [0, 100] (not implemented)
    #[arg(short = 'R', long, default_value = "0", value_name = "RATE")]
    pub json_fault_rate: f64,

    /// Stop and print statistics after this many seconds, 0 to run until interrupted
    #[arg(short = 'T', long, env = "JSONFLOOD_TIMEOUT", default_value = "0", value_name = "SECS")]
    pub timeout: f64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "JSONFLOOD_CONNECT_TIMEOUT", default_value = "5")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "JSONFLOOD_REQUEST_TIMEOUT", default_value = "10")]
    pub request_timeout: u64,

    /// Pause before reconnecting after a fault, in milliseconds
    #[arg(long, env = "JSONFLOOD_BACKOFF_MS", default_value = "10")]
    pub backoff_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "JSONFLOOD_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Input
    pub template: PathBuf,

    // Destination
    pub endpoint: Url,
    pub clients: usize,

    // Accepted but not acted upon
    pub frequency: f64,
    pub proto_fault_rate: f64,
    pub json_fault_rate: f64,

    // Timeouts
    pub run_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub backoff: Duration,

    // Output
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub json_report: bool,
}

impl Config {
    /// Load configuration with priority: CLI > ENV (.env included) > defaults
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_args(CliArgs::parse())
    }

    /// Validate parsed arguments and build the configuration
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let endpoint = match (args.endpoint_url, args.dir) {
            (None, None) => return Err(ConfigError::MissingDestination),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingDestination),
            (None, Some(dir)) => return Err(ConfigError::DirectoryModeUnsupported(dir)),
            (Some(url), None) => parse_endpoint(&url)?,
        };

        if args.clients_number == 0 {
            return Err(ConfigError::InvalidClientCount(args.clients_number));
        }
        if !args.frequency.is_finite() || args.frequency < 0.0 {
            return Err(ConfigError::InvalidFrequency(args.frequency));
        }
        validate_rate("--proto-fault-rate", args.proto_fault_rate)?;
        validate_rate("--json-fault-rate", args.json_fault_rate)?;

        Ok(Config {
            template: args.template,
            endpoint,
            clients: args.clients_number,
            frequency: args.frequency,
            proto_fault_rate: args.proto_fault_rate,
            json_fault_rate: args.json_fault_rate,
            run_timeout: parse_run_timeout(args.timeout)?,
            connect_timeout: Duration::from_secs(args.connect_timeout),
            request_timeout: Duration::from_secs(args.request_timeout),
            backoff: Duration::from_millis(args.backoff_ms),
            log_level: args.log_level,
            log_file: args.log_file,
            json_report: args.json,
        })
    }

    /// Names of options that were set but have no effect yet
    pub fn unimplemented_options(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.frequency > 0.0 {
            names.push("--frequency");
        }
        if self.proto_fault_rate > 0.0 {
            names.push("--proto-fault-rate");
        }
        if self.json_fault_rate > 0.0 {
            names.push("--json-fault-rate");
        }
        names
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            endpoint: self.endpoint.clone(),
            clients: self.clients,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            backoff: self.backoff,
        }
    }
}

fn parse_endpoint(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn validate_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRate { name, value })
    }
}

/// Zero means run until interrupted
fn parse_run_timeout(secs: f64) -> Result<Option<Duration>, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::InvalidTimeout(secs));
    }
    if secs == 0.0 {
        Ok(None)
    } else {
        Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|_| ConfigError::InvalidTimeout(secs))
    }
}
