//! cert-notify - certificate authority exit-event notifier
//!
//! Command-line front end for the notification pipeline:
//! - `issued`: deliver one certificate-issued notification
//! - `notify`: dispatch a raw exit event the way the host would
//! - `config show` / `config check`: inspect the resolved configuration

use clap::{Args, Parser, Subcommand};
use cn_common::{format_error_human, Error};
use cn_config::{load_resolved_config, validate, IssueSeverity, ResolvedConfig};
use cn_core::exit_codes::ExitCode;
use cn_core::host::{parse_event_code, property_names, PropertyValue};
use cn_core::logging::{event_names, init_logging, LogConfig, LogFormat, LogLevel, Stage};
use cn_core::report::{FanoutEventSink, JsonlEventSink, TracingEventSink};
use cn_core::{
    EventProcessor, EventSink, ExitModule, MapPropertySource, NotifyOutcome, OutcomeReporter,
};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span};

/// Launch a helper process when the certificate authority issues a certificate
#[derive(Parser)]
#[command(name = "cert-notify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to notify.toml
    #[arg(long, global = true, env = "CERT_NOTIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Append event-log records as JSON lines to this file
    #[arg(long, global = true)]
    events: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Notify the helper that a certificate was issued
    Issued(IssuedArgs),

    /// Dispatch a raw exit event (name, decimal, or 0x-prefixed code)
    Notify(NotifyArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct IssuedArgs {
    /// Subject key identifier of the issued certificate
    #[arg(long)]
    subject_key_id: String,

    /// Serial number of the issued certificate
    #[arg(long)]
    serial_number: String,

    /// File holding the DER-encoded certificate
    #[arg(long)]
    cert: PathBuf,
}

#[derive(Args, Debug)]
struct NotifyArgs {
    /// Event name (e.g. cert-issued) or numeric code
    event: String,

    #[arg(long)]
    subject_key_id: Option<String>,

    #[arg(long)]
    serial_number: Option<String>,

    /// File holding the DER-encoded certificate
    #[arg(long)]
    cert: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved configuration as JSON
    Show,
    /// Validate the resolved configuration
    Check,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    let log_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(log_level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Issued(args) => run_issued(&cli.global, args),
        Commands::Notify(args) => run_notify(&cli.global, args),
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => run_config_show(&cli.global),
            ConfigCommands::Check => run_config_check(&cli.global),
        },
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_issued(global: &GlobalOpts, args: &IssuedArgs) -> ExitCode {
    let processor = match build_processor(global) {
        Ok(processor) => processor,
        Err(code) => return code,
    };
    let raw_cert = match read_cert(&args.cert) {
        Ok(bytes) => bytes,
        Err(e) => return output_error(global, &e),
    };

    match processor.notify_cert_issued(&args.subject_key_id, &args.serial_number, &raw_cert) {
        Ok(outcome) => {
            println!("{}", serde_json::json!(outcome));
            match outcome {
                NotifyOutcome::Succeeded { .. } => ExitCode::Clean,
                NotifyOutcome::HelperFailed {
                    exit_code,
                    preserved,
                    ..
                } => {
                    eprintln!(
                        "helper exited with code {}; certificate kept at {}",
                        exit_code,
                        preserved.display()
                    );
                    ExitCode::ProcessError
                }
            }
        }
        Err(e) => output_error(global, &e),
    }
}

fn run_notify(global: &GlobalOpts, args: &NotifyArgs) -> ExitCode {
    let Some(code) = parse_event_code(&args.event) else {
        eprintln!("unknown exit event: {}", args.event);
        return ExitCode::ArgsError;
    };

    let mut properties = MapPropertySource::new();
    if let Some(skid) = &args.subject_key_id {
        properties.insert(
            property_names::SUBJECT_KEY_IDENTIFIER,
            PropertyValue::String(skid.clone()),
        );
    }
    if let Some(serial) = &args.serial_number {
        properties.insert(
            property_names::SERIAL_NUMBER,
            PropertyValue::String(serial.clone()),
        );
    }
    if let Some(path) = &args.cert {
        match read_cert(path) {
            Ok(bytes) => properties.insert(
                property_names::RAW_CERTIFICATE,
                PropertyValue::Binary(bytes),
            ),
            Err(e) => return output_error(global, &e),
        }
    }

    let processor = match build_processor(global) {
        Ok(processor) => processor,
        Err(code) => return code,
    };
    let module = ExitModule::new(processor);
    module.initialize();

    match module.notify(code, &properties) {
        Ok(()) => ExitCode::Clean,
        Err(e) => output_error(global, &e),
    }
}

fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let resolved = match load(global) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let response = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "source": resolved.location.source.to_string(),
        "path": resolved.location.path.as_ref().map(|p| p.display().to_string()),
        "configured": resolved.config.is_configured(),
        "config": resolved.config,
    });
    println!("{:#}", response);
    ExitCode::Clean
}

fn run_config_check(global: &GlobalOpts) -> ExitCode {
    let resolved = match load(global) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let report = validate(&resolved.config);
    for issue in &report.issues {
        let label = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        println!("{}: {}: {}", label, issue.field, issue.message);
    }

    if report.is_valid() {
        println!("config OK ({})", resolved.location.source);
        ExitCode::Clean
    } else {
        ExitCode::ConfigError
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load(global: &GlobalOpts) -> Result<ResolvedConfig, ExitCode> {
    let _span = info_span!("load_config", stage = %Stage::Init).entered();
    let resolved = load_resolved_config(global.config.as_deref()).map_err(|e| {
        eprintln!("{}", format_error_human(&Error::from(e), use_color(global)));
        ExitCode::ConfigError
    })?;

    match &resolved.location.path {
        Some(path) => info!(
            event = event_names::CONFIG_LOADED,
            source = %resolved.location.source,
            path = %path.display(),
            configured = resolved.config.is_configured(),
            "configuration loaded"
        ),
        None => info!(
            event = event_names::CONFIG_DEFAULT_USED,
            "no config file found; using defaults"
        ),
    }
    Ok(resolved)
}

fn build_processor(global: &GlobalOpts) -> Result<EventProcessor, ExitCode> {
    let resolved = load(global)?;
    let sink = event_sink(global).map_err(|e| output_error(global, &e))?;
    Ok(EventProcessor::new(resolved.config, OutcomeReporter::new(sink)))
}

/// Event-log sink: tracing always, plus a JSONL file when `--events` is given.
fn event_sink(global: &GlobalOpts) -> Result<Arc<dyn EventSink>, Error> {
    let tracing_sink: Arc<dyn EventSink> = Arc::new(TracingEventSink);
    let Some(path) = &global.events else {
        return Ok(tracing_sink);
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(FanoutEventSink::new(vec![
        tracing_sink,
        Arc::new(JsonlEventSink::new(file)),
    ])))
}

fn read_cert(path: &Path) -> Result<Vec<u8>, Error> {
    Ok(std::fs::read(path)?)
}

fn output_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    eprintln!("{}", format_error_human(err, use_color(global)));
    ExitCode::from(err)
}

fn use_color(global: &GlobalOpts) -> bool {
    !global.no_color && std::io::stderr().is_terminal()
}
