//! Alignify CLI - Command-line interface for Alignify Core
//!
//! Commands:
//! - replay: Score a recorded landmark stream against a template (batch mode)
//! - capture: Capture a template from a recorded frame
//! - validate: Validate a template or config file
//! - doctor: Diagnose engine health and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use alignify_core::config::EngineConfig;
use alignify_core::pipeline::replay_source;
use alignify_core::source::RecordedSource;
use alignify_core::template::PoseTemplate;
use alignify_core::types::{LandmarkFrame, SessionMetrics};
use alignify_core::{ENGINE_VERSION, METRICS_VERSION, PRODUCER_NAME};

/// Alignify - On-device pose-alignment engine for real-time posture feedback
#[derive(Parser)]
#[command(name = "alignify")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score landmark streams against pose templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a recorded landmark stream against a template (batch mode)
    Replay {
        /// Input frames file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Template JSON file path
        #[arg(short, long)]
        template: PathBuf,

        /// Engine config JSON file path (defaults apply if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Print only the session summary
        #[arg(long)]
        summary: bool,
    },

    /// Capture a template from the first scoreable frame of a recording
    Capture {
        /// Input frames file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Template name
        #[arg(short, long)]
        name: String,

        /// Engine config JSON file path (defaults apply if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,
    },

    /// Validate a template file
    Validate {
        /// Template JSON file path (use - for stdin)
        #[arg(short, long)]
        template: PathBuf,
    },

    /// Diagnose engine health and configuration
    Doctor {
        /// Check an engine config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a template file
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AlignifyCliError> {
    match cli.command {
        Commands::Replay {
            input,
            template,
            config,
            input_format,
            output_format,
            summary,
        } => cmd_replay(
            &input,
            &template,
            config.as_deref(),
            input_format,
            output_format,
            summary,
        ),

        Commands::Capture {
            input,
            name,
            config,
            input_format,
        } => cmd_capture(&input, &name, config.as_deref(), input_format),

        Commands::Validate { template } => cmd_validate(&template),

        Commands::Doctor {
            config,
            template,
            json,
        } => cmd_doctor(config.as_deref(), template.as_deref(), json),
    }
}

fn cmd_replay(
    input: &PathBuf,
    template_path: &std::path::Path,
    config_path: Option<&std::path::Path>,
    input_format: InputFormat,
    output_format: OutputFormat,
    summary: bool,
) -> Result<(), AlignifyCliError> {
    let frames = read_frames(input, input_format)?;
    if frames.is_empty() {
        return Err(AlignifyCliError::NoFrames);
    }

    let template = PoseTemplate::from_json(&fs::read_to_string(template_path)?)?;
    let config = load_config(config_path)?;

    let mut source = RecordedSource::new(frames);
    let metrics = replay_source(&mut source, template, config)?;
    print!("{}", format_metrics(&metrics, &output_format, summary)?);
    Ok(())
}

fn cmd_capture(
    input: &PathBuf,
    name: &str,
    config_path: Option<&std::path::Path>,
    input_format: InputFormat,
) -> Result<(), AlignifyCliError> {
    use alignify_core::normalizer::PoseNormalizer;

    let frames = read_frames(input, input_format)?;
    if frames.is_empty() {
        return Err(AlignifyCliError::NoFrames);
    }
    let config = load_config(config_path)?;

    let skeleton = frames
        .iter()
        .find_map(|frame| PoseNormalizer::normalize(frame, &config).ok())
        .ok_or(AlignifyCliError::NoScoreableFrame)?;
    let template = PoseTemplate::from_skeleton(name, &skeleton)?;

    println!("{}", template.to_json()?);
    Ok(())
}

fn cmd_validate(template_path: &PathBuf) -> Result<(), AlignifyCliError> {
    let data = if template_path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(template_path)?
    };

    let template = PoseTemplate::from_json(&data)?;
    println!(
        "Template '{}' is valid ({} active joints)",
        template.name(),
        template.active_joints().count()
    );
    Ok(())
}

fn cmd_doctor(
    config_path: Option<&std::path::Path>,
    template_path: Option<&std::path::Path>,
    json: bool,
) -> Result<(), AlignifyCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Alignify Core version {}", ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "metrics_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Session metrics schema: {}", METRICS_VERSION),
    });

    if let Some(path) = config_path {
        checks.push(check_file(path, "config", |data| {
            EngineConfig::from_json(data).map(|config| {
                format!(
                    "Config valid (thresholds {}/{}, {} frame queue)",
                    config.low_threshold, config.high_threshold, config.queue_capacity
                )
            })
        }));
    }

    if let Some(path) = template_path {
        checks.push(check_file(path, "template", |data| {
            PoseTemplate::from_json(data).map(|template| {
                format!(
                    "Template '{}' valid ({} active joints)",
                    template.name(),
                    template.active_joints().count()
                )
            })
        }));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Alignify Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(AlignifyCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_frames(
    input: &PathBuf,
    input_format: InputFormat,
) -> Result<Vec<LandmarkFrame>, AlignifyCliError> {
    let data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    match input_format {
        InputFormat::Ndjson => data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    AlignifyCliError::ParseError(format!("Failed to parse frame: {}", e))
                })
            })
            .collect(),
        InputFormat::Json => serde_json::from_str(&data)
            .map_err(|e| AlignifyCliError::ParseError(format!("Failed to parse frames: {}", e))),
    }
}

fn load_config(config_path: Option<&std::path::Path>) -> Result<EngineConfig, AlignifyCliError> {
    match config_path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn format_metrics(
    metrics: &SessionMetrics,
    format: &OutputFormat,
    summary: bool,
) -> Result<String, AlignifyCliError> {
    let value = if summary {
        serde_json::to_value(&metrics.summary)?
    } else {
        serde_json::to_value(metrics)?
    };
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&value)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&value)? + "\n"),
    }
}

fn check_file(
    path: &std::path::Path,
    name: &str,
    parse: impl Fn(&str) -> Result<String, alignify_core::EngineError>,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} file does not exist", name),
        };
    }
    match fs::read_to_string(path) {
        Ok(data) => match parse(&data) {
            Ok(message) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message,
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid {}: {}", name, e),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {} file: {}", name, e),
        },
    }
}

// Error types

#[derive(Debug)]
enum AlignifyCliError {
    Io(io::Error),
    Engine(alignify_core::EngineError),
    Json(serde_json::Error),
    NoFrames,
    NoScoreableFrame,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for AlignifyCliError {
    fn from(e: io::Error) -> Self {
        AlignifyCliError::Io(e)
    }
}

impl From<alignify_core::EngineError> for AlignifyCliError {
    fn from(e: alignify_core::EngineError) -> Self {
        AlignifyCliError::Engine(e)
    }
}

impl From<serde_json::Error> for AlignifyCliError {
    fn from(e: serde_json::Error) -> Self {
        AlignifyCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AlignifyCliError> for CliError {
    fn from(e: AlignifyCliError) -> Self {
        match e {
            AlignifyCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AlignifyCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'alignify validate' on the template".to_string()),
            },
            AlignifyCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AlignifyCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            AlignifyCliError::NoScoreableFrame => CliError {
                code: "NO_SCOREABLE_FRAME".to_string(),
                message: "No frame in the recording could be normalized".to_string(),
                hint: Some("Check landmark confidence on shoulders and hips".to_string()),
            },
            AlignifyCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            AlignifyCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
