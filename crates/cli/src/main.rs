mod config;
mod logging;
mod sink;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use fleetform_core::{FleetSettings, GenerateError};
use sha2::{Digest, Sha256};

use crate::sink::Sink;

/// Output format for error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// EC2 autoscaling fleet template generator.
#[derive(Parser)]
#[command(
    name = "fleetform",
    version,
    about = "EC2 autoscaling fleet template generator"
)]
struct Cli {
    /// Output format for errors (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the fleet template
    Generate {
        /// TOML settings file (built-in defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the template to this file instead of stdout
        #[arg(long, conflicts_with = "write")]
        out: Option<PathBuf>,
        /// Write the template to <program-name>.json in the working directory
        #[arg(long)]
        write: bool,
    },

    /// Build and validate the template without printing it
    Check {
        /// TOML settings file (built-in defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check an existing template document against the structural JSON Schema
    Validate {
        /// Path to the template JSON file
        document: PathBuf,
    },

    /// Print the SHA-256 of the generated template
    Digest {
        /// TOML settings file (built-in defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective settings as TOML
    Settings {
        /// TOML settings file (built-in defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { config, out, write } => {
            cmd_generate(config.as_deref(), Sink::from_flags(out, write), cli.output, cli.quiet);
        }
        Commands::Check { config } => {
            cmd_check(config.as_deref(), cli.output, cli.quiet);
        }
        Commands::Validate { document } => {
            cmd_validate(&document, cli.output, cli.quiet);
        }
        Commands::Digest { config } => {
            cmd_digest(config.as_deref(), cli.output, cli.quiet);
        }
        Commands::Settings { config } => {
            cmd_settings(config.as_deref(), cli.output, cli.quiet);
        }
    }
}

fn load_or_exit(config: Option<&Path>, output: OutputFormat, quiet: bool) -> FleetSettings {
    match config::load_settings(config) {
        Ok(settings) => settings,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn generate_or_exit(settings: &FleetSettings, output: OutputFormat, quiet: bool) -> String {
    match fleetform_core::generate(settings) {
        Ok(text) => text,
        Err(e) => {
            report_generate_error(&e, output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_generate(config: Option<&Path>, sink: Sink, output: OutputFormat, quiet: bool) {
    let settings = load_or_exit(config, output, quiet);
    let text = generate_or_exit(&settings, output, quiet);
    if let Err(e) = sink.write(&text) {
        let target = match &sink {
            Sink::Stdout => "stdout".to_owned(),
            Sink::File(path) => format!("'{}'", path.display()),
        };
        report_error(&format!("error writing {}: {}", target, e), output, quiet);
        process::exit(1);
    }
    if let Sink::File(path) = &sink {
        if !quiet {
            eprintln!("wrote {}", path.display());
        }
    }
}

fn cmd_check(config: Option<&Path>, output: OutputFormat, quiet: bool) {
    let settings = load_or_exit(config, output, quiet);
    let template = match fleetform_core::build_fleet_template(&settings) {
        Ok(t) => t,
        Err(e) => {
            report_generate_error(&GenerateError::Schema(e), output, quiet);
            process::exit(1);
        }
    };
    let resources = template.resources.len();
    if let Err(errors) = fleetform_core::validate(template) {
        report_generate_error(&GenerateError::Validation(errors), output, quiet);
        process::exit(1);
    }
    if !quiet {
        match output {
            OutputFormat::Text => println!("template is valid ({} resources)", resources),
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "valid": true, "resources": resources })
            ),
        }
    }
}

static TEMPLATE_SCHEMA_STR: &str = include_str!("../../../schema/template-schema.json");

fn cmd_validate(document: &Path, output: OutputFormat, quiet: bool) {
    let schema: serde_json::Value = match serde_json::from_str(TEMPLATE_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("internal error: failed to parse embedded template schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("internal error: failed to compile embedded template schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let doc_str = match std::fs::read_to_string(document) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", document.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&doc_str) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", document.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let errors: Vec<String> = validator.iter_errors(&doc).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        for e in &errors {
            report_error(&format!("schema violation: {}", e), output, quiet);
        }
        process::exit(1);
    }
    if !quiet {
        match output {
            OutputFormat::Text => println!("{}: valid", document.display()),
            OutputFormat::Json => println!("{}", serde_json::json!({ "valid": true })),
        }
    }
}

fn cmd_digest(config: Option<&Path>, output: OutputFormat, quiet: bool) {
    let settings = load_or_exit(config, output, quiet);
    let text = generate_or_exit(&settings, output, quiet);
    write_stdout(&format!("{}\n", compute_digest(&text)), output, quiet);
}

fn cmd_settings(config: Option<&Path>, output: OutputFormat, quiet: bool) {
    let settings = load_or_exit(config, output, quiet);
    match config::render_settings(&settings) {
        Ok(text) => write_stdout(&text, output, quiet),
        Err(e) => {
            report_error(&format!("error rendering settings: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn write_stdout(text: &str, output: OutputFormat, quiet: bool) {
    if let Err(e) = Sink::Stdout.write(text) {
        report_error(&format!("error writing stdout: {}", e), output, quiet);
        process::exit(1);
    }
}

/// Hex SHA-256 of the template text.
fn compute_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn report_generate_error(e: &GenerateError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if !quiet {
                for line in e.lines() {
                    eprintln!("{}", line);
                }
            }
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
