//! sqm CLI - Interpret object queries into the semantic query model
//!
//! Usage:
//!   sqm interpret <query> [--model <file.toml> | --demo-model] [--format tree|json] [--strict]
//!   sqm split <query> [--model <file.toml> | --demo-model] [--format tree|json]
//!   sqm check <queries.txt> [--model <file.toml> | --demo-model]
//!
//! Examples:
//!   sqm interpret "select o from Order o where o.customer.name = :name" --demo-model
//!   sqm split "select p from Payment p" --demo-model --format json
//!   sqm check queries.txt --model shop.toml

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqm::config::Settings;
use sqm::domain::{fixtures, loader, DomainModel};
use sqm::interpret::{self, InterpretError, InterpretOptions};
use sqm::parser::Diagnostic;
use sqm::sqm::{render, SqmStatement};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqm")]
#[command(about = "sqm - Interpret object queries into a typed semantic query model")]
#[command(version)]
struct Cli {
    /// Path to a sqm.toml settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a query and print its semantic model
    Interpret {
        /// The query text
        query: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Output format
        #[arg(short, long, default_value = "tree")]
        format: OutputFormat,
    },

    /// Interpret a query and split it per concrete implementor of its root
    Split {
        /// The query text
        query: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Output format
        #[arg(short, long, default_value = "tree")]
        format: OutputFormat,
    },

    /// Interpret every non-empty line of a file, reporting errors
    Check {
        /// Path to the query file
        file: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Path to a TOML domain model definition
    #[arg(short, long, conflicts_with = "demo_model")]
    model: Option<PathBuf>,

    /// Use the built-in shop model
    #[arg(long)]
    demo_model: bool,

    /// Enforce strict JPQL compliance
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Indented tree
    Tree,
    /// JSON document
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&settings);

    match cli.command {
        Commands::Interpret {
            query,
            model,
            format,
        } => cmd_interpret(&settings, &query, &model, format),
        Commands::Split {
            query,
            model,
            format,
        } => cmd_split(&settings, &query, &model, format),
        Commands::Check { file, model } => cmd_check(&settings, file, &model),
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_model(settings: &Settings, args: &ModelArgs) -> Result<DomainModel, String> {
    if args.demo_model {
        return Ok(fixtures::shop_model());
    }
    let path = match &args.model {
        Some(path) => path.clone(),
        None => settings
            .model
            .resolved_path()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no model given: pass --model <file> or --demo-model".to_string())?,
    };
    loader::load_model(&path).map_err(|e| format!("Error loading model '{}': {}", path.display(), e))
}

fn options(settings: &Settings, args: &ModelArgs) -> InterpretOptions {
    let options = settings.interpret_options();
    if args.strict {
        options.with_strict_jpa_compliance(true)
    } else {
        options
    }
}

fn cmd_interpret(settings: &Settings, query: &str, args: &ModelArgs, format: OutputFormat) -> ExitCode {
    let model = match load_model(settings, args) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match interpret::interpret(query, &model, options(settings, args)) {
        Ok(statement) => {
            print_statement(&statement, &format);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_error("query", query, &e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_split(settings: &Settings, query: &str, args: &ModelArgs, format: OutputFormat) -> ExitCode {
    let model = match load_model(settings, args) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = interpret::interpret(query, &model, options(settings, args))
        .and_then(|statement| interpret::split(&Arc::new(statement), &model));

    match result {
        Ok(statements) => {
            for (i, statement) in statements.iter().enumerate() {
                if statements.len() > 1 {
                    println!("-- {} of {}", i + 1, statements.len());
                }
                print_statement(statement, &format);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_error("query", query, &e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(settings: &Settings, file: PathBuf, args: &ModelArgs) -> ExitCode {
    let source = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let model = match load_model(settings, args) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let options = options(settings, args);

    let mut checked = 0;
    let mut failed = 0;
    for (number, line) in source.lines().enumerate() {
        let query = line.trim();
        if query.is_empty() || query.starts_with("--") {
            continue;
        }
        checked += 1;
        if let Err(e) = interpret::interpret(query, &model, options) {
            failed += 1;
            report_error(&format!("{}:{}", file.display(), number + 1), query, &e);
        }
    }

    if failed > 0 {
        eprintln!("{} of {} queries failed", failed, checked);
        return ExitCode::FAILURE;
    }
    println!("OK: {} queries in {} are valid", checked, file.display());
    ExitCode::SUCCESS
}

fn print_statement(statement: &SqmStatement, format: &OutputFormat) {
    match format {
        OutputFormat::Tree => print!("{}", render(statement)),
        OutputFormat::Json => match serde_json::to_string_pretty(statement) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing statement: {}", e),
        },
    }
}

fn report_error(origin: &str, query: &str, error: &InterpretError) {
    match error {
        InterpretError::Syntax(diagnostics) => {
            for diag in diagnostics {
                print_diagnostic(origin, query, diag);
            }
        }
        other => eprintln!("{}: {}", origin, other),
    }
}

fn print_diagnostic(origin: &str, query: &str, diag: &Diagnostic) {
    let span = diag.span.clone();
    let printed = Report::build(ReportKind::Error, span.clone())
        .with_message(format!("{}: syntax error", origin))
        .with_label(
            Label::new(span)
                .with_message(&diag.message)
                .with_color(Color::Red),
        )
        .finish()
        .eprint(Source::from(query));
    if printed.is_err() {
        eprintln!("{}: {}", origin, diag);
    }
}
