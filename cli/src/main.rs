//! pdfknow CLI - knowledge extraction from PDF documents

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use crossbeam_channel::Receiver;
use indicatif::{ProgressBar, ProgressStyle};

use pdfknow::render::{to_json, write_json};
use pdfknow::{
    BatchRunner, BatchSummary, CategorySchema, ClassificationStatus, Config, DocumentReport,
    ExtractionMode, ExtractionOrchestrator, ExtractionResult, GeminiClient, JsonFormat,
    PromptBuilder,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "pdfknow")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract categorized knowledge from PDF documents", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge from one or more PDF files
    Extract(ExtractArgs),

    /// Show the detected document structure (no model call)
    Structure {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the full structure as JSON
        #[arg(long)]
        json: bool,

        /// JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print the prompt that would be sent to the model
    Prompt {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Extraction mode (defaults to the configured mode)
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct ExtractArgs {
    /// Input PDF files
    #[arg(value_name = "FILES", required = true)]
    inputs: Vec<PathBuf>,

    /// Extraction mode (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Output directory for <name>.knowledge.json files (stdout if not specified)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Documents processed at once
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output compact JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Body text only
    Standard,
    /// Body text plus headers, tables and footnotes
    Detailed,
}

impl From<Mode> for ExtractionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Standard => ExtractionMode::Standard,
            Mode::Detailed => ExtractionMode::Detailed,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract(args) => cmd_extract(args),
        Commands::Structure {
            input,
            json,
            config,
        } => cmd_structure(&input, json, config.as_deref()),
        Commands::Prompt {
            input,
            mode,
            config,
        } => cmd_prompt(&input, mode, config.as_deref()),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the verbosity flags.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> CliResult<Config> {
    let config = match path {
        Some(path) => {
            log::debug!("Loading configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => {
            log::debug!("No configuration file given, using defaults");
            Config::new()
        }
    };
    Ok(config)
}

fn resolve_mode(mode: Option<Mode>, config: &Config) -> ExtractionMode {
    mode.map(ExtractionMode::from)
        .unwrap_or(config.extraction.default_mode)
}

fn cmd_extract(args: ExtractArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(key) = args.api_key {
        config = config.with_api_key(key);
    }
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    let mode = resolve_mode(args.mode, &config);
    let format = if args.compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)?;
    }

    let client = GeminiClient::new(config.model.api_key.clone(), config.model.request_timeout())?;
    let runner = BatchRunner::new(ExtractionOrchestrator::new(config, client)?);
    let cancel = runner.cancel_token();

    let pb = ProgressBar::new(args.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("{} mode", mode));

    let (sender, receiver) = crossbeam_channel::unbounded();
    let writer = {
        let pb = pb.clone();
        let output = args.output.clone();
        thread::spawn(move || write_reports(receiver, output.as_deref(), format, &pb))
    };

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "{}",
                    "Interrupted: finishing running documents, skipping the rest".yellow()
                );
                on_interrupt.cancel();
            }
        });
        runner.run_streaming(args.inputs, mode, sender).await
    });

    writer.join().map_err(|_| "report writer panicked")?;
    pb.finish_and_clear();

    print_summary(&summary);

    if summary.failed > 0 {
        return Err(format!("{} document(s) could not be processed", summary.failed).into());
    }
    if cancel.is_cancelled() {
        return Err("batch cancelled".into());
    }
    Ok(())
}

/// Write each report as it arrives.
fn write_reports(
    receiver: Receiver<DocumentReport>,
    output: Option<&Path>,
    format: JsonFormat,
    pb: &ProgressBar,
) {
    for report in receiver {
        pb.inc(1);
        pb.println(status_line(&report));
        for warning in &report.warnings {
            log::debug!("{}: {}", report.source, warning);
        }

        let Some(knowledge) = &report.knowledge else {
            continue;
        };
        let written = match output {
            Some(dir) => {
                let path = dir.join(format!("{}.knowledge.json", file_stem(&report)));
                write_json(knowledge, &path, format).map(|_| Some(path))
            }
            None => to_json(knowledge, format).map(|json| {
                pb.suspend(|| println!("{}", json));
                None
            }),
        };
        match written {
            Ok(Some(path)) => {
                log::info!("{}: wrote {}", report.source, path.display());
                pb.println(format!("  {} {}", "└─".dimmed(), path.display()));
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("{}: could not write record: {}", report.source, e);
                pb.println(format!(
                    "  {} {}: {}",
                    "Error".red().bold(),
                    report.source,
                    e
                ));
            }
        }
    }
}

fn file_stem(report: &DocumentReport) -> String {
    report
        .path
        .as_deref()
        .unwrap_or_else(|| Path::new(&report.source))
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.source.clone())
}

fn status_line(report: &DocumentReport) -> String {
    let Some(knowledge) = &report.knowledge else {
        return format!(
            "{} {}: {}",
            "✗".red().bold(),
            report.source,
            report.error.as_deref().unwrap_or("failed")
        );
    };
    let items = format!(
        "{} items in {} categories",
        knowledge.total_items(),
        knowledge.populated_count()
    );
    match knowledge.status() {
        ClassificationStatus::Complete => {
            format!("{} {} ({})", "✓".green().bold(), report.source, items)
        }
        ClassificationStatus::Degraded => format!(
            "{} {} degraded ({}, {} warnings)",
            "!".yellow().bold(),
            report.source,
            items,
            report.warnings.len()
        ),
        ClassificationStatus::Failed => format!(
            "{} {} classification failed, structural detail only ({} warnings)",
            "!".yellow().bold(),
            report.source,
            report.warnings.len()
        ),
    }
}

fn print_summary(summary: &BatchSummary) {
    println!("\n{}", "Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Complete".bold(), summary.complete);
    println!("{}: {}", "Degraded".bold(), summary.degraded);
    println!("{}: {}", "Failed".bold(), summary.failed);
    if !summary.skipped.is_empty() {
        println!("{}: {}", "Skipped".bold(), summary.skipped.len());
        for path in &summary.skipped {
            println!("  {} {}", "─".dimmed(), path.display());
        }
    }
    println!("{}: {:.1?}", "Elapsed".bold(), summary.elapsed);
}

fn cmd_structure(input: &Path, json: bool, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let extraction = pdfknow::extract_structure(input, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction)?);
        return Ok(());
    }

    print_structure(input, &extraction);
    Ok(())
}

fn print_structure(input: &Path, extraction: &ExtractionResult) {
    println!("{}", "Document Structure".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    if let Some(title) = extraction.title() {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(author) = extraction.author() {
        println!("{}: {}", "Author".bold(), author);
    }
    println!(
        "{}: {} of {}",
        "Pages".bold(),
        extraction.page_count(),
        extraction.total_pages()
    );

    if !extraction.headers().is_empty() {
        println!("\n{} ({})", "Headers".cyan().bold(), extraction.headers_found());
        for header in extraction.headers() {
            let indent = "  ".repeat(usize::from(header.level.saturating_sub(1)));
            println!(
                "  {}{} {}",
                indent,
                header.text,
                format!("(p.{})", header.page_number).dimmed()
            );
        }
    }

    if !extraction.tables().is_empty() {
        println!("\n{} ({})", "Tables".cyan().bold(), extraction.tables_found());
        for table in extraction.tables() {
            println!(
                "  p.{}: {}x{} {}",
                table.page_number,
                table.row_count(),
                table.column_count(),
                table.summary(1).dimmed()
            );
        }
    }

    if !extraction.footnotes().is_empty() {
        println!("\n{} ({})", "Footnotes".cyan().bold(), extraction.footnotes_found());
        for footnote in extraction.footnotes() {
            println!("  p.{}: {}", footnote.page_number, footnote.text);
        }
    }

    if !extraction.warnings().is_empty() {
        println!("\n{}", "Warnings".yellow().bold());
        for warning in extraction.warnings() {
            println!("  {}", warning);
        }
    }
}

fn cmd_prompt(input: &Path, mode: Option<Mode>, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let mode = resolve_mode(mode, &config);
    let extraction = pdfknow::extract_structure(input, &config)?;

    let schema = CategorySchema::from_config(&config.prompts);
    let prompt = PromptBuilder::new(&schema, &config.prompts, config.extraction.max_prompt_chars)
        .build(&extraction, mode);

    println!("{}", prompt.text);
    if prompt.truncated {
        eprintln!(
            "{}",
            "Note: document content was truncated to fit the prompt budget".yellow()
        );
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfknow".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF knowledge extraction tool");
    println!();
    println!("Library: pdfknow {}", pdfknow::VERSION);
    println!("License: MIT");
}
