// gridassist CLI - headless AI-assisted data entry over CSV grids

mod exit_codes;
mod grid_io;

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use serde::Serialize;

use gridassist_ai::{
    extract, quote, Content, Conversation, ExtractError, Gateway, GatewayError, GeminiBackend,
    InvokeRequest, ModelPlan, Proposal, QuoteError, ReferenceDocument, TurnRole,
};
use gridassist_config::ai::{set_api_key, AIConfigStatus, AIDiagnostics, ResolvedAIConfig};
use gridassist_config::settings::{AIProvider, Settings};
use gridassist_core::{Row, SourceId, SourceRef};
use gridassist_engine::{Document, MergeReport};

// Re-export exit codes from registry (single source of truth)
use exit_codes::{
    EXIT_SUCCESS, EXIT_USAGE, EXIT_IO, EXIT_GRID_PARSE,
    EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_AI_CONFIG, EXIT_AI_EXHAUSTED,
    EXIT_AI_MALFORMED, EXIT_AI_PARTIAL, EXIT_AI_KEYCHAIN,
};

/// Label shown for the provenance of quoted cells.
const QUOTE_SESSION_LABEL: &str = "Auto-quote";

#[derive(Parser)]
#[command(name = "gridassist")]
#[command(about = "AI-assisted data entry for spreadsheet grids (CLI mode, headless)")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (default: ~/.config/gridassist/settings.json)
    #[arg(long, global = true, env = "GRIDASSIST_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract rows from reference files into a grid
    #[command(after_help = "\
Examples:
  gridassist extract bom.csv --reference datasheet.pdf -o bom.csv
  gridassist extract bom.csv -r board.pdf -r stock.csv -o out.csv --provenance out.json

Files are processed one at a time, in order. A file that fails is reported
and the batch continues; the exit code is 15 if any file failed.")]
    Extract {
        /// Grid CSV (first row is the header)
        grid: PathBuf,

        /// Reference file to extract from (repeatable)
        #[arg(long, short = 'r', required = true)]
        reference: Vec<PathBuf>,

        /// Write the resulting grid here (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write a provenance JSON file here
        #[arg(long)]
        provenance: Option<PathBuf>,
    },

    /// Look up supplier quotes for grid rows using web search
    #[command(after_help = "\
Examples:
  gridassist quote bom.csv -o quoted.csv
  gridassist quote bom.csv --row 3 -o quoted.csv

Adds Price/Unit, Net Price and Est. Delivery columns if the grid lacks them.")]
    Quote {
        /// Grid CSV (first row is the header)
        grid: PathBuf,

        /// Quote only this data row (1 = first row after the header)
        #[arg(long)]
        row: Option<usize>,

        /// Write the resulting grid here (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write a provenance JSON file here
        #[arg(long)]
        provenance: Option<PathBuf>,
    },

    /// Ask the assistant to edit a grid
    #[command(after_help = "\
Examples:
  gridassist chat bom.csv \"double the quantity of R1\" -o bom.csv
  gridassist chat bom.csv \"add the parts from this sheet\" --attach sheet.pdf -o bom.csv

The reply is printed on stdout. Without -o the proposed edit is not saved.")]
    Chat {
        /// Grid CSV (first row is the header)
        grid: PathBuf,

        /// Message to send
        message: String,

        /// File to attach to the message (repeatable)
        #[arg(long, short = 'a')]
        attach: Vec<PathBuf>,

        /// Write the edited grid here
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write a provenance JSON file here
        #[arg(long)]
        provenance: Option<PathBuf>,
    },

    /// AI provider configuration and diagnostics
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Check AI configuration and connectivity
    Doctor {
        /// Output as JSON for machine parsing
        #[arg(long)]
        json: bool,

        /// Test provider connectivity (requires network)
        #[arg(long)]
        test: bool,
    },

    /// Store an API key (read from stdin) in the system keychain
    SetKey {
        /// Provider the key belongs to
        #[arg(long, default_value = "gemini")]
        provider: String,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  gridassist-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
            "\nprovenance_export_version: 1",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  gridassist-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
            "\nprovenance_export_version: 1",
        )
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    }
    builder.target(Target::Stderr).format_timestamp(None);
    let _ = builder.try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::from(EXIT_USAGE);
    };

    let settings = match cli.config.as_deref() {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let result = match command {
        Commands::Extract { grid, reference, output, provenance } => {
            cmd_extract(&settings, grid, reference, output, provenance)
        }
        Commands::Quote { grid, row, output, provenance } => {
            cmd_quote(&settings, grid, row, output, provenance)
        }
        Commands::Chat { grid, message, attach, output, provenance } => {
            cmd_chat(&settings, grid, message, attach, output, provenance)
        }
        Commands::Ai { command } => match command {
            AiCommands::Doctor { json, test } => cmd_ai_doctor(&settings, json, test),
            AiCommands::SetKey { provider } => cmd_ai_set_key(provider),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_GRID_PARSE, message: msg.into(), hint: None }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self { code: EXIT_AI_MALFORMED, message: msg.into(), hint: None }
    }

    /// Create error from a gateway failure with the proper exit code.
    pub fn gateway(err: &GatewayError) -> Self {
        match err {
            GatewayError::NoModels => Self {
                code: EXIT_AI_CONFIG,
                message: err.to_string(),
                hint: Some("set ai.models in settings.json".to_string()),
            },
            GatewayError::AllModelsExhausted { .. } => Self {
                code: EXIT_AI_EXHAUSTED,
                message: err.to_string(),
                hint: Some("run `gridassist ai doctor --test` to check connectivity".to_string()),
            },
        }
    }

    /// Error for an AI configuration that is not ready, `None` if it is.
    pub fn ai_status(config: &ResolvedAIConfig) -> Option<Self> {
        let reason = config.blocking_reason.clone().unwrap_or_else(|| "unknown".to_string());
        match config.status {
            AIConfigStatus::Ready => None,
            AIConfigStatus::Disabled => Some(Self {
                code: EXIT_AI_DISABLED,
                message: "AI is disabled".to_string(),
                hint: Some(format!("set ai.provider in {}", Settings::config_path_display())),
            }),
            AIConfigStatus::MissingKey => Some(Self {
                code: EXIT_AI_MISSING_KEY,
                message: format!("AI misconfigured: {}", reason),
                hint: Some("run `gridassist ai set-key` or export the environment variable".to_string()),
            }),
            AIConfigStatus::Error => Some(Self {
                code: EXIT_AI_CONFIG,
                message: format!("AI misconfigured: {}", reason),
                hint: None,
            }),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<ExtractError> for CliError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Gateway(e) => CliError::gateway(&e),
            ExtractError::Malformed(_) => CliError::malformed(err.to_string()),
        }
    }
}

impl From<QuoteError> for CliError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::Gateway(e) => CliError::gateway(&e),
            other => CliError::malformed(other.to_string()),
        }
    }
}

// ============================================================================
// Shared plumbing
// ============================================================================

/// Resolve the AI configuration and refuse to continue unless it is ready.
fn ready_config(settings: &Settings) -> Result<ResolvedAIConfig, CliError> {
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    match CliError::ai_status(&config) {
        Some(err) => Err(err),
        None => Ok(config),
    }
}

fn connect(config: &ResolvedAIConfig) -> Result<Gateway<GeminiBackend>, CliError> {
    match config.provider {
        AIProvider::Gemini => {
            let backend = GeminiBackend::from_config(config).map_err(|e| CliError {
                code: EXIT_AI_CONFIG,
                message: e.to_string(),
                hint: None,
            })?;
            Ok(Gateway::new(backend))
        }
        AIProvider::None => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: "AI is disabled".to_string(),
            hint: None,
        }),
    }
}

fn model_plan(config: &ResolvedAIConfig) -> ModelPlan {
    ModelPlan::new(config.models.clone())
        .starting_at(config.start_model.clone())
        .with_temperature(config.temperature)
}

fn retry_notice(failed: &str, next: &str) {
    eprintln!("note: {} did not respond. Retrying with {}.", failed, next);
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write the grid (stdout when `output` is None) and the provenance sidecar
/// when one is requested or enabled in settings.
fn write_results(
    doc: &Document,
    settings: &Settings,
    output: Option<&Path>,
    provenance: Option<&Path>,
) -> Result<(), CliError> {
    grid_io::write_grid(doc.grid(), output)?;

    let sidecar = match (provenance, output) {
        (Some(path), _) => Some(path.to_path_buf()),
        (None, Some(out)) if settings.provenance_sidecar => Some(grid_io::sidecar_path(out)),
        _ => None,
    };
    if let Some(path) = sidecar {
        grid_io::write_provenance(doc, &path)?;
    }
    Ok(())
}

fn report_merge(name: &str, report: &MergeReport) {
    if !report.columns_added.is_empty() {
        eprintln!("{}: added columns {}", name, report.columns_added.join(", "));
    }
    eprintln!(
        "{}: {} rows added, {} updated, {} removed, {} cells tagged",
        name, report.rows_added, report.rows_updated, report.rows_removed, report.cells_tagged
    );
    if report.citations_dropped > 0 {
        eprintln!("{}: {} citations dropped (invalid)", name, report.citations_dropped);
    }
    if report.skipped > 0 {
        eprintln!("{}: {} results could not be matched to a row", name, report.skipped);
    }
}

// ============================================================================
// extract
// ============================================================================

fn cmd_extract(
    settings: &Settings,
    grid: PathBuf,
    references: Vec<PathBuf>,
    output: Option<PathBuf>,
    provenance: Option<PathBuf>,
) -> Result<(), CliError> {
    let grid = grid_io::read_grid(&grid)?;
    let config = ready_config(settings)?;
    let gateway = connect(&config)?;
    let plan = model_plan(&config);

    let mut doc = Document::new(grid);
    let mut failed = 0;

    // Sequential on purpose: each merge appends after the rows of the last.
    for path in &references {
        let name = display_name(path);
        let source = doc.add_reference_file(name.clone()).source_ref();
        let columns = doc.grid().first().cloned().unwrap_or_default();

        let report = match ReferenceDocument::from_path(path) {
            Ok(reference) => match extract(&gateway, &reference, &columns, &plan, retry_notice) {
                Ok(extraction) => {
                    log::debug!("'{}' answered by {}", name, extraction.final_model);
                    doc.merge_extraction(&source, &extraction.rows)
                }
                Err(e) => doc.fail_extraction(&source, e.to_string()),
            },
            Err(e) => doc.fail_extraction(&source, e.to_string()),
        };

        match &report.error {
            Some(err) => {
                failed += 1;
                eprintln!("{}: error: {}", name, err);
            }
            None => report_merge(&name, &report),
        }
    }

    write_results(&doc, settings, output.as_deref(), provenance.as_deref())?;

    if failed > 0 {
        return Err(CliError {
            code: EXIT_AI_PARTIAL,
            message: format!("{} of {} reference files failed", failed, references.len()),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// quote
// ============================================================================

fn cmd_quote(
    settings: &Settings,
    grid: PathBuf,
    row: Option<usize>,
    output: Option<PathBuf>,
    provenance: Option<PathBuf>,
) -> Result<(), CliError> {
    let grid = grid_io::read_grid(&grid)?;

    let targets: Vec<usize> = match row {
        None => (1..grid.len()).collect(),
        Some(r) if r >= 1 && r < grid.len() => vec![r],
        Some(r) if grid.len() < 2 => {
            return Err(CliError::args(format!("--row {}: the grid has no data rows", r)));
        }
        Some(r) => {
            return Err(CliError::args(format!("--row {} is out of range", r))
                .with_hint(format!("data rows are 1..={}", grid.len() - 1)));
        }
    };

    let config = ready_config(settings)?;
    let gateway = connect(&config)?;
    let plan = model_plan(&config).with_temperature(config.search_temperature);

    let mut doc = Document::new(grid);
    let headers = doc.grid().first().cloned().unwrap_or_default();
    let rows: Vec<Row> = targets.iter().map(|&r| doc.grid()[r].clone()).collect();

    let quotes = quote(&gateway, &headers, &rows, &plan, retry_notice)?;
    for row_id in &quotes.missing {
        if let Some(row) = row_id.checked_sub(1).and_then(|i| targets.get(i)) {
            eprintln!("row {}: no quote returned", row);
        }
    }

    let session = SourceRef::new(SourceId::generate(), QUOTE_SESSION_LABEL);
    let report = doc.merge_quotes(&session, &targets, &quotes.rows);
    report_merge(QUOTE_SESSION_LABEL, &report);

    write_results(&doc, settings, output.as_deref(), provenance.as_deref())
}

// ============================================================================
// chat
// ============================================================================

fn cmd_chat(
    settings: &Settings,
    grid: PathBuf,
    message: String,
    attach: Vec<PathBuf>,
    output: Option<PathBuf>,
    provenance: Option<PathBuf>,
) -> Result<(), CliError> {
    let grid = grid_io::read_grid(&grid)?;
    let attachments = attach
        .iter()
        .map(|path| ReferenceDocument::from_path(path).map_err(|e| CliError::io(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    let config = ready_config(settings)?;
    let gateway = connect(&config)?;
    let plan = model_plan(&config);

    let mut doc = Document::new(grid);
    let mut chat = Conversation::new();
    let outcome = chat.send(&gateway, &plan, &message, &attachments, doc.grid());

    for turn in chat.turns() {
        match turn.role {
            TurnRole::System => eprintln!("note: {}", turn.text),
            TurnRole::Model if !turn.is_error => println!("{}", turn.text),
            TurnRole::Model | TurnRole::User => {}
        }
    }

    if let Some(err) = outcome.error {
        return Err(CliError {
            code: EXIT_AI_EXHAUSTED,
            message: err,
            hint: Some("run `gridassist ai doctor --test` to check connectivity".to_string()),
        });
    }

    let report = match outcome.proposal {
        Some(Proposal::Rows(rows)) => doc.merge_chat_rows(&rows),
        Some(Proposal::Replace(grid)) => doc.merge_chat_replace(grid),
        None => {
            log::info!("no grid changes proposed");
            return match provenance {
                Some(path) => grid_io::write_provenance(&doc, &path),
                None => Ok(()),
            };
        }
    };

    if let Some(err) = &report.error {
        eprintln!("warning: {}", err);
    } else {
        if report.replaced_all {
            eprintln!("warning: the assistant replaced the whole grid");
        }
        report_merge("chat", &report);
    }

    match output {
        Some(out) => write_results(&doc, settings, Some(&out), provenance.as_deref()),
        None => {
            eprintln!("hint:  pass -o FILE to save the edited grid");
            match provenance {
                Some(path) => grid_io::write_provenance(&doc, &path),
                None => Ok(()),
            }
        }
    }
}

// ============================================================================
// ai
// ============================================================================

#[derive(Debug, Serialize)]
struct ConnectivityTest {
    ok: bool,
    model: Option<String>,
    fell_back: bool,
    error: Option<String>,
}

impl fmt::Display for ConnectivityTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.model, &self.error) {
            (Some(model), _) if self.fell_back => write!(f, "ok ({}, after fallback)", model),
            (Some(model), _) => write!(f, "ok ({})", model),
            (None, Some(err)) => write!(f, "failed: {}", err),
            (None, None) => write!(f, "failed"),
        }
    }
}

fn connectivity_test(config: &ResolvedAIConfig) -> ConnectivityTest {
    let gateway = match connect(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            return ConnectivityTest { ok: false, model: None, fell_back: false, error: Some(e.message) };
        }
    };

    let request = InvokeRequest::new(
        &model_plan(config),
        vec![Content::user_text("Reply with the single word OK.")],
    );
    match gateway.invoke_quiet(&request) {
        Ok(invocation) => ConnectivityTest {
            ok: true,
            fell_back: invocation.fell_back(),
            model: Some(invocation.final_model),
            error: None,
        },
        Err(e) => ConnectivityTest { ok: false, model: None, fell_back: false, error: Some(e.to_string()) },
    }
}

fn cmd_ai_doctor(settings: &Settings, json: bool, test: bool) -> Result<(), CliError> {
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    let diag = AIDiagnostics::from_resolved(&config);

    let test_result = if test && config.status.is_ready() {
        Some(connectivity_test(&config))
    } else {
        None
    };

    if json {
        let mut value = serde_json::to_value(&diag).map_err(|e| CliError::io(e.to_string()))?;
        if let Some(result) = &test_result {
            value["test"] = serde_json::to_value(result).map_err(|e| CliError::io(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&value).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
    } else {
        print!("{}", diag);
        if let Some(result) = &test_result {
            println!("test:            {}", result);
        }
    }

    // Determine exit code based on status
    if let Some(mut err) = CliError::ai_status(&config) {
        // The report already carries the fix instructions.
        err.hint = None;
        return Err(err);
    }
    match test_result {
        Some(result) if !result.ok => Err(CliError {
            code: EXIT_AI_EXHAUSTED,
            message: "connectivity test failed".to_string(),
            hint: None,
        }),
        _ => Ok(()),
    }
}

fn cmd_ai_set_key(provider: String) -> Result<(), CliError> {
    let mut key = String::new();
    io::stdin()
        .read_to_string(&mut key)
        .map_err(|e| CliError::io(e.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::args("no key on stdin")
            .with_hint("echo \"$KEY\" | gridassist ai set-key"));
    }

    set_api_key(&provider, key).map_err(|e| CliError {
        code: EXIT_AI_KEYCHAIN,
        message: format!("keychain: {}", e),
        hint: Some(format!(
            "set {} instead",
            gridassist_config::ai::env_var_name(&provider)
        )),
    })?;
    eprintln!("Stored {} key in the system keychain", provider);
    Ok(())
}
