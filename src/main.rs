// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use locbatch::app_config::{self, Config, TranslationProvider};
use locbatch::app_controller::{Controller, IndicatifSink};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    #[value(name = "deepl")]
    DeepL,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::DeepL => TranslationProvider::DeepL,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a CSV file or every CSV file under a directory
    Translate(TranslateArgs),

    /// Show the persisted queue
    Status,

    /// Reset failed rows of a queued file to pending
    Retry {
        /// Queued file, as a path or the name shown by `status`
        name: String,

        /// Only reset these row ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<usize>,
    },

    /// Write a queued file as CSV
    Export {
        /// Queued file, as a path or the name shown by `status`
        name: String,

        /// Output path
        output: PathBuf,
    },

    /// Manage glossary terms
    Glossary {
        #[command(subcommand)]
        action: GlossaryAction,
    },

    /// Inspect or clear the translation memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Generate shell completions for locbatch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum GlossaryAction {
    /// Add or replace a term
    Add { term: String, translation: String },
    /// Remove a term
    Remove { term: String },
    /// List all terms
    List,
    /// Import `term=translation` lines from a file
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum MemoryAction {
    /// Number of stored entries
    Stats,
    /// Delete every entry
    Clear,
    /// Look up one source text
    Lookup {
        source: String,
        /// Target language, defaults to the configured one
        #[arg(short, long)]
        target: Option<String>,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input CSV file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Directory for translated files (defaults to next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'de')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'uk', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Rows per backend request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// API key; repeat to add credentials to the rotation
    #[arg(short = 'k', long = "key")]
    keys: Vec<String>,

    /// Comma-separated Gemini API keys
    #[arg(long, env = "GEMINI_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    gemini_keys: Vec<String>,

    /// DeepL API key
    #[arg(long, env = "DEEPL_API_KEY", hide_env_values = true)]
    deepl_key: Option<String>,
}

/// locbatch - batch translation of localization CSV files
///
/// Queues CSV files of localization strings and translates the rows in
/// batches through Gemini or DeepL, with translation memory, a glossary and
/// credential rotation. Progress is persisted so interrupted runs resume.
#[derive(Parser, Debug)]
#[command(name = "locbatch")]
#[command(version)]
#[command(about = "Batch translation of localization CSV files")]
#[command(long_about = "locbatch translates CSV localization files in batches using Gemini or DeepL.

EXAMPLES:
    locbatch translate strings.csv                  # Translate using default config
    locbatch translate -f -o out/ locales/          # Whole directory, overwrite exports
    locbatch translate -p deepl -t de strings.csv   # Use DeepL, translate to German
    locbatch glossary add Caller Вабик              # Pin a term translation
    locbatch retry strings.csv                      # Reset failed rows
    locbatch completions bash > locbatch.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file doesn't
    exist, a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Max level is narrowed after the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "locbatch", &mut std::io::stdout());
        return Ok(());
    }

    let (mut config, created) = Config::load_or_create(&cli.config_path)?;
    if created {
        warn!("Config file not found at '{}', created a default one.", cli.config_path);
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Translate(args) => run_translate(config, args).await,
        Commands::Status => run_status(config),
        Commands::Retry { name, ids } => {
            let controller = Controller::with_config(config)?;
            let reset = controller.retry(&name, &ids)?;
            info!("{} rows of {} reset to pending", reset, name);
            Ok(())
        }
        Commands::Export { name, output } => {
            let controller = Controller::with_config(config)?;
            controller.export(&name, &output)?;
            info!("Success: {:?}", output);
            Ok(())
        }
        Commands::Glossary { action } => run_glossary(config, action),
        Commands::Memory { action } => run_memory(config, action),
        Commands::Completions { .. } => Ok(()),
    }
}

// @applies: CLI overrides on top of the loaded config
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(batch_size) = options.batch_size {
        config.translation.common.batch_size = batch_size;
    }

    let env_keys: Vec<String> = match config.translation.provider {
        TranslationProvider::Gemini => options.gemini_keys.clone(),
        TranslationProvider::DeepL => options.deepl_key.iter().cloned().collect(),
    };

    let provider_config = config.translation.active_provider_config_mut();
    if let Some(model) = &options.model {
        provider_config.model = model.clone();
    }
    if !options.keys.is_empty() {
        provider_config.api_keys = options.keys.clone();
    } else if provider_config.api_keys.iter().all(|k| k.trim().is_empty()) && !env_keys.is_empty() {
        provider_config.api_keys = env_keys;
    }
}

async fn run_translate(mut config: Config, options: TranslateArgs) -> Result<()> {
    apply_overrides(&mut config, &options);
    config.validate().context("Configuration validation failed")?;

    let controller = Controller::with_config(config)?;
    let mut orchestrator = controller
        .orchestrator()?
        .with_sink(Arc::new(IndicatifSink::new()));

    controller
        .translate(
            &mut orchestrator,
            &options.input_path,
            options.output_dir.as_deref(),
            options.force_overwrite,
        )
        .await?;
    Ok(())
}

fn run_status(config: Config) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let queue = controller.status()?;
    if queue.is_empty() {
        info!("Queue is empty");
    }
    for (entry, failed) in queue {
        println!(
            "{:<40} {:<10} {:>3}% {:>6}/{:<6} failed: {}",
            entry.name, entry.status, entry.progress, entry.completed_items, entry.total_items, failed
        );
    }
    Ok(())
}

fn run_glossary(config: Config, action: GlossaryAction) -> Result<()> {
    let controller = Controller::with_config(config)?;
    match action {
        GlossaryAction::Add { term, translation } => {
            controller.glossary_add(&term, &translation)?;
            info!("Glossary: {} = {}", term.trim(), translation.trim());
        }
        GlossaryAction::Remove { term } => {
            if controller.glossary_remove(&term)? {
                info!("Removed glossary term {}", term.trim());
            } else {
                warn!("Glossary term {} not found", term.trim());
            }
        }
        GlossaryAction::List => {
            for (term, translation) in controller.glossary_list()?.iter() {
                println!("{}={}", term, translation);
            }
        }
        GlossaryAction::Import { path } => {
            let imported = controller.glossary_import(&path)?;
            info!("Imported {} glossary terms from {:?}", imported, path);
        }
    }
    Ok(())
}

fn run_memory(config: Config, action: MemoryAction) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let memory = controller.memory()?;
    match action {
        MemoryAction::Stats => println!("{} entries", memory.len()),
        MemoryAction::Clear => {
            let removed = memory.clear()?;
            info!("Removed {} translation memory entries", removed);
        }
        MemoryAction::Lookup { source, target } => {
            let language = target.as_ref().unwrap_or(&controller.config().target_language);
            match memory.lookup(language, &source) {
                Some(target) => println!("{}", target),
                None => warn!("No {} translation memory entry for {:?}", language, source.trim()),
            }
        }
    }
    Ok(())
}
