use std::path::PathBuf;

use sleuth::cli::{Cli, Commands, ConfigAction};
use sleuth::config::{expand_tilde, Config, ConfigValidator, Credentials};
use sleuth::daemon::Daemon;
use sleuth::error::{Result, SleuthError};
use sleuth::storage::{Database, Inquiry, InquiryStatus};

fn main() -> Result<()> {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Handle commands
    match cli.command {
        Commands::Serve { bind } => {
            let mut config = Config::load_or_default(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
                ConfigValidator::validate(&config)?;
            }
            init_logging(cli.verbose, config.server.env == "production");
            cmd_serve(config)?;
        }
        Commands::Status { limit } => {
            init_logging(cli.verbose, false);
            cmd_status(cli.config, limit)?;
        }
        Commands::Show { message_id, json } => {
            init_logging(cli.verbose, false);
            cmd_show(cli.config, &message_id, json)?;
        }
        Commands::Config { action } => {
            init_logging(cli.verbose, false);
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "sleuth=debug" } else { "sleuth=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn cmd_serve(config: Config) -> Result<()> {
    tracing::info!("Starting sleuth webhook server...");

    let credentials = Credentials::from_env(&config);
    tracing::debug!(?credentials, "Credentials resolved");

    let runtime = tokio::runtime::Runtime::new().map_err(|e| SleuthError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    runtime.block_on(async {
        let daemon = Daemon::new(config, credentials)?;
        daemon.run().await
    })
}

fn open_database(config_path: Option<PathBuf>) -> Result<Database> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let db_path = expand_tilde(&config.storage.db_path);

    if !db_path.exists() {
        return Err(SleuthError::Config(format!(
            "No database at {}. Run 'sleuth serve' first.",
            db_path.display()
        )));
    }

    Database::new(&db_path)
}

fn cmd_status(config_path: Option<PathBuf>, limit: usize) -> Result<()> {
    let db = open_database(config_path)?;
    let stats = db.stats()?;

    println!("Sleuth Status");
    println!("─────────────────────────────────────");
    println!("  Inquiries:      {}", stats.inquiry_count);
    println!("    completed:    {}", stats.completed_count);
    println!("    failed:       {}", stats.failed_count);
    println!("    in flight:    {}", stats.in_flight_count);
    println!("  Search results: {}", stats.search_result_count);
    println!("  Reactions:      {}", stats.reaction_event_count);

    let inquiries = db.list_recent_inquiries(limit)?;
    if inquiries.is_empty() {
        println!();
        println!("No inquiries yet.");
        return Ok(());
    }

    println!();
    println!("Recent inquiries:");
    for inquiry in &inquiries {
        println!(
            "  {} {:<10} {}  {}",
            status_marker(inquiry.status),
            inquiry.status,
            inquiry.created_at.format("%Y-%m-%d %H:%M"),
            inquiry.message_id
        );
        println!("      {}", first_line(&inquiry.message_text, 72));
    }

    Ok(())
}

fn cmd_show(config_path: Option<PathBuf>, message_id: &str, json: bool) -> Result<()> {
    let db = open_database(config_path)?;
    let inquiry = db
        .get_inquiry_by_message_id(message_id)?
        .ok_or_else(|| SleuthError::InquiryNotFound(message_id.to_string()))?;

    if json {
        let out = serde_json::to_string_pretty(&inquiry).map_err(|e| SleuthError::Json {
            source: e,
            context: "Failed to serialize inquiry".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    print_inquiry(&inquiry);
    Ok(())
}

fn print_inquiry(inquiry: &Inquiry) {
    println!("Inquiry #{} ({})", inquiry.id, inquiry.status);
    println!("  Message:   {} in {}", inquiry.message_id, inquiry.channel_id);
    println!("  User:      {}", inquiry.user_id);
    println!("  Created:   {}", inquiry.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(processed_at) = inquiry.processed_at {
        println!("  Processed: {}", processed_at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("  Replied:   {}", if inquiry.response_sent { "yes" } else { "no" });
    println!();
    println!("{}", inquiry.message_text);

    if !inquiry.response_text.is_empty() {
        println!();
        println!("Response:");
        println!("{}", inquiry.response_text);
    }

    println!();
    println!("Search results ({}):", inquiry.search_results.len());
    for result in &inquiry.search_results {
        println!(
            "  [{:.2}] {} ({}) {}",
            result.score,
            result.title,
            result.source.label(),
            result.url
        );
    }
}

fn status_marker(status: InquiryStatus) -> &'static str {
    match status {
        InquiryStatus::Completed => "✓",
        InquiryStatus::Failed => "✗",
        InquiryStatus::Processing | InquiryStatus::Pending => "…",
    }
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = Config::load_or_default(config_path.as_deref())?;
            let value = toml::Value::try_from(&config)?;

            let shown = match section {
                Some(name) => value.get(&name).cloned().ok_or_else(|| {
                    SleuthError::InvalidConfigValue {
                        path: name.clone(),
                        message: "No such section".to_string(),
                    }
                })?,
                None => value,
            };

            println!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            match Config::load(&path) {
                Ok(config) => {
                    println!("✓ Configuration is valid");
                    println!("  Schema version: {}", config.meta.schema_version);
                }
                Err(SleuthError::ConfigValidation { errors }) => {
                    println!("✗ Configuration is invalid:");
                    for error in &errors {
                        println!("  {}: {}", error.path, error.message);
                    }
                    return Err(SleuthError::ConfigValidation { errors });
                }
                Err(e) => return Err(e),
            }
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Secrets are read from the environment:");
            println!("    {}", config.slack.bot_token_env);
            println!("    {}", config.slack.signing_secret_env);
            println!("    {}", config.confluence.api_token_env);
            println!("    {}", config.llm.api_key_env);
        }
    }

    Ok(())
}
