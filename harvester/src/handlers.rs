use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use harvester_core::api::check_request;
use harvester_core::{
    AppState, Config, ConfigError, ExtractionRequest, ExtractionResult, ExtractionStatus,
    PlatformTable, build_extractor, serve,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Exit status for a failed extraction.
pub const EXIT_EXTRACTION_FAILED: i32 = 2;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read configuration, loading `env_file` first when given.
pub fn load_config(env_file: Option<&String>) -> Result<Config, ConfigError> {
    if let Some(path) = env_file {
        let expanded = shellexpand::tilde(path);
        if let Err(e) = dotenvy::from_path(expanded.as_ref()) {
            eprintln!(
                "{} Could not load {}: {}",
                "⚠".yellow().bold(),
                expanded,
                e
            );
        }
    }
    Config::from_env()
}

/// Build and validate a request from CLI values.
pub fn build_request(url: &str, bucket: &str, prefix: &str) -> Result<ExtractionRequest, String> {
    let request = ExtractionRequest::new(url.trim(), bucket.trim(), prefix.trim());
    check_request(&request)?;
    Ok(request)
}

pub fn exit_code_for(status: ExtractionStatus) -> i32 {
    match status {
        ExtractionStatus::Success | ExtractionStatus::Partial => 0,
        ExtractionStatus::Failure => EXIT_EXTRACTION_FAILED,
    }
}

pub fn render_result(result: &ExtractionResult) -> String {
    let label = match result.status {
        ExtractionStatus::Success => "✓ SUCCESS".green().bold(),
        ExtractionStatus::Partial => "⚠ PARTIAL".yellow().bold(),
        ExtractionStatus::Failure => "✗ FAILURE".red().bold(),
    };

    let mut out = format!("{} {}\n", label, result.message);
    if let Some(kind) = result.error_kind {
        out.push_str(&format!("  {} {}\n", "kind:".bright_black(), kind));
    }
    for path in &result.stored_paths {
        out.push_str(&format!("  {} {}\n", "→".blue(), path));
    }
    out
}

pub fn render_platforms(table: &PlatformTable) -> String {
    let mut out = String::new();
    for (pattern, hint) in table.entries() {
        out.push_str(&format!("  {:<24} {}\n", pattern, hint.as_str().bright_white()));
    }
    out.push_str(&format!("  {:<24} {}\n", "*", "generic".bright_black()));
    out
}

pub async fn handle_serve(args: Option<&ArgMatches>, config: &Config) -> anyhow::Result<()> {
    let host = args
        .and_then(|a| a.get_one::<String>("host"))
        .cloned()
        .unwrap_or_else(|| config.host.clone());
    let port = args
        .and_then(|a| a.get_one::<u16>("port"))
        .copied()
        .unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let extractor = build_extractor(config)
        .await
        .context("Failed to set up extraction pipeline")?;
    info!(
        "Starting Harvester API ({} mode)",
        if config.dummy_mode { "dummy" } else { "live" }
    );
    serve(addr, AppState::new(extractor)).await
}

/// Returns the process exit code.
pub async fn handle_extract(args: &ArgMatches, config: &Config) -> anyhow::Result<i32> {
    let url = args.get_one::<String>("url").context("--url is required")?;
    let bucket = args.get_one::<String>("bucket").context("--bucket is required")?;
    let prefix = args.get_one::<String>("prefix").context("--prefix is required")?;
    let json = args.get_flag("json");

    let request = match build_request(url, bucket, prefix) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            return Ok(1);
        }
    };

    let extractor = build_extractor(config)
        .await
        .context("Failed to set up extraction pipeline")?;

    let spinner = if json {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Extracting documents from {}", request.target_url));
        spinner
    };

    let result = extractor.run(&request).await;
    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_result(&result));
    }
    Ok(exit_code_for(result.status))
}

pub fn handle_platforms() {
    println!("{}", "Known platforms".bright_white().bold());
    print!("{}", render_platforms(&PlatformTable::default()));
}
