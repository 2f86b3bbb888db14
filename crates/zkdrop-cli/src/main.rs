//! zkdrop: zero-knowledge file sharing CLI
//!
//! Commands:
//!   upload <file>...          - encrypt and upload, print one share link per file
//!   download <link>           - fetch, decrypt and save a shared file
//!   info <link>               - show name and remaining lifetime of an upload
//!   config show               - display current configuration
//!
//! Share links carry the key after `#`. That part is never sent to the
//! server and never logged.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use zkdrop_core::config::ZkdropConfig;
use zkdrop_core::Lifetime;
use zkdrop_crypto::ShareLocation;
use zkdrop_transfer::file_io::{read_plaintext, target_path, write_plaintext};
use zkdrop_transfer::{
    Direction, DownloadTransfer, HttpBackend, Phase, ProgressFn, ProgressSnapshot,
    ProgressTracker, ShareBackend, UploadResult, UploadTransfer,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zkdrop",
    version,
    about = "Zero-knowledge file sharing client",
    long_about = "zkdrop: encrypt files locally, upload only ciphertext, share the key in the link fragment"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "ZKDROP_CONFIG",
        default_value = "~/.config/zkdrop/config.toml"
    )]
    config: PathBuf,

    /// Log level (overrides config; RUST_LOG takes precedence over both)
    #[arg(long, env = "ZKDROP_LOG")]
    log: Option<String>,

    /// Log format (overrides config)
    #[arg(long, env = "ZKDROP_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and upload files, printing a share link for each
    Upload {
        /// Files to share
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// How long the server keeps the upload: 1d, 7d or 28d
        #[arg(long, short = 'l')]
        lifetime: Option<Lifetime>,

        /// Server origin (overrides server.origin)
        #[arg(long)]
        server: Option<String>,
    },

    /// Download and decrypt a shared file
    Download(DownloadArgs),

    /// Show file name and remaining lifetime of a shared file
    Info {
        /// Share link (the key fragment is optional here)
        link: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// Share link: {origin}/file/{uuid}#{iv}~{key}
    link: String,

    /// Base64Url IV; with --key, used instead of the link fragment
    #[arg(long)]
    iv: Option<String>,

    /// Base64Url key; with --iv, used instead of the link fragment
    #[arg(long)]
    key: Option<String>,

    /// File name for the decrypted file; skips the server name lookup
    #[arg(long)]
    name: Option<String>,

    /// MIME type of the decrypted file (default: from the server)
    #[arg(long = "type", value_name = "MIME")]
    mime_type: Option<String>,

    /// Output file or directory (default: file name in cwd)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| parse_log_format(&config.log.format));
    init_logging(&level, &format);

    match cli.command {
        Commands::Upload {
            files,
            lifetime,
            server,
        } => cmd_upload(&config, &files, lifetime, server.as_deref()).await,
        Commands::Download(args) => cmd_download(&config, &args).await,
        Commands::Info { link } => cmd_info(&config, &link).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Logs go to stderr so stdout carries only share links and results.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn parse_log_format(s: &str) -> LogFormat {
    match s.to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<ZkdropConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(ZkdropConfig::default())
    }
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Feed estimator snapshots into a bar.
fn bar_sink(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Arc::new(move |snap: ProgressSnapshot| {
        pb.set_position(snap.percent.round() as u64);
        pb.set_message(phase_label(snap.phase));
    })
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "waiting",
        Phase::Transferring => "transferring",
        Phase::Finalizing => "decrypting",
        Phase::Complete => "done",
        Phase::Failed => "failed",
    }
}

// ── `zkdrop upload` ───────────────────────────────────────────────────────────

async fn cmd_upload(
    config: &ZkdropConfig,
    files: &[PathBuf],
    lifetime: Option<Lifetime>,
    server: Option<&str>,
) -> Result<()> {
    let backend = match server {
        Some(origin) => HttpBackend::for_origin(origin, config)?,
        None => HttpBackend::from_config(config)?,
    };
    let lifetime = lifetime.unwrap_or(config.upload.default_lifetime);
    let multi = MultiProgress::new();

    // One independent transfer per file; none shares keys or progress.
    let jobs = files
        .iter()
        .map(|path| upload_one(config, &backend, path, lifetime, &multi));
    let results = futures::future::join_all(jobs).await;

    let mut failed = 0usize;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(done) => println!(
                "{}  ({}, expires in {})\n  {}",
                done.file_name,
                fmt_bytes(done.plaintext_bytes),
                lifetime,
                done.link
            ),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e:#}", path.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} uploads failed", files.len());
    }
    Ok(())
}

async fn upload_one<B: ShareBackend>(
    config: &ZkdropConfig,
    backend: &B,
    path: &Path,
    lifetime: Lifetime,
    multi: &MultiProgress,
) -> Result<UploadResult> {
    let file = read_plaintext(path, &config.limits)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let pb = multi.add(make_progress_bar(file.name()));
    let tracker = ProgressTracker::new(Direction::Upload, &config.progress, Some(bar_sink(&pb)));

    let result = UploadTransfer::new(file, lifetime, config.limits, tracker)
        .run(backend)
        .await;
    match &result {
        Ok(_) => pb.finish_with_message("done"),
        Err(_) => pb.abandon_with_message("failed"),
    }
    Ok(result?)
}

// ── `zkdrop download` ─────────────────────────────────────────────────────────

/// Build the transfer for `args`. A name or type given on the command line
/// replaces what the server would report.
fn download_transfer(args: &DownloadArgs, tracker: ProgressTracker) -> Result<DownloadTransfer> {
    let mut transfer = DownloadTransfer::from_link(
        &args.link,
        args.iv.as_deref(),
        args.key.as_deref(),
        tracker,
    )?;
    if let Some(ref name) = args.name {
        transfer = transfer.with_file_name(name.as_str());
    }
    if let Some(ref mime) = args.mime_type {
        transfer = transfer.with_mime_type(mime.as_str());
    }
    Ok(transfer)
}

async fn cmd_download(config: &ZkdropConfig, args: &DownloadArgs) -> Result<()> {
    let output = args.output.as_deref();
    let force = args.force;

    // Refuse early rather than after a full download.
    if let Some(out) = output {
        if !force && out.is_file() {
            anyhow::bail!("{} already exists (use --force to overwrite)", out.display());
        }
    }

    let pb = make_progress_bar("download");
    let tracker = ProgressTracker::new(Direction::Download, &config.progress, Some(bar_sink(&pb)));
    let transfer = download_transfer(args, tracker)?;

    let origin = transfer.origin().unwrap_or(config.server.origin.as_str());
    let backend = HttpBackend::for_origin(origin, config)?;

    let file = match transfer.fetch(&backend).await {
        Ok(file) => {
            pb.finish_with_message("done");
            file
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e.into());
        }
    };

    let path = target_path(output, file);
    let bytes = write_plaintext(&path, file, force).await?;

    println!();
    println!("Downloaded:");
    println!("  file:   {}", path.display());
    println!("  type:   {}", file.mime_type());
    println!("  bytes:  {}", fmt_bytes(bytes));
    Ok(())
}

// ── `zkdrop info` ─────────────────────────────────────────────────────────────

async fn cmd_info(config: &ZkdropConfig, link: &str) -> Result<()> {
    let location = ShareLocation::parse(link)?;
    let backend = HttpBackend::for_origin(&location.origin, config)?;
    let info = backend.file_info(location.uuid).await?;

    println!("name:      {}", info.file_name);
    if let Some(ref file_type) = info.file_type {
        println!("type:      {file_type}");
    }
    match info.remaining() {
        Some(left) => println!("expires:   in {}", format_remaining(left)),
        None => println!("expires:   expired"),
    }
    println!("key:       {}", if location.fragment.is_some() { "in link" } else { "not in link" });
    Ok(())
}

// ── `zkdrop config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &ZkdropConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn format_remaining(left: Duration) -> String {
    let secs = left.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
