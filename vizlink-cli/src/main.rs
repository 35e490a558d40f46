//! vizlink command-line client entry point.
//!
//! ```text
//! vizlink --tasks plot.json                 Run tasks with defaults
//! vizlink --config <path> --tasks -         Custom config, tasks on stdin
//! vizlink --tasks t.json --payload d.bin    Upload bulk bytes with the tasks
//! vizlink --gen-config                      Dump default config and exit
//! vizlink --write-config vizlink.toml       Write default config to a file
//! ```

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use vizlink_cli::config::CliConfig;
use vizlink_cli::logging;
use vizlink_cli::report::{summarize, summarize_exchange};
use vizlink_cli::tasks::parse_tasks;
use vizlink_core::{Session, TaskResult};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vizlink", about = "Run tasks on a remote visualization application")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vizlink.toml")]
    config: PathBuf,

    /// WebSocket URL (overrides config). Example: ws://localhost:12345/api
    #[arg(short, long)]
    url: Option<String>,

    /// JSON array of task objects; `-` reads stdin.
    #[arg(short, long, required_unless_present_any = ["gen_config", "write_config"])]
    tasks: Option<String>,

    /// File with bulk bytes sent alongside the tasks.
    #[arg(short, long)]
    payload: Option<PathBuf>,

    /// Write returned data bytes here.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", CliConfig::default_toml()?);
        return Ok(());
    }

    let log = logging::init()?;

    if let Some(path) = &cli.write_config {
        CliConfig::write_default(path)?;
        info!("wrote default config to {}", path.display());
        return Ok(());
    }

    let config = CliConfig::load(&cli.config);
    log.apply_config(&config.logging.level)?;

    info!("vizlink v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Inputs ───────────────────────────────────────────────

    let text = match cli.tasks.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)?,
        None => return Err("--tasks is required".into()),
    };
    let tasks = parse_tasks(&text)?;
    let payload = match &cli.payload {
        Some(path) => std::fs::read(path)?,
        None => Vec::new(),
    };

    // ── 2. Connect and run ──────────────────────────────────────

    let url = cli.url.unwrap_or_else(|| config.endpoint().url());
    let mut session = Session::connect(url, config.session_options()).await?;

    let result = session.execute(tasks, &payload).await?;
    match session.last_exchange() {
        Some(stats) => println!("{} [{}]", summarize(&result), summarize_exchange(&stats)),
        None => println!("{}", summarize(&result)),
    }

    // ── 3. Output ───────────────────────────────────────────────

    if let (Some(path), TaskResult::Data(block)) = (&cli.out, &result) {
        std::fs::write(path, block.bytes())?;
        info!("wrote {} bytes to {}", block.bytes().len(), path.display());
    }

    Ok(())
}
