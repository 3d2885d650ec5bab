mod cli;

use mediadrop::{
    catalog::MediaCatalog,
    config,
    ingest::{is_supported, IngestQueue, Pipeline, PipelineSettings},
    probe, server, tools,
    transcode::{FfmpegTool, TranscodeSettings},
    watch,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use std::time::Duration;

async fn start_server(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting mediadrop server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    std::fs::create_dir_all(&config.intake.dir)?;
    std::fs::create_dir_all(&config.media.dir)?;

    for tool in tools::check_tools() {
        if !tool.available {
            tracing::warn!("Required tool not found on PATH: {}", tool.name);
        }
    }

    let catalog = Arc::new(MediaCatalog::new(config.media.dir.clone()));

    let tool = Arc::new(FfmpegTool::new(TranscodeSettings::from(&config.transcode)));
    let pipeline = Arc::new(Pipeline::new(
        tool,
        PipelineSettings {
            media_dir: config.media.dir.clone(),
            extensions: config.intake.extensions.clone(),
            target_audio_codec: config.transcode.audio_codec.clone(),
            poll_interval: Duration::from_secs(config.intake.poll_interval_secs),
        },
    ));
    let queue = IngestQueue::start(pipeline);

    // Pick up anything left in the intake directory from a previous session.
    rescan_intake(&config.intake.dir, &config.intake.extensions, &queue)?;

    // Start the intake watcher. It must outlive the server loop; dropping it
    // drops the OS-level watch.
    let mut watcher = watch::FileWatcher::new(config.intake.clone(), queue.clone());
    watcher.start().await?;

    let server_result = server::start_server(config, catalog, queue).await;

    tracing::info!("Shutting down...");
    watcher.stop();

    server_result
}

/// Enqueue recognized files already sitting in the intake directory.
fn rescan_intake(
    dir: &std::path::Path,
    extensions: &[String],
    queue: &IngestQueue,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported(&path, extensions) {
            if queue.enqueue(path.clone()) {
                tracing::info!("Queued leftover intake file: {:?}", path);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediadrop=trace,tower_http=debug".to_string()
        } else {
            "mediadrop=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Run { input } => run_file(&input, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediadrop {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_file(input: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    tracing::info!("Processing file: {:?}", input);

    let tool = Arc::new(FfmpegTool::new(TranscodeSettings::from(&config.transcode)));
    let pipeline = Pipeline::new(
        tool,
        PipelineSettings {
            media_dir: config.media.dir.clone(),
            extensions: config.intake.extensions.clone(),
            target_audio_codec: config.transcode.audio_codec.clone(),
            poll_interval: Duration::from_secs(config.intake.poll_interval_secs),
        },
    );

    match pipeline.process(input)? {
        mediadrop::ingest::Outcome::Published { title } => {
            println!("Published: {}", title);
            println!("Media directory: {:?}", config.media.dir.join(&title));
        }
        mediadrop::ingest::Outcome::SkippedVanished => {
            println!("File vanished before processing.");
        }
        mediadrop::ingest::Outcome::SkippedUnsupported => {
            println!("Unsupported file, nothing to do.");
        }
    }

    Ok(())
}

fn probe_file(file: &std::path::Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let report = probe::probe_source(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File: {}", file.display());
        match report.audio_codec {
            Some(ref codec) => println!("Audio codec: {}", codec),
            None => println!("Audio codec: none"),
        }
        println!("Subtitles: {}", if report.has_subtitles { "yes" } else { "no" });
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = tools::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Intake: {:?}", config.intake.dir);
            println!("  Media: {:?}", config.media.dir);
            println!("  Extensions: {}", config.intake.extensions.join(", "));
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Intake: {:?}", config.intake.dir);
            println!("  Media: {:?}", config.media.dir);
        }
    }

    Ok(())
}
