mod cli;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use castit::connectivity::TcpConnectivity;
use castit::device::{DeviceRegistry, LoggingPlayer};
use castit::playlist::{spawn_save_job, JsonLibraryStore, LibraryStore};
use castit::resolver::DirectUrlResolver;
use castit::server::{self, AppContext};
use castit::session::{spawn_session, SessionDeps};
use castit::streaming::MediaStreamer;
use castit_av::tools::{FFMPEG, FFPROBE};
use castit_av::transcode::{build_transcode_command, DecisionInputs};
use castit_av::{
    FfmpegTileGenerator, FfprobeProber, MediaProber, ThumbnailCache, ToolCommand, ToolRegistry,
    TranscodeProcessManager, TranscodeRequest,
};
use castit_core::config::Config;
use castit_core::events::EventBus;
use castit_core::FileKind;
use clap::Parser;
use cli::{Cli, Commands};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

async fn serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }
    let config = Arc::new(config);

    tracing::info!("Starting castit");
    tracing::info!("Devices will reach the server at {}", config.base_url());

    tokio::fs::create_dir_all(&config.paths.output_dir)
        .await
        .with_context(|| format!("creating {}", config.paths.output_dir.display()))?;

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = tools.command(FFMPEG).ok();
    if ffmpeg.is_none() {
        tracing::warn!("ffmpeg not found; local files cannot be streamed");
    }
    // A prober without a binary reports "metadata unavailable" per file.
    let prober: Arc<dyn MediaProber> = match FfprobeProber::from_registry(&tools) {
        Ok(prober) => Arc::new(prober),
        Err(e) => {
            tracing::warn!("{}; probing will fail", e);
            Arc::new(FfprobeProber::new(FFPROBE.into()))
        }
    };

    let shutdown = CancellationToken::new();
    let events = Arc::new(EventBus::default());
    let processes = Arc::new(TranscodeProcessManager::new());
    let tile_ffmpeg = ffmpeg
        .clone()
        .unwrap_or_else(|| ToolCommand::new(FFMPEG.into()));
    let generator = Arc::new(FfmpegTileGenerator::new(
        tile_ffmpeg,
        processes.clone(),
        config.thumbnails.clone(),
    ));
    let thumbnails = Arc::new(ThumbnailCache::new(generator, config.thumbnails.seconds_per_image));
    let streamer = Arc::new(MediaStreamer::new(
        processes.clone(),
        ffmpeg.clone(),
        config.playback.hw_probe_window_bytes,
    ));

    let store: Arc<dyn LibraryStore> = Arc::new(JsonLibraryStore::new(&config.paths.library_file));
    let library = Arc::new(RwLock::new(store.load().await?));
    let save_job = spawn_save_job(
        library.clone(),
        store,
        Duration::from_secs(config.save_interval_secs),
        shutdown.clone(),
    );

    // Discovery and the device wire protocol live outside this binary;
    // devices are registered through the API and driven by a dry-run player.
    let devices = Arc::new(DeviceRegistry::new());
    let deps = SessionDeps {
        config: config.clone(),
        library: library.clone(),
        devices: devices.clone(),
        player: Arc::new(LoggingPlayer::new()),
        prober: prober.clone(),
        resolver: Arc::new(DirectUrlResolver::new(prober)),
        connectivity: Arc::new(TcpConnectivity::default()),
        processes,
        thumbnails: thumbnails.clone(),
        streamer: streamer.clone(),
        events: events.clone(),
        ffmpeg,
    };
    let (session, session_task) = spawn_session(deps, shutdown.clone());

    let ctx = AppContext {
        config: config.clone(),
        session,
        library,
        devices,
        streamer,
        thumbnails,
        events,
        subtitle_path: config.paths.subtitle_file(),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    let result = server::serve(listener, ctx, shutdown.clone()).await;

    tracing::info!("Shutting down...");
    shutdown.cancel();
    let _ = session_task.await;
    let _ = save_job.await;

    result.map_err(Into::into)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "castit=trace,castit_av=trace,castit_core=debug,tower_http=debug".to_string()
        } else {
            "castit=debug,castit_av=debug,castit_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::Decide { file, seek } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(decide(&file, seek, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("castit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_metadata(file: &str, config: &Config) -> Result<castit_av::StreamMetadata> {
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    prober
        .probe(file, &CancellationToken::new())
        .await?
        .with_context(|| format!("ffprobe could not read {}", file))
}

async fn probe_file(file: &str, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let metadata = probe_metadata(file, &config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("File: {}", file);
    println!("Container: {}", metadata.format.format_name);
    match metadata.duration_secs() {
        Some(duration) => {
            let secs = duration as u64;
            println!("Duration: {:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
        }
        None => println!("Duration: live"),
    }

    println!("\nVideo Streams: {}", metadata.videos.len());
    for (i, stream) in metadata.videos.iter().enumerate() {
        print!("  [{}] {} {}x{}", i, stream.codec_name, stream.width, stream.height);
        if let Some(ref profile) = stream.profile {
            print!(" {}", profile);
        }
        if let Some(level) = stream.level {
            print!(" L{}", level);
        }
        if let Some(fps) = stream.avg_frame_rate {
            print!(", {:.3} fps", fps);
        }
        if stream.is_attached_picture {
            print!(" [cover]");
        }
        println!();
    }

    println!("\nAudio Streams: {}", metadata.audios.len());
    for (i, stream) in metadata.audios.iter().enumerate() {
        print!("  [{}] {} {}ch", i, stream.codec_name, stream.channels);
        if let Some(ref lang) = stream.language {
            print!(" ({})", lang);
        }
        println!();
    }

    println!("\nSubtitle Streams: {}", metadata.subtitles.len());
    for (i, stream) in metadata.subtitles.iter().enumerate() {
        print!("  [{}] {}", i, stream.codec_name);
        if let Some(ref lang) = stream.language {
            print!(" ({})", lang);
        }
        if !stream.is_text_based() {
            print!(" [bitmap]");
        }
        if stream.is_default {
            print!(" [default]");
        }
        println!();
    }

    Ok(())
}

async fn decide(file: &str, seek: f64, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let kind = FileKind::classify(file).with_context(|| format!("unsupported source: {}", file))?;
    let metadata = probe_metadata(file, &config).await?;
    let playback = &config.playback;

    let inputs = DecisionInputs {
        force_video: playback.force_video_transcode,
        force_audio: playback.force_audio_transcode,
        scale: playback.video_scale,
        video_stream: None,
        audio_stream: None,
        enable_hw: playback.enable_hardware_acceleration,
        available_hw: &playback.available_hw_accels,
    };
    let request = TranscodeRequest::from_metadata(file, kind, &metadata, inputs, playback.video_quality, seek);
    let decision = request.decision;

    println!("Source: {} ({})", file, kind);
    println!("Transcode video: {}", if decision.video { "yes" } else { "no (copy)" });
    println!("Transcode audio: {}", if decision.audio { "yes" } else { "no (copy)" });
    println!("Hardware acceleration: {}", decision.hw_accel);
    println!("Content type: {}", request.content_type());

    let ffmpeg = ToolRegistry::discover(&config.tools)
        .command(FFMPEG)
        .unwrap_or_else(|_| ToolCommand::new(FFMPEG.into()));
    println!("\n{}", build_transcode_command(&ffmpeg, &request).command_line());
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
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
        println!("Some tools are missing. Local files cannot be streamed without ffmpeg.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p).with_context(|| format!("reading {:?}", p))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {} (bind {})", config.base_url(), config.server.bind);
    println!(
        "  Hardware acceleration: {} {:?}",
        config.playback.enable_hardware_acceleration, config.playback.available_hw_accels
    );
    println!("  Video: {:?} / {:?}", config.playback.video_scale, config.playback.video_quality);
    println!(
        "  Thumbnails: {}s per tile, {}x{} grid",
        config.thumbnails.seconds_per_image, config.thumbnails.tiles_per_row, config.thumbnails.tiles_per_column
    );
    println!("  Library: {}", config.paths.library_file.display());

    for warning in config.validate() {
        println!("  ⚠ {}", warning);
    }

    Ok(())
}
