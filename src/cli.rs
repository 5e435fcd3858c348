use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "castit")]
#[command(author, version, about = "Media playback orchestrator for cast devices")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server and control API
    Serve {
        /// Address advertised to the cast device (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File or URL to probe
        #[arg(required = true)]
        file: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a file would be streamed: transcode decision and ffmpeg command
    Decide {
        /// File or URL to inspect
        #[arg(required = true)]
        file: String,

        /// Start offset in seconds
        #[arg(long, default_value_t = 0.0)]
        seek: f64,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
