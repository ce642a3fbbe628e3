use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn, Level};

use clip_assembler::{
    collection::MediaCollection,
    config::Config,
    engine::{EngineSession, FfmpegEngine},
    export::{ConcatPolicy, DirectoryDownload, ExportOrchestrator},
    media::{ItemId, MediaFile},
    thumbnail::FfmpegThumbnailer,
};

/// A drag gesture expressed as before/after positions
#[derive(Debug, Clone, Copy)]
struct Move {
    from: usize,
    to: usize,
}

impl FromStr for Move {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(':')
            .ok_or_else(|| format!("expected FROM:TO, got '{}'", s))?;
        Ok(Self {
            from: from.trim().parse().map_err(|_| format!("bad position '{}'", from))?,
            to: to.trim().parse().map_err(|_| format!("bad position '{}'", to))?,
        })
    }
}

#[derive(Parser)]
#[command(
    name = "clip-assembler",
    version,
    about = "Join MP4 clips into a single video",
    long_about = "Clip-Assembler adds MP4 clips to an ordered collection, lets you rearrange or drop them, and exports the result as one MP4 using FFmpeg."
)]
struct Cli {
    /// MP4 clips, in initial order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory the joined video is written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Move the clip at FROM to TO (zero-based, applied in order, before removals)
    #[arg(short = 'm', long = "move", value_name = "FROM:TO")]
    moves: Vec<Move>,

    /// Drop the clip at INDEX (zero-based, positions after moves)
    #[arg(short, long, value_name = "INDEX")]
    remove: Vec<usize>,

    /// Re-encode with the fixed H.264 profile instead of stream copy
    #[arg(long)]
    reencode: bool,

    /// Write each clip's thumbnail into this directory
    #[arg(short, long)]
    thumbnails: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Read a clip and apply the MP4 gate, warning and skipping on failure
async fn read_clip(path: &Path) -> Option<MediaFile> {
    let checked = match MediaFile::from_path(path).await {
        Ok(file) => file.ensure_accepted().map(|_| file),
        Err(e) => Err(e),
    };
    match checked {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e.user_message());
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Clip-Assembler v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    if cli.reencode {
        config.export.policy = ConcatPolicy::reencode();
    }

    // Warm the engine up front so the export does not wait on a cold load
    let engine = FfmpegEngine::new(&config.engine);
    let session = Arc::new(
        EngineSession::new(Arc::new(engine))
            .with_timeout(config.export.timeout_secs.map(std::time::Duration::from_secs)),
    );
    session.on_log(|line| debug!(target: "engine", "{}", line));
    let warmup = {
        let session = session.clone();
        tokio::spawn(async move { session.initialize().await })
    };

    let thumbnailer = FfmpegThumbnailer::new(&config.engine, &config.thumbnail);
    let mut collection = MediaCollection::new(Arc::new(thumbnailer));
    collection.on_change(|change, snapshot| {
        debug!("{:?} -> {:?}", change, snapshot.names());
    });

    for path in &cli.files {
        let Some(file) = read_clip(path).await else {
            continue;
        };
        match collection.append(file).await {
            Ok(id) => info!("Added {} as {}", path.display(), id),
            Err(e) => warn!("Skipping {}: {}", path.display(), e.user_message()),
        }
    }

    for step in &cli.moves {
        collection
            .move_item(step.from, step.to)
            .with_context(|| format!("cannot move {}:{}", step.from, step.to))?;
    }

    let doomed: Vec<ItemId> = cli
        .remove
        .iter()
        .map(|&index| {
            collection
                .snapshot()
                .items()
                .get(index)
                .map(|item| item.id)
                .with_context(|| format!("no clip at position {}", index))
        })
        .collect::<Result<_>>()?;
    for id in doomed {
        collection.remove(id);
    }

    let snapshot = collection.snapshot();
    if snapshot.is_empty() {
        bail!("No usable clips to export");
    }
    for (position, item) in snapshot.iter().enumerate() {
        info!("   {:02} - {} ({}x{})", position, item.name(), item.thumbnail.width, item.thumbnail.height);
    }

    if let Some(dir) = &cli.thumbnails {
        std::fs::create_dir_all(dir)?;
        for (position, item) in snapshot.iter().enumerate() {
            let png = item
                .thumbnail
                .png_bytes()
                .with_context(|| format!("thumbnail for {} is not a PNG data URI", item.name()))?;
            std::fs::write(dir.join(format!("{:02}_{}.png", position, item.name())), png)?;
        }
        info!("Thumbnails written to {:?}", dir);
    }

    warmup.await??;

    let orchestrator = ExportOrchestrator::new(
        &config.export,
        Arc::new(DirectoryDownload::new(&cli.output)),
    );
    let delivered = orchestrator
        .export(&snapshot, &session)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    match &delivered.location {
        Some(path) => info!("Export complete! Output saved to: {:?}", path),
        None => info!("Export complete! {} bytes delivered", delivered.size),
    }
    Ok(())
}
