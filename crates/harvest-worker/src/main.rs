//! Media harvesting worker binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use harvest_media::{check_ffmpeg, check_ytdlp, CommandClassifier, FfmpegTranscoder, YtDlpDownloader};
use harvest_models::CatalogKind;
use harvest_storage::{ArtifactFilter, RemoteStore, S3Client, StoreConfig};
use harvest_worker::{
    exclude, init_tracing, load_id_list, load_work_items, CredentialPool, HarvestConfig, HarvestExecutor, Harvester,
    Ledger, SegmentCache,
};

#[derive(Debug, Parser)]
#[command(name = "harvest", version, about = "Resumable media harvesting into object storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Harvest every pending item of a catalog
    Run {
        /// Catalog file (JSON for mmtrailer, CSV or id list for yt)
        #[arg(long)]
        catalog: PathBuf,
        /// Catalog kind: mmtrailer or yt
        #[arg(long, default_value = "mmtrailer")]
        kind: CatalogKind,
        /// Number of parallel workers (overrides HARVEST_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
        /// File of clip ids to leave out, one per line
        #[arg(long)]
        exclude: Option<PathBuf>,
        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Download listed clips from the store
    Fetch {
        /// File of clip ids, one per line
        #[arg(long)]
        list: PathBuf,
        /// all, mp4, mp3 or json
        #[arg(long, default_value = "all")]
        mode: String,
        /// Destination root; each clip lands in DEST/{clip_id}/
        #[arg(long)]
        dest: PathBuf,
        /// Stop after this many clips
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List clip ids present in the store
    ListRemote {
        /// Save the ids to this file, one per line
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Retry relocation for ids in the upload-failed ledger
    RetryUploads,
    /// Verify tools, directories and credentials
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = HarvestConfig::from_env();

    match cli.command {
        Command::Run {
            catalog,
            kind,
            workers,
            exclude: exclude_file,
            no_progress,
        } => run(config, &catalog, kind, workers, exclude_file.as_deref(), no_progress).await,
        Command::Fetch {
            list,
            mode,
            dest,
            limit,
        } => fetch(&list, &mode, &dest, limit).await,
        Command::ListRemote { output } => list_remote(output.as_deref()).await,
        Command::RetryUploads => retry_uploads(config).await,
        Command::Check => check(&config).await,
    }
}

async fn remote_store() -> anyhow::Result<RemoteStore> {
    let store_config = StoreConfig::from_env()?;
    let prefix = store_config.prefix.clone();
    let client = S3Client::new(store_config).await?;
    Ok(RemoteStore::new(Arc::new(client), prefix))
}

async fn build_harvester(config: &HarvestConfig, kind: CatalogKind) -> anyhow::Result<Harvester> {
    let credentials = CredentialPool::discover(&config.cookies_dir)
        .with_context(|| format!("reading credentials from {}", config.cookies_dir.display()))?;
    if credentials.is_empty() {
        bail!("no valid cookie files in {}", config.cookies_dir.display());
    }

    let harvester = Harvester::new(
        config,
        kind,
        Arc::new(credentials),
        Arc::new(YtDlpDownloader::new()),
        Arc::new(FfmpegTranscoder::new()),
        remote_store().await?,
    );

    if !kind.segments_whole_items() {
        return Ok(harvester);
    }

    let classifier = config
        .classifier_cmd
        .as_deref()
        .and_then(CommandClassifier::from_command_line)
        .context("HARVEST_CLASSIFIER_CMD is required for segmented catalogs")?;
    let cache = SegmentCache::new(config.segments_dir(), Arc::new(classifier), config.segmentation)
        .with_chunk_secs(config.chunk_secs);
    Ok(harvester.with_segmenter(cache))
}

async fn run(
    mut config: HarvestConfig,
    catalog: &Path,
    kind: CatalogKind,
    workers: Option<usize>,
    exclude_file: Option<&Path>,
    no_progress: bool,
) -> anyhow::Result<()> {
    if let Some(n) = workers.filter(|n| *n > 0) {
        config.workers = n;
    }
    info!("Harvest config: {:?}", config);

    let mut items = load_work_items(kind, catalog)?;
    if let Some(path) = exclude_file {
        let excluded: HashSet<String> = load_id_list(path)?.into_iter().collect();
        items = exclude(items, &excluded);
    }

    let ledger = Ledger::new(&config.log_dir);
    let pending = ledger.pending(&items)?;
    info!(catalog = items.len(), pending = pending.len(), "Resumption ledger applied");
    if pending.is_empty() {
        info!("Nothing to do");
        return Ok(());
    }

    tokio::fs::create_dir_all(&config.work_dir).await?;
    let harvester = Arc::new(build_harvester(&config, kind).await?);
    let summary = HarvestExecutor::new(harvester, config.workers)
        .with_progress(!no_progress)
        .run(pending)
        .await?;

    info!(
        completed = summary.completed,
        failed = summary.failed,
        "Run complete; see ledgers in {}",
        config.log_dir.display()
    );
    Ok(())
}

async fn fetch(list: &Path, mode: &str, dest: &Path, limit: Option<usize>) -> anyhow::Result<()> {
    let Some(filter) = ArtifactFilter::from_mode(mode) else {
        bail!("unknown mode {:?}; expected all, mp4, mp3 or json", mode);
    };

    let mut ids = load_id_list(list)?;
    if let Some(limit) = limit {
        ids.truncate(limit);
    }

    let remote = remote_store().await?;
    let mut fetched_clips = 0;
    for clip_id in &ids {
        match remote.download_folder(clip_id, dest, filter).await {
            Ok(summary) if summary.any_fetched() => fetched_clips += 1,
            Ok(_) => warn!(clip_id = %clip_id, "Nothing fetched"),
            Err(e) => warn!(clip_id = %clip_id, error = %e, "Fetch failed"),
        }
    }

    info!(requested = ids.len(), fetched = fetched_clips, dest = %dest.display(), "Fetch finished");
    Ok(())
}

async fn list_remote(output: Option<&Path>) -> anyhow::Result<()> {
    let remote = remote_store().await?;
    let ids = remote.list_clip_ids().await?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut body = ids.join("\n");
            if !body.is_empty() {
                body.push('\n');
            }
            tokio::fs::write(path, body).await?;
            info!(count = ids.len(), path = %path.display(), "Saved remote clip ids");
        }
        None => {
            for id in &ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

async fn retry_uploads(config: HarvestConfig) -> anyhow::Result<()> {
    let harvester = Harvester::new(
        &config,
        CatalogKind::default(),
        Arc::new(CredentialPool::new(Vec::new())),
        Arc::new(YtDlpDownloader::new()),
        Arc::new(FfmpegTranscoder::new()),
        remote_store().await?,
    );

    let summary = harvester.retry_uploads().await?;
    info!(
        relocated = summary.relocated,
        failed = summary.failed,
        skipped = summary.skipped,
        "Upload retry finished"
    );
    Ok(())
}

async fn check(config: &HarvestConfig) -> anyhow::Result<()> {
    println!("harvest check: work_dir={}", config.work_dir.display());

    let ytdlp = check_ytdlp().context("yt-dlp not available")?;
    println!("  yt-dlp: {}", ytdlp.display());
    let ffmpeg = check_ffmpeg().context("ffmpeg not available")?;
    println!("  ffmpeg: {}", ffmpeg.display());

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("cannot create {}", config.work_dir.display()))?;
    tokio::fs::create_dir_all(&config.log_dir)
        .await
        .with_context(|| format!("cannot create {}", config.log_dir.display()))?;

    let credentials = CredentialPool::discover(&config.cookies_dir)
        .with_context(|| format!("cannot read {}", config.cookies_dir.display()))?;
    if credentials.is_empty() {
        bail!("no valid cookie files in {}", config.cookies_dir.display());
    }
    println!("  credentials: {}", credentials.len());

    println!("harvest check: ok");
    Ok(())
}
