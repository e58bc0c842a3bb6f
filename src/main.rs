use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mic_recorder::audio::MAX_SAMPLE_RATE;
use mic_recorder::config::RecorderConfig;
use mic_recorder::{
    create_router, finalize_recording, open_source, AppState, AudioFile, AudioSource, Config,
    HttpUploader, NoopUploader, PcmFormat, Recorder, RecorderOptions, SourceFactory, StopOutcome,
    Uploader,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mic-recorder", version, about = "Capture, normalize, and upload WAV recordings")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/mic-recorder")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record for a fixed time, finalize, and upload
    Record {
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
        /// tone[:HZ], pcm:PATH, or wav:PATH
        #[arg(long, default_value = "tone")]
        source: String,
        /// Keep the file locally instead of uploading it
        #[arg(long)]
        no_upload: bool,
    },
    /// Serve the HTTP control API
    Serve {
        /// tone[:HZ], pcm:PATH, or wav:PATH
        #[arg(long, default_value = "tone")]
        source: String,
    },
    /// Normalize a raw PCM file in place and prepend a WAV header
    Finalize {
        path: PathBuf,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SAMPLE_RATE)))]
        sample_rate: Option<u32>,
    },
    /// Print the format of a WAV file
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("mic-recorder v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Record {
            seconds,
            source,
            no_upload,
        } => record(&cfg, &source, Duration::from_secs(seconds), no_upload).await,
        Command::Serve { source } => serve(&cfg, &source).await,
        Command::Finalize { path, sample_rate } => {
            let format = PcmFormat::new(sample_rate.unwrap_or(cfg.recorder.sample_rate));
            let (normalize, header) = finalize_recording(&path, &format)
                .with_context(|| format!("Failed to finalize {}", path.display()))?;
            info!(
                "Finalized {}: {} data bytes, {:?}",
                path.display(),
                header.data_len,
                normalize
            );
            Ok(())
        }
        Command::Inspect { path } => {
            let audio = AudioFile::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            println!("Path: {}", audio.path);
            println!("Sample rate: {} Hz", audio.header.sample_rate);
            println!("Channels: {}", audio.header.channels);
            println!("Bits per sample: {}", audio.header.bits_per_sample);
            println!("Data length: {} bytes", audio.header.data_len);
            println!("Duration: {:.2}s", audio.duration_seconds);
            println!("Peak: {}", audio.peak());
            Ok(())
        }
    }
}

async fn record(cfg: &Config, source: &str, duration: Duration, no_upload: bool) -> Result<()> {
    let uploader = build_uploader(cfg, no_upload)?;
    let mut recorder = Recorder::new(RecorderOptions::from(&cfg.recorder), uploader);

    let source = build_source(source, &cfg.recorder)?;
    let session_id = recorder.start(source).await?;
    info!("Recording {} for {}s", session_id, duration.as_secs());

    tokio::time::sleep(duration).await;

    match recorder.stop().await? {
        StopOutcome::NotRecording => warn!("Recorder was not running"),
        StopOutcome::Finished { recording, upload } => {
            println!("Recording: {}", recording.path.display());
            println!("Duration: {:.2}s", recording.duration_secs);
            println!("Data length: {} bytes", recording.header.data_len);
            if recording.degraded {
                println!(
                    "Warning: {} frames lost while recording",
                    recording.capture.write_failures
                );
            }

            // Runtime shutdown aborts an unfinished upload task
            match upload.wait().await {
                Ok(receipt) => println!("Upload complete (status {})", receipt.status),
                Err(e) => println!("Upload failed: {}", e),
            }
        }
    }

    Ok(())
}

async fn serve(cfg: &Config, source: &str) -> Result<()> {
    let uploader = build_uploader(cfg, false)?;
    let recorder = Recorder::new(RecorderOptions::from(&cfg.recorder), uploader);

    // Validate the source string once up front
    build_source(source, &cfg.recorder)?;
    let description = source.to_string();
    let recorder_cfg = cfg.recorder.clone();
    let sources: SourceFactory = Arc::new(move || build_source(&description, &recorder_cfg));

    let app = create_router(AppState::new(recorder, sources));
    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

fn build_uploader(cfg: &Config, no_upload: bool) -> Result<Arc<dyn Uploader>> {
    if no_upload || !cfg.upload.enabled {
        return Ok(Arc::new(NoopUploader));
    }
    Ok(Arc::new(HttpUploader::new(&cfg.upload)?))
}

fn build_source(
    description: &str,
    cfg: &RecorderConfig,
) -> mic_recorder::Result<Box<dyn AudioSource>> {
    open_source(
        description,
        cfg.format(),
        Duration::from_millis(cfg.buffer_duration_ms),
    )
}
