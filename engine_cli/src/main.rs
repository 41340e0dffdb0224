use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use engine::{AnalysisSnapshot, RateConfig, Strategy};
use snapshot::{load_into, read_analysis, JsonFileSource, RetryPolicy, SnapshotCell};
use tracing::{debug, info, instrument, warn};

mod clock;
mod plot;

use clock::PlaybackClock;

/// Songs without a usable duration play for this long.
const FALLBACK_SONG_SECS: f64 = 30.0;

#[derive(Debug, clap::Parser)]
enum Command {
    /// Replay songs in order, printing the clip rate on every tick.
    Play {
        /// Analysis files, the file stem is the track id
        #[arg(required = true)]
        songs: Vec<PathBuf>,
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,
        /// Play each song for this many seconds instead of its duration
        #[arg(long)]
        seconds: Option<f64>,
        /// Start every song at this position
        #[arg(long, default_value_t = 0)]
        seek_ms: u64,
        #[command(flatten)]
        rate: RateArgs,
    },
    /// Print the rate curve of one song as CSV.
    Curve {
        path: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        from_ms: f64,
        #[arg(long)]
        to_ms: Option<f64>,
        #[arg(long, default_value_t = 50.0)]
        step_ms: f64,
        #[command(flatten)]
        rate: RateArgs,
    },
    /// Render the rate curve of one song to a PNG.
    Plot {
        path: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        from_ms: f64,
        #[arg(long)]
        to_ms: Option<f64>,
        #[arg(long, default_value_t = 1600)]
        width: u32,
        #[arg(long, default_value_t = 400)]
        height: u32,
        #[command(flatten)]
        rate: RateArgs,
    },
}

#[derive(Debug, clap::Args)]
struct RateArgs {
    /// TOML file with engine settings
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    target_bpm: Option<f64>,
    /// "trap-nation" or "simple"
    #[arg(long)]
    strategy: Option<Strategy>,
}

impl RateArgs {
    fn load(&self) -> anyhow::Result<RateConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RateConfig::default(),
        };
        if let Some(target_bpm) = self.target_bpm {
            config.target_base_bpm = target_bpm;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        config.validate()?;
        debug!(?config, "rate config");
        Ok(config)
    }
}

fn load_config(path: &Path) -> anyhow::Result<RateConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_config(text: &str) -> anyhow::Result<RateConfig> {
    Ok(toml::from_str(text)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::prelude::*;

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init()
    }

    match Command::parse() {
        Command::Play {
            songs,
            tick_ms,
            seconds,
            seek_ms,
            rate,
        } => {
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(%err, "cannot listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            };
            play(
                &songs,
                Duration::from_millis(tick_ms.max(1)),
                seconds,
                Duration::from_millis(seek_ms),
                rate.load()?,
                shutdown,
            )
            .await
        }
        Command::Curve {
            path,
            from_ms,
            to_ms,
            step_ms,
            rate,
        } => {
            let config = rate.load()?;
            let snapshot = read_analysis(&path).await?;
            let to_ms = to_ms.unwrap_or_else(|| song_length_secs(&snapshot) * 1000.0);

            println!("position_ms,rate");
            for (position_ms, rate) in plot::sample_curve(&snapshot, &config, from_ms, to_ms, step_ms) {
                println!("{position_ms:.0},{rate:.4}");
            }
            Ok(())
        }
        Command::Plot {
            path,
            out,
            from_ms,
            to_ms,
            width,
            height,
            rate,
        } => {
            let config = rate.load()?;
            let snapshot = read_analysis(&path).await?;
            let to_ms = to_ms.unwrap_or_else(|| song_length_secs(&snapshot) * 1000.0);
            let step_ms = (to_ms - from_ms) / width.max(1) as f64;

            let rates: Vec<f64> = plot::sample_curve(&snapshot, &config, from_ms, to_ms, step_ms)
                .into_iter()
                .map(|(_, rate)| rate)
                .take(width.max(1) as usize)
                .collect();
            if rates.is_empty() {
                return Err(anyhow!("nothing to plot between {from_ms}ms and {to_ms}ms"));
            }

            plot::render(&rates, config.active_output_range(), height)
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(out = %out.display(), samples = rates.len(), "plotted rate curve");
            Ok(())
        }
    }
}

/// Seconds to play a song for: the track duration, else the end of the last
/// beat.
fn song_length_secs(snapshot: &AnalysisSnapshot) -> f64 {
    snapshot
        .track
        .as_ref()
        .map(|track| track.duration)
        .filter(|duration| duration.is_finite() && *duration > 0.0)
        .or_else(|| {
            snapshot
                .beats()
                .last()
                .map(|beat| beat.start + beat.duration.max(0.0))
                .filter(|end| end.is_finite() && *end > 0.0)
        })
        .unwrap_or(FALLBACK_SONG_SECS)
}

/// Splits `path` into a source for its directory and the track id.
fn source_for(path: &Path) -> anyhow::Result<(JsonFileSource, String)> {
    let track_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("no track id in {}", path.display()))?
        .to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok((JsonFileSource::new(dir), track_id))
}

#[instrument(skip(config, shutdown), level = "debug")]
async fn play(
    songs: &[PathBuf],
    tick: Duration,
    seconds: Option<f64>,
    seek: Duration,
    config: RateConfig,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let cell = Arc::new(SnapshotCell::new());
    let clock = Arc::new(PlaybackClock::default());
    let policy = RetryPolicy::default();
    tokio::pin!(shutdown);

    let ticker = tokio::spawn(tick_rates(cell.clone(), clock.clone(), config, tick));

    for path in songs {
        let (source, track_id) = source_for(path)?;
        clock.pause();

        let loaded = tokio::select! {
            loaded = load_into(&cell, &source, &track_id, &policy) => loaded,
            _ = &mut shutdown => {
                info!("interrupted while loading");
                break;
            }
        };
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(%err, path = %path.display(), "skipping song without analysis");
                continue;
            }
        };

        let length = seconds.unwrap_or_else(|| song_length_secs(&loaded.snapshot));
        let length = Duration::try_from_secs_f64(length)
            .unwrap_or(Duration::ZERO)
            .saturating_sub(seek);
        info!(track_id, ?length, ?seek, "playing");
        clock.seek(seek);
        clock.play();

        tokio::select! {
            _ = tokio::time::sleep(length) => {}
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    ticker.abort();
    Ok(())
}

/// Track id, position and rate for the current tick, `None` while paused or
/// while a song change is in progress.
fn sample_tick(
    cell: &SnapshotCell,
    clock: &PlaybackClock,
    config: &RateConfig,
) -> Option<(String, f64, f64)> {
    let loaded = cell.load()?;
    let position = clock.playing_position()?;
    // the position must belong to the snapshot we loaded
    if !cell.load().is_some_and(|again| Arc::ptr_eq(&again, &loaded)) {
        return None;
    }
    let position_ms = position.as_secs_f64() * 1000.0;
    let rate = engine::compute_rate(position_ms, &loaded.snapshot, config);
    Some((loaded.track_id.clone(), position_ms, rate))
}

/// The renderer side: every tick, print the rate for the loaded song.
async fn tick_rates(
    cell: Arc<SnapshotCell>,
    clock: Arc<PlaybackClock>,
    config: RateConfig,
    tick: Duration,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    println!("track_id\tposition_ms\trate");
    loop {
        interval.tick().await;
        if let Some((track_id, position_ms, rate)) = sample_tick(&cell, &clock, &config) {
            println!("{track_id}\t{position_ms:.0}\t{rate:.4}");
        }
    }
}
