//! Binary entrypoint for the clipsaver rotation engine.
//!
//! Delegates all logic to the library crate; no local modules here. The
//! binary runs headless against the simulated surface backend: `--plan`
//! prints the deterministic pick order, the default mode soaks the full
//! rotation loop and logs every handoff.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use clipsaver::config::Configuration;
use clipsaver::events::{ControlEvent, Displayed, PlaybackEvent};
use clipsaver::library::BucketIndex;
use clipsaver::player::DualPlayer;
use clipsaver::session::{Session, SurfaceId};
use clipsaver::settings::SettingsStore;
use clipsaver::surface::{SimOptions, SimSurface};
use clipsaver::tasks::{ingest, rotor};

#[derive(Debug, Parser)]
#[command(name = "clipsaver", version, about = "ambient video rotation engine")]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Print the planned rotation order without starting playback
    #[arg(long = "plan", value_name = "ROTATIONS")]
    plan: Option<usize>,
    /// Deterministic RNG seed for clip selection
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,
    /// Override the configured screen size, e.g. 2560x1440
    #[arg(long = "screen", value_name = "WxH")]
    screen: Option<String>,
    /// Stop after this many successful handoffs (0 = run until cancelled)
    #[arg(long = "rotations", value_name = "COUNT", default_value_t = 0)]
    rotations: u64,
}

fn parse_screen(raw: &str) -> Result<(u32, u32)> {
    let Some((w, h)) = raw.split_once('x') else {
        bail!("expected WIDTHxHEIGHT, got '{raw}'");
    };
    let width = w.parse().with_context(|| format!("bad width in '{raw}'"))?;
    let height = h.parse().with_context(|| format!("bad height in '{raw}'"))?;
    Ok((width, height))
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let mut cfg = Configuration::from_yaml_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if let Some(raw) = args.screen.as_deref() {
        let (width, height) = parse_screen(raw).context("invalid --screen value")?;
        cfg.screen_width = width;
        cfg.screen_height = height;
    }

    let client = reqwest::Client::new();
    let clips = ingest::load_library(&cfg, &client)
        .await
        .context("loading clip manifest")?;

    if let Some(iterations) = args.plan {
        run_plan(&cfg, clips, iterations, args.seed);
        return Ok(());
    }

    let settings = SettingsStore::load(&cfg.settings_path);
    let session = Session::new(settings.settings());
    let index = BucketIndex::build(clips);

    // Channels (small/bounded)
    let (control_tx, control_rx) = mpsc::channel::<ControlEvent>(16); // External -> Rotor
    let (playback_tx, playback_rx) = mpsc::channel::<PlaybackEvent>(64); // Surfaces -> Rotor
    let (displayed_tx, mut displayed_rx) = mpsc::channel::<Displayed>(64); // Rotor -> observers

    let cancel = CancellationToken::new();

    // Ctrl-D/Ctrl-C cancel the loop
    if io::stdin().is_terminal() {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut sink = Vec::new();
            match io::stdin().read_to_end(&mut sink) {
                Ok(_) => tracing::info!("stdin closed; initiating shutdown"),
                Err(err) => tracing::warn!("stdin watcher failed: {err}"),
            }
            cancel.cancel();
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping shutdown watcher");
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = control_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; skipping to next clip");
                            if let Err(err) = control.send(ControlEvent::NextClip).await {
                                tracing::warn!("failed to forward next-clip request: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to register SIGUSR1 handler: {err}"),
            }
        });
    }

    let mut tasks = JoinSet::new();

    // Handoff observer: logs every rotation and bounds the soak when asked.
    tasks.spawn({
        let cancel = cancel.clone();
        let limit = args.rotations;
        async move {
            let mut shown = 0u64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    maybe = displayed_rx.recv() => {
                        let Some(Displayed(clip)) = maybe else { break };
                        shown += 1;
                        tracing::info!(n = shown, clip = %clip.title, "handoff");
                        if limit > 0 && shown >= limit {
                            tracing::info!(rotations = shown, "soak limit reached; shutting down");
                            cancel.cancel();
                            break;
                        }
                    }
                }
            }
            anyhow::Ok(())
        }
    });

    let sim = SimOptions {
        default_duration: cfg.sim_clip_length.as_secs_f64(),
        ..SimOptions::default()
    };
    let player = DualPlayer::new(
        SimSurface::new(SurfaceId::A, sim.clone(), playback_tx.clone()),
        SimSurface::new(SurfaceId::B, sim, playback_tx.clone()),
        cfg.player_options(),
    );

    // Run the rotation loop in the foreground; it returns on cancellation.
    if let Err(e) = rotor::run(
        player,
        index,
        session,
        cfg,
        settings,
        control_rx,
        playback_rx,
        displayed_tx.clone(),
        cancel.clone(),
        args.seed,
    )
    .await
    .context("rotation loop failed")
    {
        tracing::error!("{e:?}");
    }
    // Ensure auxiliary tasks are asked to stop
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn run_plan(cfg: &Configuration, clips: Vec<clipsaver::library::Clip>, iterations: usize, seed: Option<u64>) {
    println!(
        "# rotation plan\n# clips: {}\n# screen: {}x{}\n# iterations: {}\n# seed: {}\n",
        clips.len(),
        cfg.screen_width,
        cfg.screen_height,
        iterations,
        seed.map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );

    if clips.is_empty() {
        println!("(library is empty)");
        return;
    }

    println!("# buckets:");
    for clip in &clips {
        println!("  {:>9}  {}", clip.orientation.to_string(), clip.title);
    }

    let plan = rotor::simulate_rotation(
        clips,
        (cfg.screen_width, cfg.screen_height),
        cfg.square_tolerance,
        iterations,
        seed,
    );

    println!("\n# planned order:");
    if plan.is_empty() {
        println!("(nothing to play)");
    } else {
        for (idx, clip) in plan.iter().enumerate() {
            println!("  {:>4}: {}", idx + 1, clip.title);
        }
    }
}
