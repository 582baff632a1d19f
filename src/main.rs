use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use tracing::{info, warn};

use cloudfusion::camera::PinholeIntrinsics;
use cloudfusion::cloud::deproject_rgbd;
use cloudfusion::config::SystemConfig;
use cloudfusion::io::tum::TUM_DEPTH_SCALE;
use cloudfusion::io::{write_ply, TumDataset};
use cloudfusion::system::{CaptureSignals, FusionSystem};
use cloudfusion::viz::RerunVisualizer;

/// Commands typed on stdin, one letter per line.
enum Command {
    Capture,
    Clear,
    Quit,
}

struct Args {
    dataset: PathBuf,
    export: Option<PathBuf>,
    config: Option<PathBuf>,
    capture_every: Option<usize>,
    headless: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let dataset = match args.next() {
        Some(path) => PathBuf::from(path),
        None => bail!(
            "usage: cloudfusion <dataset_dir> [--export model.ply] \
             [--config config.json] [--capture-every N] [--headless]"
        ),
    };

    let mut parsed = Args {
        dataset,
        export: None,
        config: None,
        capture_every: None,
        headless: false,
    };
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--export" => {
                parsed.export = Some(PathBuf::from(
                    args.next().context("--export needs a path")?,
                ))
            }
            "--config" => {
                parsed.config = Some(PathBuf::from(
                    args.next().context("--config needs a path")?,
                ))
            }
            "--capture-every" => {
                parsed.capture_every = Some(
                    args.next()
                        .context("--capture-every needs a frame count")?
                        .parse()
                        .context("--capture-every needs a number")?,
                )
            }
            "--headless" => parsed.headless = true,
            other => bail!("unknown argument {:?}", other),
        }
    }
    Ok(parsed)
}

/// Read single-letter commands off stdin in a background thread.
fn spawn_command_thread() -> Receiver<Command> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let command = match line.trim() {
                "a" => Command::Capture,
                "d" => Command::Clear,
                "q" => Command::Quit,
                "" => continue,
                other => {
                    warn!("unknown command {:?} (a = capture, d = clear, q = quit)", other);
                    continue;
                }
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => SystemConfig::from_json_file(path)?,
        None => SystemConfig::default(),
    };
    let intrinsics = config
        .intrinsics
        .unwrap_or_else(PinholeIntrinsics::primesense_default);
    let depth_scale = config.depth_scale.unwrap_or(TUM_DEPTH_SCALE);

    let dataset = TumDataset::new(&args.dataset, depth_scale)?;
    let mut system = FusionSystem::new(config, intrinsics);
    let signals = CaptureSignals::new();
    let mut viz = if args.headless {
        None
    } else {
        Some(RerunVisualizer::new("cloudfusion")?)
    };

    info!("press 'a' + Enter to seed the model / fuse the current view");
    info!("press 'd' + Enter to reinitialize, 'q' + Enter to quit");
    let commands = spawn_command_thread();

    for idx in 0..dataset.len() {
        for command in commands.try_iter() {
            match command {
                Command::Capture => signals.request_capture(),
                Command::Clear => signals.request_clear(),
                Command::Quit => signals.request_quit(),
            }
        }
        if signals.quit_requested() {
            break;
        }
        if let Some(every) = args.capture_every {
            if idx % every == 0 {
                signals.request_capture();
            }
        }

        let sample = dataset
            .sample(idx)
            .with_context(|| format!("loading frame {}", idx))?;
        let frame = deproject_rgbd(&sample.depth, &sample.color, &intrinsics);

        let result = system.tick(&frame, &signals);

        if let Some(viz) = viz.as_mut() {
            viz.set_time(sample.timestamp_s);
            viz.log_tick(&result, system.model(), &frame, &intrinsics);
        }
    }

    info!(model_points = system.model().len(), "sequence finished");
    if let Some(path) = &args.export {
        write_ply(system.model(), path)
            .with_context(|| format!("exporting model to {}", path.display()))?;
        info!("model exported to {}", path.display());
    }
    Ok(())
}
