mod audio;
mod config;
mod frame_clock;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info, warn};
use vbam_phone_core::scheduler::HostScheduler;
use vbam_phone_core::session::{Session, SessionEvent};
use vbam_phone_core::{LifecycleController, RomSource, ThreadScheduler};

use audio::HostSound;
use frame_clock::{FrameCounter, FramePacer};
use store::DirStore;

#[derive(Parser)]
struct Args {
    /// Path to ROM file
    rom: Option<PathBuf>,

    /// Host settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,

    /// Seconds to emulate before detaching
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Pause for this many milliseconds halfway through the run
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Save a state into this slot before detaching
    #[arg(long)]
    save_slot: Option<u8>,

    /// Load this save-state slot after attaching
    #[arg(long)]
    load_slot: Option<u8>,

    /// Disable audio output
    #[arg(long)]
    mute: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn log_events(session: &Session) {
    for event in session.events().try_iter() {
        match event {
            SessionEvent::SlotSelected { new, old } => info!("save slot {old} -> {new}"),
            SessionEvent::StateSaved { slot, rom } => info!("saved {rom} to slot {slot}"),
            SessionEvent::SnapshotTaken { rom } => info!("snapshot captured for {rom}"),
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_from_file(&config_path);
    if args.mute {
        cfg.sound_enabled = false;
    }
    if args.save_config {
        config::save_to_file(&config_path, &cfg)?;
        info!("settings written to {}", config_path.display());
    }

    let rom = args.rom.map(RomSource::from_file);
    let save_dir = cfg
        .save_dir
        .clone()
        .or_else(|| rom.as_ref().map(|r| r.folder().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = rom
        .as_ref()
        .and_then(|r| r.file().file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_owned());

    let frames = Arc::new(FrameCounter::default());
    let scheduler: Arc<dyn HostScheduler> = Arc::new(ThreadScheduler);
    let pacer = FramePacer::new(Arc::clone(&frames), cfg.effective_frame_rate());
    info!("pacing at {:?} per frame", pacer.frame_time());
    let controller = Arc::new(LifecycleController::new(
        pacer,
        HostSound::new(cfg.sound_enabled),
        Arc::clone(&scheduler),
    ));
    controller.initialize();

    let session = Session::new(
        Arc::clone(&controller),
        DirStore::new(save_dir, stem, Arc::clone(&frames)),
        scheduler,
        cfg.session_options(),
    );

    match rom {
        Some(rom) => controller.load_rom(rom),
        None => warn!("no ROM supplied; the worker will idle until one is loaded"),
    }

    session.connect()?;
    if let Err(e) = controller.set_volume(cfg.volume) {
        warn!("could not set volume: {e}");
    }

    if let Some(slot) = args.load_slot {
        session.load_state(slot)?;
        info!("loaded slot {slot} at frame {}", frames.get());
    }

    let started = Instant::now();
    let run_for = Duration::from_secs(args.seconds);
    if let Some(pause_ms) = args.pause_ms {
        std::thread::sleep(run_for / 2);
        controller.pause();
        let paused_at = frames.get();
        std::thread::sleep(Duration::from_millis(pause_ms));
        info!(
            "paused {pause_ms} ms at frame {paused_at} (now {})",
            frames.get()
        );
        controller.unpause();
        std::thread::sleep(run_for.saturating_sub(started.elapsed()));
    } else {
        std::thread::sleep(run_for);
    }

    if let Some(slot) = args.save_slot {
        session.select_slot(slot);
        controller.pause();
        session.save_state()?;
    }

    session.disconnect()?;
    controller.stop_emulation_async().wait()?;
    log_events(&session);

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "{} frames in {elapsed:.1}s ({:.1} fps)",
        frames.get(),
        frames.get() as f64 / elapsed.max(f64::EPSILON)
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
