//! Fisherman - auto fishing bot driven by an addon status pixel and the splash sound
//!
//! Usage:
//! - `fisherman` runs the bot with `<data>/config/settings.json` until the
//!   stop key is pressed, the bags are full or the time limit runs out.
//! - `fisherman --list-devices` prints the available audio input devices.

use std::sync::Arc;

use anyhow::{Context, Result};

use fisherman::audio::{list_input_devices, AudioEvent, AudioListener, AudioMonitor};
use fisherman::config::SettingsStore;
use fisherman::engine::{
    format_duration, BotEngine, BotEvent, Platform, Session, StatusObserver, SystemClock,
};
use fisherman::input::NativeInput;
use fisherman::keybinds::key_name;
use fisherman::log_main::{append_session, fishing_log_path, log_catch, sessions_path};
use fisherman::screen_reader::ScreenService;
use fisherman::utils::path::{debug_log_dir, settings_path};
use fisherman::Humanizer;

fn init_logging() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // cpal is chatty at debug level
    const LOG_FILTER: &str = "info,fisherman=info,cpal=warn";

    let log_dir = debug_log_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file_path = log_dir.join("debug.log");
    let file_result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LOG_FILTER));

    match file_result {
        Ok(file) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE);

            let stdout_layer = tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();

            tracing::info!("[INIT] Logging initialized, file: {:?}", log_file_path);
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            eprintln!(
                "[INIT] Failed to create debug log file at {:?}: {}",
                log_file_path, e
            );
        }
    }
}

fn print_devices() -> Result<()> {
    let devices = list_input_devices().context("failed to enumerate audio input devices")?;
    if devices.is_empty() {
        println!("No audio input devices found.");
    }
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}

fn print_summary(session: &Session) {
    println!("================================");
    println!("Session finished: {}", session.stop_reason);
    println!("Duration: {}", format_duration(session.duration()));
    println!("Throws:   {}", session.throws);
    println!("Catches:  {}", session.catches);
    println!("Rate:     {:.1}%", session.catch_rate());
}

fn main() -> Result<()> {
    init_logging();

    println!("Fisherman {}", env!("CARGO_PKG_VERSION"));
    println!("================================");

    if std::env::args().skip(1).any(|a| a == "--list-devices") {
        return print_devices();
    }

    let settings = Arc::new(SettingsStore::open(settings_path()));
    let snapshot = settings.snapshot();
    println!(
        "Keys: CAST={}, INTERACT={}, STOP={}",
        key_name(snapshot.cast_key()),
        key_name(snapshot.interact_key),
        key_name(snapshot.stop_key)
    );

    let listener: AudioListener = Arc::new(|event: AudioEvent| match event {
        AudioEvent::Level(level) => tracing::trace!("[AUDIO] level {:.2}", level),
        AudioEvent::Error(msg) => tracing::warn!("[AUDIO] {}", msg),
    });
    let monitor = Arc::new(AudioMonitor::new(Some(listener)));
    monitor
        .set_device(snapshot.audio_device().map(str::to_string))
        .context("failed to select audio device")?;
    monitor.start();

    let input = NativeInput::new().context("failed to initialize input injection")?;

    let catch_log = fishing_log_path();
    let observer: StatusObserver = Arc::new(move |event: &BotEvent| match event {
        BotEvent::Caught => {
            if let Err(e) = log_catch(&catch_log) {
                tracing::warn!("[INIT] Failed to write catch log: {}", e);
            }
        }
        BotEvent::Marker(point) => println!("Bobber at ({}, {})", point.x, point.y),
        _ => {}
    });

    let platform = Platform {
        screen: Arc::new(ScreenService::new()),
        input: Arc::new(input),
        levels: monitor.clone(),
        clock: Arc::new(SystemClock::new()),
        humanizer: Arc::new(Humanizer::new()),
    };
    let engine = BotEngine::new(settings, platform, Some(observer));

    println!(
        "Starting. Focus the game window; press {} to stop.",
        key_name(snapshot.stop_key)
    );
    engine.start().context("failed to start bot engine")?;
    let session = engine.join();
    monitor.stop();

    if let Err(e) = append_session(&sessions_path(), &session) {
        tracing::warn!("[INIT] Failed to write session log: {}", e);
    }
    print_summary(&session);
    Ok(())
}
