use ffmpeg_pipe::format::PcmFormat;
use tokio_util::sync::CancellationToken;

mod config;
mod finish;
mod mixer;
mod session;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_pipe", log::LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    let config = config::RecordingConfig::load().unwrap_or_else(|e| {
        eprintln!("Error loading config: {:#}", e);
        std::process::exit(1);
    });

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, finishing the recording...");
            cancel_clone.cancel();
        }
    });

    let mut session = match session::Session::start(&config, config.frame_rate).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("Failed to start recording: {:#}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Rendering {}s at {} fps, intermediate files in {}",
        config.duration_secs,
        config.frame_rate,
        session.layout().work_dir().display()
    );
    let mut mixer = mixer::ToneMixer::new(PcmFormat::default());
    let ticks = (config.duration_secs * config.frame_rate).round() as u64;
    for tick in 0..ticks {
        // checked between frames so every track receives the same count
        if cancel.is_cancelled() {
            break;
        }
        if let Err(e) = session.push(&mut mixer).await {
            log::error!("Audio render stopped at frame {}: {}", tick, e);
            break;
        }
    }

    match session.stop().await {
        Ok(report) => {
            for artifact in &report.artifacts {
                log::info!("Wrote {}", artifact.display());
            }
            std::process::exit(0);
        }
        Err(e) => {
            log::error!("Recording failed: {}", e);
            std::process::exit(1);
        }
    }
}
