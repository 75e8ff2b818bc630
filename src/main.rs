use clap::Parser;
use hamon_lib::replay::{self, ReplayEnd};
use hamon_lib::{logger, AppEvent, CallError, CallSession, Config, Session};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Консольный участник звонка
#[derive(Parser, Debug)]
#[command(name = "hamon", about = "Join a two-party call room without a UI")]
struct Cli {
    /// Комната на сигнальном сервере
    #[arg(long, env = "HAMON_ROOM", default_value = "default")]
    room: String,

    /// Имя участника
    #[arg(long, env = "HAMON_USER")]
    user: String,

    /// JSON-lines файл с результатами детектора, по одному кадру на строку
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Пауза между кадрами при воспроизведении, мс
    #[arg(long, default_value_t = 33)]
    frame_interval_ms: u64,
}

#[tokio::main]
async fn main() {
    logger::init();
    if let Err(err) = run(Cli::parse()).await {
        error!(error = %err, "hamon failed");
        eprintln!("hamon: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CallError> {
    let config = Config::from_env()?;
    let session = Session::new(cli.room, cli.user);
    info!(room = %session.room_id, user = %session.user, "Starting call");

    let (call, mut events) = CallSession::connect(&config, session).await?;

    match cli.replay {
        Some(path) => {
            let interval = Duration::from_millis(cli.frame_interval_ms);
            let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
            let reader = tokio::spawn(async move {
                if let Err(e) = replay::read_frames(&path, interval, frames_tx).await {
                    warn!(error = %e, path = %path.display(), "Replay aborted");
                }
            });

            tokio::select! {
                end = replay::drive(&call, &mut events, &mut frames_rx, log_event) => {
                    match end? {
                        ReplayEnd::Finished => info!("Replay complete"),
                        ReplayEnd::SessionEnded => info!("Session ended during replay"),
                    }
                }
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            reader.abort();
        }
        None => {
            tokio::select! {
                () = replay::watch(&mut events, log_event) => info!("Session ended"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
    }

    let labels = call.consume_labels().await.unwrap_or_default();
    if !labels.is_empty() {
        info!(?labels, "Recognized during call");
    }
    call.leave().await;
    Ok(())
}

fn log_event(ev: &AppEvent) {
    match ev {
        AppEvent::RosterChanged(users) => info!(?users, "Roster"),
        AppEvent::LabelRecognized(label) => info!(%label, "Recognized"),
        AppEvent::PeerLeft(user) => info!(%user, "Peer left"),
        AppEvent::NegotiationFailed(reason) => error!(%reason, "Negotiation failed"),
        AppEvent::ConnectionFailed => warn!("Media connection lost"),
        other => info!(event = ?other, "Event"),
    }
}
