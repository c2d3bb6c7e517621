use clap::Parser;
use client::{input, network, rendering};
use log::{error, info};
use shared::{GameStatus, ProtocolError};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::thread;
use tokio::sync::oneshot;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Client identifier, used to name the private FIFOs
    id: String,

    /// Moves file replayed instead of reading the keyboard
    moves: Option<PathBuf>,

    /// Server rendezvous FIFO
    #[arg(short = 's', long, default_value = "/tmp/mazerun_server")]
    server: PathBuf,

    /// Directory the private FIFOs are created in
    #[arg(long, default_value = network::DEFAULT_FIFO_DIR)]
    fifo_dir: PathBuf,

    /// Keep previous frames on screen instead of redrawing in place
    #[arg(long)]
    no_clear: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Connecting to: {}", args.server.display());

    let connection = {
        let (server, fifo_dir, id) = (args.server.clone(), args.fifo_dir.clone(), args.id.clone());
        tokio::task::spawn_blocking(move || network::Connection::connect(&server, &fifo_dir, &id))
            .await??
    };
    let (mut requests, mut snapshots) = connection.split();

    // Input thread: keyboard lines or the moves file
    let moves = args.moves.clone();
    thread::Builder::new().name("input".into()).spawn(move || {
        let result = match moves {
            Some(path) => File::open(&path).and_then(|file| {
                input::pump(
                    BufReader::new(file),
                    &mut requests,
                    Some(input::SCRIPT_PACING),
                )
            }),
            None => input::pump(io::stdin().lock(), &mut requests, None),
        };
        if let Err(e) = result {
            error!("input stopped: {}", e);
        }
    })?;

    // Display thread: draws snapshots until the server closes the session
    let (done_tx, done_rx) = oneshot::channel();
    let clear_screen = !args.no_clear;
    thread::Builder::new().name("display".into()).spawn(move || {
        let mut renderer = rendering::Renderer::new(io::stdout(), clear_screen);
        let mut last = None;
        let result = loop {
            match snapshots.next_snapshot() {
                Ok(Some(snapshot)) => {
                    if let Err(e) = renderer.render(&snapshot) {
                        break Err(ProtocolError::from(e));
                    }
                    last = Some(snapshot.status);
                }
                Ok(None) => break Ok(last),
                Err(e) => break Err(e),
            }
        };
        let _ = done_tx.send(result);
    })?;

    tokio::select! {
        result = done_rx => {
            match result {
                Ok(Ok(Some(GameStatus::Won))) => println!("All levels cleared!"),
                Ok(Ok(Some(GameStatus::Lost))) => println!("Game over."),
                Ok(Ok(_)) => println!("Disconnected."),
                Ok(Err(e)) => error!("Session failed: {}", e),
                Err(_) => error!("Display thread exited unexpectedly"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving the game");
        }
    }

    Ok(())
}
