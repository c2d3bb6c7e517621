use clap::Parser;
use shared::admin::{decode_payload, encode_frame, frame_len, AdminRequest, AdminResponse};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Queries a running server's scoreboard.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Admin endpoint of the server
    #[clap(short, long, default_value = "127.0.0.1:9090")]
    addr: String,
    /// Ask the server to write its score report instead of listing scores
    #[clap(short, long)]
    dump: bool,
    /// Number of entries to list
    #[clap(short, long, default_value = "5")]
    limit: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let request = if args.dump {
        AdminRequest::DumpScores
    } else {
        AdminRequest::TopScores { limit: args.limit }
    };

    let mut stream = TcpStream::connect(&args.addr).await?;
    log::debug!("connected to {}", args.addr);
    stream.write_all(&encode_frame(&request)?).await?;

    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await?;
    let mut payload = vec![0u8; frame_len(prefix)?];
    stream.read_exact(&mut payload).await?;

    match decode_payload::<AdminResponse>(&payload)? {
        AdminResponse::Scores { entries } if entries.is_empty() => {
            println!("No scores recorded yet.");
        }
        AdminResponse::Scores { entries } => {
            for (rank, entry) in entries.iter().enumerate() {
                let status = if entry.active { " (playing)" } else { "" };
                println!(
                    "{}. Client {}: {} points{}",
                    rank + 1,
                    entry.client_id,
                    entry.score,
                    status
                );
            }
        }
        AdminResponse::Dumped { path } => println!("Scoreboard written to {}", path),
        AdminResponse::Error { reason } => return Err(reason.into()),
    }
    Ok(())
}
