use clap::Parser;
use log::{error, info, warn};
use server::acceptor::{self, Rendezvous};
use server::config::{Args, ServerConfig};
use server::context::ServerContext;
use server::error::ServerError;
use server::worker::{self, WorkerPool};
use std::sync::Arc;
use std::thread;
use tokio::net::TcpListener;

/// Main-method of the server.
/// Starts the worker pool, the FIFO acceptor and the admin endpoint, then waits for Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::try_from(Args::parse())?;
    let ctx = Arc::new(ServerContext::new(config)?);

    // Worker pool draining the admission queue
    let pool = {
        let queue = ctx.queue();
        let size = ctx.config.max_games;
        let ctx = Arc::clone(&ctx);
        WorkerPool::spawn(queue, size, move |id, session| {
            worker::serve_session(&ctx, id, session)
        })?
    };

    // Rendezvous FIFO and the blocking accept loop
    let rendezvous = Rendezvous::create(&ctx.config.rendezvous)?;
    {
        let ctx = Arc::clone(&ctx);
        thread::Builder::new()
            .name("acceptor".into())
            .spawn(move || acceptor::run(rendezvous, ctx))
            .map_err(|source| ServerError::Spawn {
                name: "acceptor".into(),
                source,
            })?;
    }

    // Admin endpoint
    let admin_addr = ctx.config.admin_addr;
    let listener = TcpListener::bind(admin_addr)
        .await
        .map_err(|source| ServerError::AdminBind {
            addr: admin_addr,
            source,
        })?;
    let admin_handle = tokio::spawn(server::admin::serve(listener, Arc::clone(&ctx)));

    info!(
        "server started: {} game worker(s), {} queue slot(s), levels in {}",
        pool.size(),
        ctx.queue().capacity(),
        ctx.config.levels_dir.display()
    );

    // Handle shutdown gracefully
    tokio::select! {
        result = admin_handle => {
            match result {
                Ok(Err(e)) => error!("admin endpoint stopped: {}", e),
                Err(e) => error!("admin task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    if let Err(e) = shared::fifo::remove_fifo(&ctx.config.rendezvous) {
        warn!("failed to remove rendezvous FIFO: {}", e);
    }
    Ok(())
}
