//! Fixed pool of game workers fed by the admission queue.

use log::{error, info, warn};
use std::fs::File;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::acceptor::SessionRequest;
use crate::admission::AdmissionQueue;
use crate::context::ServerContext;
use crate::error::{ServerError, SessionError};
use crate::level::discover_levels;
use crate::session::Session;

/// Unit of work handed to a worker.
#[derive(Debug)]
pub enum Job<T> {
    Run(T),
    /// Ends the worker that dequeues it.
    Stop,
}

pub struct WorkerPool<T: Send + 'static> {
    queue: Arc<AdmissionQueue<Job<T>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Starts `size` workers, each calling `handler(worker_id, job)` for every
    /// job it dequeues.
    pub fn spawn<H>(
        queue: Arc<AdmissionQueue<Job<T>>>,
        size: usize,
        handler: H,
    ) -> Result<Self, ServerError>
    where
        H: Fn(usize, T) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let name = format!("worker-{}", id);
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(id, &queue, handler.as_ref()))
                .map_err(|source| ServerError::Spawn { name, source })?;
            workers.push(worker);
        }

        Ok(Self { queue, workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stops every worker once the jobs queued ahead of the stop jobs are done.
    pub fn shutdown(self) {
        for _ in &self.workers {
            self.queue.push(Job::Stop);
        }
        for worker in self.workers {
            if worker.join().is_err() {
                error!("worker exited by panic");
            }
        }
    }
}

fn worker_loop<T, H>(id: usize, queue: &AdmissionQueue<Job<T>>, handler: &H)
where
    H: Fn(usize, T),
{
    info!("worker {} ready", id);
    loop {
        match queue.pop() {
            Job::Run(job) => {
                if panic::catch_unwind(AssertUnwindSafe(|| handler(id, job))).is_err() {
                    error!("worker {}: session panicked", id);
                }
            }
            Job::Stop => break,
        }
    }
    info!("worker {} stopped", id);
}

/// Plays one admitted session from start to finish and records its score.
pub fn serve_session(ctx: &ServerContext, worker_id: usize, request: SessionRequest) {
    info!(
        "worker {}: serving {}",
        worker_id,
        request.request_path.display()
    );
    if let Err(e) = play_session(ctx, request) {
        warn!("worker {}: session aborted: {}", worker_id, e);
    }
    info!("worker {}: session finished", worker_id);
}

fn play_session(ctx: &ServerContext, request: SessionRequest) -> Result<(), SessionError> {
    let levels = discover_levels(&ctx.config.levels_dir)?;
    if levels.is_empty() {
        return Err(SessionError::NoLevels(ctx.config.levels_dir.clone()));
    }

    let requests =
        File::open(&request.request_path).map_err(|source| SessionError::RequestChannel {
            path: request.request_path.clone(),
            source,
        })?;

    let slot = ctx.scoreboard.register();
    match slot {
        Some(slot) => info!("client {} joined", slot.client_id),
        None => warn!("scoreboard full; session will not be ranked"),
    }

    let mut session = Session::new(levels, requests, request.notifications);
    let result = session.play(|report| {
        if let Some(slot) = slot {
            ctx.scoreboard.update(slot, report.points);
        }
    });
    if let Some(slot) = slot {
        ctx.scoreboard.finish(slot, session.points());
    }

    let outcome = result?;
    info!(
        "session ended {:?} after {} level(s) with {} points",
        outcome,
        session.levels_won(),
        session.points()
    );
    Ok(())
}
