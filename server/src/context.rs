use log::debug;
use std::sync::Arc;

use crate::acceptor::SessionRequest;
use crate::admission::AdmissionQueue;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::scoreboard::Scoreboard;
use crate::worker::Job;

/// State shared by the acceptor, the workers and the admin endpoint.
pub struct ServerContext {
    pub config: ServerConfig,
    pub scoreboard: Scoreboard,
    queue: Arc<AdmissionQueue<Job<SessionRequest>>>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let queue = Arc::new(AdmissionQueue::new(config.max_games)?);
        Ok(Self {
            config,
            scoreboard: Scoreboard::new(),
            queue,
        })
    }

    pub fn queue(&self) -> Arc<AdmissionQueue<Job<SessionRequest>>> {
        Arc::clone(&self.queue)
    }

    /// Hands an accepted session to the pool, blocking while the queue is full.
    pub fn admit(&self, session: SessionRequest) {
        self.queue.push(Job::Run(session));
        debug!("{} session(s) waiting for a worker", self.queue.len());
    }
}
