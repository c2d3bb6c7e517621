//! Command line and validated server configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ServerError;

pub const DEFAULT_RENDEZVOUS: &str = "/tmp/mazerun_server";
pub const DEFAULT_ADMIN_ADDR: &str = "127.0.0.1:9090";
pub const DEFAULT_SCORE_LOG: &str = "score_log.txt";
pub const DEFAULT_REPORT_TOP: usize = 5;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Directory holding the level files (*.lvl, *.txt)
    pub levels_dir: PathBuf,
    /// Maximum number of games played at the same time
    pub max_games: usize,
    /// Rendezvous FIFO clients send connect requests to
    #[clap(short, long, default_value = DEFAULT_RENDEZVOUS)]
    pub fifo: PathBuf,
    /// Address of the admin endpoint
    #[clap(short, long, default_value = DEFAULT_ADMIN_ADDR)]
    pub admin_addr: SocketAddr,
    /// File the scoreboard report is written to on request
    #[clap(short, long, default_value = DEFAULT_SCORE_LOG)]
    pub score_log: PathBuf,
    /// Number of entries in the written report
    #[clap(short, long, default_value_t = DEFAULT_REPORT_TOP)]
    pub top: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub levels_dir: PathBuf,
    pub max_games: usize,
    pub rendezvous: PathBuf,
    pub admin_addr: SocketAddr,
    pub score_log: PathBuf,
    pub report_top: usize,
}

impl ServerConfig {
    /// Defaults for everything but the levels and the pool size.
    pub fn new(levels_dir: impl Into<PathBuf>, max_games: usize) -> Self {
        Self {
            levels_dir: levels_dir.into(),
            max_games,
            rendezvous: PathBuf::from(DEFAULT_RENDEZVOUS),
            admin_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
            score_log: PathBuf::from(DEFAULT_SCORE_LOG),
            report_top: DEFAULT_REPORT_TOP,
        }
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_games == 0 {
            return Err(ServerError::ZeroCapacity);
        }
        if !self.levels_dir.is_dir() {
            return Err(ServerError::MissingLevelsDir(self.levels_dir.clone()));
        }
        Ok(())
    }
}

impl TryFrom<Args> for ServerConfig {
    type Error = ServerError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let config = Self {
            levels_dir: args.levels_dir,
            max_games: args.max_games,
            rendezvous: args.fifo,
            admin_addr: args.admin_addr,
            score_log: args.score_log,
            report_top: args.top,
        };
        config.validate()?;
        Ok(config)
    }
}
