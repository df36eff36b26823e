pub mod api;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod db;
pub mod jobs;
pub mod notifications;
pub mod stats;
pub mod utils;

pub use db::DbPool;

use std::sync::Arc;

use cache::ResponseCache;
use config::Config;
use jobs::JobQueue;
use notifications::Mailer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub cache: ResponseCache,
    pub jobs: JobQueue,
    pub mailer: Arc<Mailer>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, jobs: JobQueue, mailer: Arc<Mailer>) -> Self {
        Self {
            config,
            db,
            cache: ResponseCache::new(),
            jobs,
            mailer,
        }
    }
}
