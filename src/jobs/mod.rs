//! Background job queue.
//!
//! Handlers submit work with `try_send` and never await the outcome. When
//! the queue is full or the worker is gone, `submit` hands the job back so
//! the caller can run it inline — the same work, just on the request path.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::notifications::{Mailer, OutgoingEmail};
use crate::DbPool;

#[derive(Debug)]
pub enum Job {
    /// Rebuild the daily rollup for (user, date), then the all-time rollup.
    RecomputeStatistics { user_id: String, date: String },
    SendEmail(OutgoingEmail),
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn new(tx: mpsc::Sender<Job>) -> Self {
        Self { tx }
    }

    /// Non-blocking submit. On failure the job is returned for inline
    /// execution by the caller.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(job) => job,
            mpsc::error::TrySendError::Closed(job) => job,
        })
    }
}

/// Drains the job channel for the life of the process.
pub struct JobWorker {
    db: DbPool,
    mailer: std::sync::Arc<Mailer>,
    rx: mpsc::Receiver<Job>,
}

impl JobWorker {
    pub fn new(db: DbPool, mailer: std::sync::Arc<Mailer>, rx: mpsc::Receiver<Job>) -> Self {
        Self { db, mailer, rx }
    }

    pub async fn run(mut self) {
        info!("Job worker started");

        while let Some(job) = self.rx.recv().await {
            match job {
                Job::RecomputeStatistics { user_id, date } => {
                    if let Err(e) = crate::stats::recompute_for_user(&self.db, &user_id, &date).await
                    {
                        error!(user_id = %user_id, error = %e, "Statistics recompute failed");
                    }
                }
                Job::SendEmail(email) => {
                    // Delivery failures are logged inside the mailer and
                    // never retried.
                    self.mailer.send(&email).await;
                }
            }
        }

        info!("Job worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_returns_job_when_queue_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = JobQueue::new(tx);

        assert!(queue
            .submit(Job::RecomputeStatistics {
                user_id: "u1".into(),
                date: "2025-01-01".into(),
            })
            .is_ok());

        let bounced = queue.submit(Job::RecomputeStatistics {
            user_id: "u2".into(),
            date: "2025-01-01".into(),
        });
        match bounced {
            Err(Job::RecomputeStatistics { user_id, .. }) => assert_eq!(user_id, "u2"),
            _ => panic!("expected the job back"),
        }
    }

    #[test]
    fn test_submit_returns_job_when_worker_is_gone() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let queue = JobQueue::new(tx);

        let bounced = queue.submit(Job::SendEmail(OutgoingEmail {
            to: "a@example.com".into(),
            subject: "s".into(),
            html_body: "<p>x</p>".into(),
            text_body: "x".into(),
        }));
        assert!(bounced.is_err());
    }
}
