// Event dispatch: bounded queue in front of a concurrency-limited worker

use crate::config::PipelineConfig;
use crate::error::{Result, SleuthError};
use crate::inquiry::{IntakeOutcome, ReactionIntake, ReactionNotice};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Work accepted by the webhook surface
#[derive(Debug, Clone)]
pub enum Job {
    Reaction(ReactionNotice),
    InquiryRequest {
        channel_id: String,
        user_id: String,
        question: String,
    },
}

impl Job {
    fn kind(&self) -> &'static str {
        match self {
            Job::Reaction(_) => "reaction",
            Job::InquiryRequest { .. } => "inquiry_request",
        }
    }
}

/// Executes dispatched jobs
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job) -> Result<()>;
}

#[async_trait]
impl JobHandler for ReactionIntake {
    async fn handle(&self, job: Job) -> Result<()> {
        match job {
            Job::Reaction(notice) => {
                let message_id = notice.message_id.clone();
                match self.on_reaction(notice).await? {
                    IntakeOutcome::Ignored => {}
                    IntakeOutcome::AlreadyProcessed { inquiry_id } => {
                        tracing::debug!(message_id = %message_id, inquiry_id, "Reaction on known message");
                    }
                    IntakeOutcome::Processed(inquiry) => {
                        tracing::debug!(
                            message_id = %message_id,
                            inquiry_id = inquiry.id,
                            status = %inquiry.status,
                            "Reaction processed"
                        );
                    }
                }
                Ok(())
            }
            Job::InquiryRequest {
                channel_id,
                user_id,
                question,
            } => {
                self.on_inquiry_request(&channel_id, &user_id, &question)
                    .await
                    .map(|_| ())
            }
        }
    }
}

/// Dispatch limits
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub queue_size: usize,
    pub max_concurrent: usize,
    pub deadline: Duration,
}

impl From<&PipelineConfig> for DispatchSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queue_size: config.queue_size,
            max_concurrent: config.max_concurrent,
            deadline: Duration::from_secs(config.deadline_secs),
        }
    }
}

/// Cloneable submission side of the dispatcher
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

impl JobSender {
    /// Queue a job without waiting; fails when the queue is full or closed
    pub fn submit(&self, job: Job) -> Result<()> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                tracing::warn!(job = job.kind(), "Dispatch queue full, rejecting job");
                SleuthError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => {
                SleuthError::Config("dispatcher is shut down".to_string())
            }
        })
    }
}

/// Runs accepted jobs as independent tasks
pub struct Dispatcher {
    job_tx: mpsc::Sender<Job>,
    worker_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn JobHandler>, settings: DispatchSettings) -> Self {
        let (job_tx, job_rx) = mpsc::channel(settings.queue_size.max(1));

        let worker_handle = Some(tokio::spawn(async move {
            dispatch_worker(job_rx, handler, settings).await;
        }));

        Self {
            job_tx,
            worker_handle,
        }
    }

    pub fn sender(&self) -> JobSender {
        JobSender {
            tx: self.job_tx.clone(),
        }
    }

    /// Stop accepting jobs and wait for queued and running jobs to finish.
    ///
    /// Every [`JobSender`] must be dropped first or the queue never closes.
    pub async fn shutdown(mut self) {
        drop(self.job_tx);

        if let Some(handle) = self.worker_handle.take() {
            tracing::info!("Waiting for dispatcher to drain...");
            let _ = handle.await;
            tracing::info!("Dispatcher drained successfully");
        }
    }
}

async fn dispatch_worker(
    mut job_rx: mpsc::Receiver<Job>,
    handler: Arc<dyn JobHandler>,
    settings: DispatchSettings,
) {
    let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
    let mut tasks: JoinSet<JobResult> = JoinSet::new();
    let mut stats = WorkerStats::default();

    loop {
        tokio::select! {
            Some(job) = job_rx.recv() => {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let handler = handler.clone();
                let deadline = settings.deadline;

                tasks.spawn(async move {
                    let _permit = permit;
                    run_job(handler.as_ref(), job, deadline).await
                });
            }

            Some(joined) = tasks.join_next() => {
                stats.record(joined);
            }

            // Queue closed and every task finished
            else => break,
        }
    }

    while let Some(joined) = tasks.join_next().await {
        stats.record(joined);
    }

    tracing::info!(
        processed = stats.processed,
        failed = stats.failed,
        timed_out = stats.timed_out,
        "Dispatch worker finished"
    );
}

async fn run_job(handler: &dyn JobHandler, job: Job, deadline: Duration) -> JobResult {
    let kind = job.kind();

    // Timing out drops the pipeline future; its inquiry stays in `processing`
    match tokio::time::timeout(deadline, handler.handle(job)).await {
        Ok(Ok(())) => JobResult::Done,
        Ok(Err(e)) => {
            tracing::error!(job = kind, error = %e, "Job failed");
            JobResult::Failed
        }
        Err(_) => {
            tracing::error!(job = kind, deadline_secs = deadline.as_secs(), "Job exceeded deadline");
            JobResult::TimedOut
        }
    }
}

enum JobResult {
    Done,
    Failed,
    TimedOut,
}

/// Statistics for the dispatch worker
#[derive(Default)]
struct WorkerStats {
    processed: u64,
    failed: u64,
    timed_out: u64,
}

impl WorkerStats {
    fn record(&mut self, joined: std::result::Result<JobResult, tokio::task::JoinError>) {
        match joined {
            Ok(JobResult::Done) => self.processed += 1,
            Ok(JobResult::Failed) => self.failed += 1,
            Ok(JobResult::TimedOut) => self.timed_out += 1,
            Err(e) => {
                tracing::error!(error = %e, "Job task panicked");
                self.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        handled: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl CountingHandler {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                handled: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: Job) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn request(i: usize) -> Job {
        Job::InquiryRequest {
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            question: format!("question {}", i),
        }
    }

    fn settings(queue_size: usize, max_concurrent: usize) -> DispatchSettings {
        DispatchSettings {
            queue_size,
            max_concurrent,
            deadline: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let handler = CountingHandler::new(Duration::from_millis(10));
        let dispatcher = Dispatcher::new(handler.clone(), settings(16, 2));

        let sender = dispatcher.sender();
        for i in 0..6 {
            sender.submit(request(i)).unwrap();
        }
        drop(sender);

        dispatcher.shutdown().await;
        assert_eq!(handler.handled.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let handler = CountingHandler::new(Duration::from_millis(30));
        let dispatcher = Dispatcher::new(handler.clone(), settings(32, 2));

        let sender = dispatcher.sender();
        for i in 0..8 {
            sender.submit(request(i)).unwrap();
        }
        drop(sender);

        dispatcher.shutdown().await;
        assert_eq!(handler.handled.load(Ordering::SeqCst), 8);
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_full_queue_reports_queue_full() {
        let handler = CountingHandler::new(Duration::from_millis(10));
        let dispatcher = Dispatcher::new(handler.clone(), settings(2, 1));

        // The worker has not been polled yet on this single-threaded runtime
        let sender = dispatcher.sender();
        sender.submit(request(0)).unwrap();
        sender.submit(request(1)).unwrap();
        assert!(matches!(sender.submit(request(2)), Err(SleuthError::QueueFull)));
        drop(sender);

        dispatcher.shutdown().await;
        assert_eq!(handler.handled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_deadline_cancels_job() {
        let handler = CountingHandler::new(Duration::from_secs(60));
        let dispatcher = Dispatcher::new(
            handler.clone(),
            DispatchSettings {
                queue_size: 4,
                max_concurrent: 1,
                deadline: Duration::from_millis(20),
            },
        );

        dispatcher.sender().submit(request(0)).unwrap();
        dispatcher.shutdown().await;
        assert_eq!(handler.handled.load(Ordering::SeqCst), 0);
    }
}
