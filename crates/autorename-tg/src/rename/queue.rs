use super::{
    render_status, InboundFile, Job, JobCtx, JobId, JobStatus, Outcome, Pipeline, RenameError,
    StatusView, Transport,
};
use crate::observability::metrics::names;
use crate::prelude::*;
use metrics::counter;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use teloxide::types::MessageId;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub(crate) const DUPLICATE_REPLY: &str = "⏳ This file is already being processed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Submission {
    Accepted(JobId),

    /// The same file was submitted moments ago and is still being handled
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueuePhase {
    /// No worker is running
    Idle,

    /// Exactly one worker drains the queue
    Running,
}

struct QueueState {
    /// Pending and processing jobs in the submission order. Terminal jobs
    /// stay here only until the status with them is published once.
    jobs: Vec<Job>,
    phase: QueuePhase,

    /// Cancelled when the user requests to abort everything. The worker
    /// replaces it with a fresh token before starting the next job.
    abort: CancellationToken,
}

/// Serializes the processing of the files sent to a single chat
pub(crate) struct RenameQueue {
    transport: Arc<dyn Transport>,
    pipeline: Arc<Pipeline>,
    state: parking_lot::Mutex<QueueState>,

    /// Also serializes the status updates, so they arrive in order
    status_message: tokio::sync::Mutex<Option<MessageId>>,

    idle: Notify,
}

impl RenameQueue {
    pub(crate) fn new(transport: Arc<dyn Transport>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            transport,
            pipeline,
            state: parking_lot::Mutex::new(QueueState {
                jobs: Vec::new(),
                phase: QueuePhase::Idle,
                abort: CancellationToken::new(),
            }),
            status_message: Default::default(),
            idle: Notify::new(),
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        &*self.transport
    }

    /// Appends the file to the queue. The worker is started only if the queue
    /// was idle, otherwise the running worker will pick the job up.
    pub(crate) async fn enqueue(self: &Arc<Self>, file: InboundFile) -> Submission {
        let job = Job::new(file);
        let id = job.id.clone();

        if let Some(file_id) = job.file.file_id() {
            if !self
                .pipeline
                .suppressor
                .try_acquire(file_id, &id, Instant::now())
            {
                counter!(names::DUPLICATES_SUPPRESSED).increment(1);
                return Submission::Duplicate;
            }
        }

        counter!(names::FILES_RECEIVED).increment(1);

        let start_worker = {
            let mut state = self.state.lock();
            state.jobs.push(job);

            let was_idle = state.phase == QueuePhase::Idle;
            state.phase = QueuePhase::Running;
            was_idle
        };

        info!(job = %id, start_worker, "Enqueued a job");

        if start_worker {
            tokio::spawn(self.clone().run_worker_loop().in_current_span());
        }

        self.publish().await;

        Submission::Accepted(id)
    }

    /// Pending jobs are aborted right away. The job being processed stops at
    /// its next cancellation point. Returns `false` if there was nothing to
    /// abort.
    pub(crate) async fn request_abort_all(&self) -> bool {
        let aborted: Vec<_> = {
            let mut state = self.state.lock();

            if state.phase == QueuePhase::Idle {
                return false;
            }

            state.abort.cancel();

            state
                .jobs
                .iter_mut()
                .filter(|job| job.status == JobStatus::Pending)
                .map(|job| {
                    job.status = JobStatus::Aborted;
                    job.error_reason = Some(RenameError::Aborted.to_string());

                    if let Some(file_id) = job.file.file_id() {
                        self.pipeline.suppressor.clear(file_id, &job.id);
                    }

                    job.file.message
                })
                .collect()
        };

        counter!(names::JOBS_FINISHED, "outcome" => Outcome::Aborted.label())
            .increment(aborted.len() as u64);

        info!(pending_aborted = aborted.len(), "Abort of all jobs requested");

        self.publish().await;

        for message in aborted {
            self.reply(message, &aborted_reply()).await;
        }

        true
    }

    pub(crate) fn render_status(&self) -> StatusView {
        let state = self.state.lock();
        render_status(&state.jobs, state.abort.is_cancelled())
    }

    async fn run_worker_loop(self: Arc<Self>) {
        debug!("Queue worker started");

        loop {
            let Some(ctx) = self.start_next() else {
                if self.finish().await {
                    break;
                }
                continue;
            };

            // The pipeline publishes the status once the job is known
            // not to be a duplicate
            let outcome = self.pipeline.process(&ctx).await;

            self.complete(ctx, outcome).await;
        }

        debug!("Queue worker stopped");
    }

    fn start_next(&self) -> Option<JobCtx<'_>> {
        let mut state = self.state.lock();

        if state.abort.is_cancelled() {
            state.abort = CancellationToken::new();
        }

        let abort = state.abort.clone();

        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.status == JobStatus::Pending)?;

        job.status = JobStatus::Processing;

        Some(JobCtx {
            queue: self,
            id: job.id.clone(),
            file: job.file.clone(),
            original_filename: job.original_filename.clone(),
            abort,
        })
    }

    async fn complete(&self, ctx: JobCtx<'_>, outcome: Outcome) {
        counter!(names::JOBS_FINISHED, "outcome" => outcome.label()).increment(1);

        if let Some(file_id) = ctx.file.file_id() {
            self.pipeline.suppressor.clear(file_id, &ctx.id);
        }

        let leftovers = if outcome == Outcome::Suppressed {
            let mut state = self.state.lock();
            let position = state.jobs.iter().position(|job| job.id == ctx.id);
            position
                .map(|position| state.jobs.remove(position).local_paths)
                .unwrap_or_default()
        } else {
            self.update_job(&ctx.id, |job| {
                match &outcome {
                    Outcome::Completed { rendered_name } => {
                        job.status = JobStatus::Completed;
                        job.rendered_name = Some(rendered_name.clone());
                    }
                    Outcome::Failed { reason } => {
                        job.status = JobStatus::Failed;
                        job.error_reason = Some(reason.clone());
                    }
                    Outcome::Aborted | Outcome::Suppressed => {
                        job.status = JobStatus::Aborted;
                        job.error_reason = Some(RenameError::Aborted.to_string());
                    }
                }
                std::mem::take(&mut job.local_paths)
            })
            .unwrap_or_default()
        };

        remove_leftovers(leftovers).await;

        self.publish().await;

        match outcome {
            Outcome::Completed { rendered_name } => {
                let result = self
                    .transport
                    .log_completed(ctx.file.owner, &ctx.original_filename, &rendered_name)
                    .await;

                if let Err(err) = result {
                    warn!(err = tracing_err(&err), "Failed to log the completed job");
                }
            }
            Outcome::Failed { reason } => {
                self.reply(ctx.file.message, &format!("❌ Failed: {reason}"))
                    .await;
            }
            Outcome::Aborted => self.reply(ctx.file.message, &aborted_reply()).await,
            Outcome::Suppressed => self.reply(ctx.file.message, DUPLICATE_REPLY).await,
        }
    }

    /// Transitions the queue to idle unless more jobs arrived in the meantime.
    /// Returns `true` if the queue is idle now.
    async fn finish(&self) -> bool {
        let mut status_message = self.status_message.lock().await;

        {
            let mut state = self.state.lock();

            if state
                .jobs
                .iter()
                .any(|job| job.status == JobStatus::Pending)
            {
                return false;
            }

            state.phase = QueuePhase::Idle;
            state.abort = CancellationToken::new();
            state.jobs.clear();
        }

        if let Some(id) = status_message.take() {
            if let Err(err) = self.transport.delete_status(id).await {
                warn!(err = tracing_err(&err), "Failed to delete the status message");
            }
        }

        self.idle.notify_waiters();

        true
    }

    /// Sends the current status to the chat. Terminal jobs are evicted
    /// after they are rendered.
    pub(crate) async fn publish(&self) {
        let mut status_message = self.status_message.lock().await;

        let view = {
            let mut state = self.state.lock();

            if state.jobs.is_empty() {
                return;
            }

            let view = render_status(&state.jobs, state.abort.is_cancelled());
            state.jobs.retain(|job| !job.status.is_terminal());
            view
        };

        let result = if let Some(id) = *status_message {
            self.transport.edit_status(id, &view).await
        } else {
            match self.transport.send_status(&view).await {
                Ok(id) => {
                    *status_message = Some(id);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        };

        if let Err(err) = result {
            warn!(err = tracing_err(&err), "Failed to publish the queue status");
        }
    }

    pub(crate) fn update_job<R>(&self, id: &JobId, update: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut state = self.state.lock();
        let job = state.jobs.iter_mut().find(|job| job.id == *id)?;
        Some(update(job))
    }

    async fn reply(&self, to: MessageId, text: &str) {
        if let Err(err) = self.transport.reply(to, text).await {
            warn!(err = tracing_err(&err), "Failed to reply to the file message");
        }
    }

    /// Resolves when the worker has stopped and the status message is gone
    #[cfg(test)]
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            futures::pin_mut!(notified);
            notified.as_mut().enable();

            if self.state.lock().phase == QueuePhase::Idle {
                // `finish` holds this lock until the status message is deleted
                drop(self.status_message.lock().await);
                return;
            }

            notified.await;
        }
    }
}

/// Queues keyed by chat. A queue is dropped once it is idle and nothing but
/// the registry refers to it, so the map holds only the chats with files in
/// flight.
pub(crate) struct QueueRegistry<K> {
    queues: parking_lot::Mutex<HashMap<K, Arc<RenameQueue>>>,
}

impl<K> Default for QueueRegistry<K> {
    fn default() -> Self {
        Self {
            queues: Default::default(),
        }
    }
}

impl<K: Hash + Eq> QueueRegistry<K> {
    pub(crate) fn get_or_create(
        &self,
        key: K,
        create: impl FnOnce() -> RenameQueue,
    ) -> Arc<RenameQueue> {
        let mut queues = self.queues.lock();

        // The worker holds a reference to its queue while it runs
        queues.retain(|_, queue| Arc::strong_count(queue) > 1);

        queues
            .entry(key)
            .or_insert_with(|| Arc::new(create()))
            .clone()
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<RenameQueue>> {
        self.queues.lock().get(key).cloned()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queues.lock().len()
    }
}

fn aborted_reply() -> String {
    format!("🚫 {}", RenameError::Aborted)
}

/// The job directory is normally removed by the pipeline. This catches
/// whatever survived it.
async fn remove_leftovers(paths: Vec<PathBuf>) {
    for path in paths.iter().rev() {
        let result = match fs_err::tokio::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => fs_err::tokio::remove_dir_all(path).await,
            Ok(_) => fs_err::tokio::remove_file(path).await,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => warn!(path = %path.display(), "Removed a leftover job file"),
            Err(err) => warn!(err = tracing_err(&err), "Failed to remove a leftover job file"),
        }
    }
}
