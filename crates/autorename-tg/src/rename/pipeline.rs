use super::caption::compose_caption;
use super::{
    tag_family, DuplicateSuppressor, InboundFile, InboundMedia, JobId, MediaKind, MediaTools,
    Progress, RenameError, RenameQueue, TagFamily, Transport, Upload,
};
use crate::naming::{self, PatternMatcher};
use crate::observability::metrics::names;
use crate::prefs::{PrefsStore, UserPrefs};
use crate::prelude::*;
use crate::util::display::human_size;
use crate::util::media_conv::normalize_thumbnail;
use crate::{err, err_ctx, Error, ErrorKind, IoError, Result};
use futures::prelude::*;
use metrics::histogram;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::{ApiError, RequestError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How often the status message is refreshed while the file is downloading
const PROGRESS_PUBLISH_INTERVAL: Duration = Duration::from_secs(5);

/// Stateless part of the file processing shared by all queues
pub(crate) struct Pipeline {
    pub(crate) prefs: Arc<dyn PrefsStore>,
    pub(crate) media: Arc<dyn MediaTools>,
    pub(crate) suppressor: Arc<DuplicateSuppressor>,
    pub(crate) matcher: PatternMatcher,
    pub(crate) work_dir: PathBuf,
    pub(crate) thumbnail_side: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed { rendered_name: String },
    Failed { reason: String },
    Aborted,

    /// The same file is being processed by another job. This job is dropped
    /// from the status without reaching a terminal state, and the user is
    /// told that the file is already being processed.
    Suppressed,
}

impl Outcome {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Aborted => "aborted",
            Self::Suppressed => "suppressed",
        }
    }
}

/// The job being processed and the means to report its progress
pub(crate) struct JobCtx<'a> {
    pub(crate) queue: &'a RenameQueue,
    pub(crate) id: JobId,
    pub(crate) file: InboundFile,
    pub(crate) original_filename: String,
    pub(crate) abort: CancellationToken,
}

impl JobCtx<'_> {
    /// Cancellation point. Aborting never interrupts a stage in flight.
    fn checkpoint(&self) -> Result {
        if self.abort.is_cancelled() {
            return Err(err!(RenameError::Aborted));
        }
        Ok(())
    }

    async fn stage(&self, progress: u8, log: &str) {
        debug!(progress, log, "Entering stage");
        self.queue.update_job(&self.id, |job| {
            job.progress = Progress::new(progress);
            job.log = Some(log.to_owned());
        });
        self.queue.publish().await;
    }

    fn set_log(&self, log: String) {
        self.queue.update_job(&self.id, |job| job.log = Some(log));
    }

    fn record_path(&self, path: &Path) {
        self.queue
            .update_job(&self.id, |job| job.local_paths.push(path.to_owned()));
    }

    fn transport(&self) -> &dyn Transport {
        self.queue.transport()
    }
}

impl Pipeline {
    /// Drives the job to its outcome. Never fails and never panics, every
    /// problem is reported in the outcome.
    #[instrument(skip_all, fields(job = %ctx.id, file = %ctx.original_filename))]
    pub(crate) async fn process(&self, ctx: &JobCtx<'_>) -> Outcome {
        let (result, duration) = AssertUnwindSafe(self.try_process(ctx))
            .catch_unwind()
            .with_duration()
            .await;

        histogram!(names::JOB_DURATION).record(duration.as_secs_f64());

        match result {
            Ok(Ok(rendered_name)) => {
                info!(%rendered_name, duration = tracing_duration(duration), "Job completed");
                Outcome::Completed { rendered_name }
            }
            Ok(Err(err)) => self.classify_error(ctx, err),
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(message, "Job panicked");

                if ctx.abort.is_cancelled() {
                    return Outcome::Aborted;
                }
                Outcome::Failed {
                    reason: format!("Unexpected error: {message}"),
                }
            }
        }
    }

    fn classify_error(&self, ctx: &JobCtx<'_>, err: Error) -> Outcome {
        if let ErrorKind::Rename {
            source: RenameError::DuplicateSubmission,
        } = err.kind()
        {
            info!("Job dropped, the same file is being processed by another job");
            return Outcome::Suppressed;
        }

        if ctx.abort.is_cancelled() {
            info!(err = tracing_err(&err), "Job aborted");
            return Outcome::Aborted;
        }

        if err.is_user_error() {
            info!(err = tracing_err(&err), "Job failed because of the user input");
        } else {
            warn!(err = tracing_err(&err), "Job failed");
        }

        Outcome::Failed {
            reason: err.reason(),
        }
    }

    async fn try_process(&self, ctx: &JobCtx<'_>) -> Result<String> {
        ctx.checkpoint()?;

        let prefs = self.prefs.get(ctx.file.owner).await?;

        let template = prefs
            .format_template
            .as_deref()
            .filter(|template| !template.trim().is_empty())
            .ok_or_else(|| err!(RenameError::NoFormatTemplate))?;

        let media = ctx
            .file
            .media
            .as_ref()
            .ok_or_else(|| err!(RenameError::UnsupportedInput))?;

        let now = Instant::now();
        if self.suppressor.should_reject(&media.file_id, &ctx.id, now) {
            return Err(err!(RenameError::DuplicateSubmission));
        }
        self.suppressor.mark_active(&media.file_id, &ctx.id, now);

        ctx.queue.publish().await;

        let rendered = naming::rendered_name(&self.matcher, template, &ctx.original_filename);

        ctx.queue
            .update_job(&ctx.id, |job| job.rendered_name = Some(rendered.clone()));

        ctx.checkpoint()?;

        let workspace = self.create_workspace(ctx).await?;

        let result = self
            .run_io_stages(ctx, &prefs, media, &rendered, workspace.path())
            .await;

        // Other exit paths (panics, cancellation of the task) rely on `Drop`
        let dir = workspace.path().to_owned();
        if let Err(err) = workspace.close() {
            warn!(
                err = tracing_err(&err),
                dir = %dir.display(),
                "Failed to remove the job directory"
            );
        }

        result.map(|()| rendered)
    }

    async fn create_workspace(&self, ctx: &JobCtx<'_>) -> Result<tempfile::TempDir> {
        fs_err::tokio::create_dir_all(&self.work_dir).await?;

        let workspace = tempfile::Builder::new()
            .prefix(&format!("{}-", ctx.id))
            .tempdir_in(&self.work_dir)
            .map_err(err_ctx!(IoError::CreateTempDir {
                dir: self.work_dir.display().to_string(),
            }))?;

        ctx.record_path(workspace.path());

        Ok(workspace)
    }

    async fn run_io_stages(
        &self,
        ctx: &JobCtx<'_>,
        prefs: &UserPrefs,
        media: &InboundMedia,
        rendered: &str,
        dir: &Path,
    ) -> Result {
        let upload_kind = prefs.media_type.unwrap_or(media.kind);
        let disk_name = disk_file_name(rendered);
        let extension = naming::extension(&ctx.original_filename);

        ctx.stage(0, "Downloading...").await;

        let download_dir = dir.join("download");
        fs_err::tokio::create_dir(&download_dir).await?;

        let downloaded = download_dir.join(&disk_name);
        ctx.record_path(&downloaded);

        self.download(ctx, media, &downloaded)
            .await
            .map_err(err_ctx!(RenameError::Download))?;

        ctx.checkpoint()?;
        ctx.stage(1, "Extracting metadata...").await;

        let duration = match self.media.probe_duration(&downloaded).await {
            Ok(duration) => duration,
            Err(err) => {
                warn!(err = tracing_err(&err), "Failed to probe the media duration");
                None
            }
        };

        ctx.checkpoint()?;

        let mut artifact = downloaded;

        if let Some(family) = tag_family(&extension) {
            ctx.stage(2, "Writing metadata...").await;

            let tags = match family {
                TagFamily::Video => prefs.metadata.video_tags(),
                TagFamily::Audio => prefs.metadata.audio_tags(),
            };

            let remux_dir = dir.join("remux");
            fs_err::tokio::create_dir(&remux_dir).await?;

            let remuxed = remux_dir.join(&disk_name);
            ctx.record_path(&remuxed);

            let (result, elapsed) = self
                .media
                .remux(&artifact, &remuxed, &tags)
                .with_duration()
                .await;

            histogram!(names::STAGE_DURATION, "stage" => "remux").record(elapsed.as_secs_f64());

            if let Err(source) = result {
                remove_if_exists(&remuxed).await;
                return Err(err!(RenameError::Remux { source }));
            }

            remove_if_exists(&artifact).await;
            artifact = remuxed;
        } else {
            debug!(%extension, "Container doesn't support tags, skipping the remux");
        }

        ctx.checkpoint()?;

        let finalized = dir.join(&disk_name);
        ctx.record_path(&finalized);

        fs_err::tokio::rename(&artifact, &finalized)
            .await
            .map_err(|source| {
                err!(RenameError::Filesystem {
                    from: artifact.display().to_string(),
                    to: finalized.display().to_string(),
                    source,
                })
            })?;

        ctx.checkpoint()?;
        ctx.stage(3, "Preparing thumbnail...").await;

        let thumbnail = self
            .resolve_thumbnail(ctx, prefs, media, upload_kind, dir)
            .await;

        let size = fs_err::tokio::metadata(&finalized).await?.len();
        histogram!(names::FILE_SIZE).record(size as f64);

        let caption = compose_caption(prefs.caption.as_deref(), rendered, size, duration);

        ctx.checkpoint()?;
        ctx.stage(3, "Uploading...").await;

        let upload = Upload {
            kind: upload_kind,
            path: &finalized,
            file_name: rendered,
            caption: &caption.markup,
            thumbnail: thumbnail.as_deref(),
            duration,
        };

        let (result, elapsed) = async {
            match ctx.transport().upload(upload).await {
                Err(err) if caption.markup != caption.plain && is_markup_rejection(&err) => {
                    warn!(
                        err = tracing_err(&err),
                        "Caption markup was rejected, sending it as plain text"
                    );
                    let upload = Upload {
                        caption: &caption.plain,
                        ..upload
                    };
                    ctx.transport().upload(upload).await
                }
                result => result,
            }
        }
        .with_duration()
        .await;

        histogram!(names::STAGE_DURATION, "stage" => "upload").record(elapsed.as_secs_f64());

        result.map_err(err_ctx!(RenameError::Upload))
    }

    async fn download(&self, ctx: &JobCtx<'_>, media: &InboundMedia, dest: &Path) -> Result<u64> {
        let total = media.size;

        let progress = |done: u64| {
            let log = if total > 0 {
                format!("Downloading: {} / {}", human_size(done), human_size(total))
            } else {
                format!("Downloading: {}", human_size(done))
            };
            ctx.set_log(log);
        };

        let download = ctx
            .transport()
            .download(&media.file_id, dest, &progress)
            .with_duration();

        futures::pin_mut!(download);

        let mut ticker = tokio::time::interval(PROGRESS_PUBLISH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        ticker.tick().await;

        let (result, elapsed) = loop {
            tokio::select! {
                output = &mut download => break output,
                _ = ticker.tick() => ctx.queue.publish().await,
            }
        };

        histogram!(names::STAGE_DURATION, "stage" => "download").record(elapsed.as_secs_f64());

        result
    }

    /// The thumbnail is optional, so any problems with it are only logged
    async fn resolve_thumbnail(
        &self,
        ctx: &JobCtx<'_>,
        prefs: &UserPrefs,
        media: &InboundMedia,
        upload_kind: MediaKind,
        dir: &Path,
    ) -> Option<PathBuf> {
        let embedded = media
            .thumbnail
            .as_deref()
            .filter(|_| upload_kind == MediaKind::Video && media.kind == MediaKind::Video);

        let file_id = prefs.thumbnail.as_deref().or(embedded)?;

        match self.fetch_thumbnail(ctx, file_id, dir).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(
                    err = tracing_err(&err),
                    "Couldn't prepare the thumbnail, uploading without it"
                );
                None
            }
        }
    }

    async fn fetch_thumbnail(&self, ctx: &JobCtx<'_>, file_id: &str, dir: &Path) -> Result<PathBuf> {
        let original = dir.join("thumbnail.orig");
        ctx.record_path(&original);

        ctx.transport().download(file_id, &original, &|_| {}).await?;

        let image = fs_err::tokio::read(&original).await?;
        let jpeg = normalize_thumbnail(image, self.thumbnail_side).await?;

        let path = dir.join("thumbnail.jpg");
        ctx.record_path(&path);

        fs_err::tokio::write(&path, jpeg).await?;

        Ok(path)
    }
}

/// The rendered name is used as the file name on disk, so it must not
/// escape the job directory.
fn disk_file_name(rendered: &str) -> String {
    let name: String = rendered
        .chars()
        .map(|char| match char {
            '/' | '\\' | '\0' => '_',
            _ => char,
        })
        .collect();

    match name.as_str() {
        "" | "." | ".." => "file".to_owned(),
        _ => name,
    }
}

async fn remove_if_exists(path: &Path) {
    match fs_err::tokio::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(err = tracing_err(&err), "Failed to remove a file"),
    }
}

fn is_markup_rejection(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Tg {
            source: RequestError::Api(ApiError::CantParseEntities(_))
        }
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("<unknown>")
}
