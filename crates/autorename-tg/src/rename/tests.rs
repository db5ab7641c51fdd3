use super::*;
use crate::naming::PatternMatcher;
use crate::prefs::{MemPrefsStore, Metadata, UserPrefs};
use crate::util::media_conv::RemuxTags;
use crate::util::process::ProcessError;
use crate::{err, fatal, Result};
use assert_matches::assert_matches;
use async_trait::async_trait;
use expect_test::expect;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{MessageId, UserId};
use teloxide::{ApiError, RequestError};
use tokio::sync::{Notify, Semaphore};

const USER: UserId = UserId(42);

/// Download of this file blocks until the test releases it
const SLOW_FILE: &str = "slow-file";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Status {
        text: String,
        abort_button: bool,
    },
    StatusDeleted,
    Upload {
        file_name: String,
        kind: MediaKind,
        caption: String,
        content: String,
        thumbnail: Option<(u32, u32)>,
    },
    Reply {
        to: i32,
        text: String,
    },
    LogCompleted {
        original: String,
        rendered: String,
    },
}

struct FakeTransport {
    files: parking_lot::Mutex<HashMap<String, Vec<u8>>>,
    events: parking_lot::Mutex<Vec<Event>>,
    next_message_id: AtomicI32,
    fail_uploads: AtomicBool,
    slow_download_started: Notify,
    slow_download_release: Semaphore,
}

impl FakeTransport {
    fn new() -> Self {
        Self {
            files: Default::default(),
            events: Default::default(),
            next_message_id: AtomicI32::new(100),
            fail_uploads: AtomicBool::new(false),
            slow_download_started: Notify::new(),
            slow_download_release: Semaphore::new(0),
        }
    }

    fn add_file(&self, file_id: &str, content: impl Into<Vec<u8>>) {
        self.files.lock().insert(file_id.to_owned(), content.into());
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn uploads(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, Event::Upload { .. }))
            .collect()
    }

    fn uploaded_names(&self) -> Vec<String> {
        self.uploads()
            .into_iter()
            .filter_map(|event| match event {
                Event::Upload { file_name, .. } => Some(file_name),
                _ => None,
            })
            .collect()
    }

    fn replies(&self) -> Vec<(i32, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Reply { to, text } => Some((to, text)),
                _ => None,
            })
            .collect()
    }

    fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Status { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn download(
        &self,
        file_id: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<u64> {
        if file_id == SLOW_FILE {
            self.slow_download_started.notify_one();
            self.slow_download_release
                .acquire()
                .await
                .expect("semaphore is never closed")
                .forget();
        }

        let content = self.files.lock().get(file_id).cloned();
        let content = content.ok_or_else(|| fatal!("No such file: {file_id}"))?;

        fs_err::tokio::write(dest, &content).await?;
        progress(content.len() as u64);

        Ok(content.len() as u64)
    }

    async fn upload(&self, upload: Upload<'_>) -> Result {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(fatal!("upload rejected"));
        }

        if !has_balanced_bold(upload.caption) {
            let rejection = ApiError::CantParseEntities("Can't find end of Bold entity".to_owned());
            return Err(crate::Error::from(RequestError::Api(rejection)));
        }

        let content = fs_err::tokio::read(upload.path).await?;

        let thumbnail = match upload.thumbnail {
            Some(path) => {
                let image = image::open(path).expect("thumbnail must be a valid image");
                Some((image.width(), image.height()))
            }
            None => None,
        };

        self.record(Event::Upload {
            file_name: upload.file_name.to_owned(),
            kind: upload.kind,
            caption: upload.caption.to_owned(),
            content: String::from_utf8_lossy(&content).into_owned(),
            thumbnail,
        });

        Ok(())
    }

    async fn send_status(&self, status: &StatusView) -> Result<MessageId> {
        self.record(Event::Status {
            text: status.text.clone(),
            abort_button: status.abort_button,
        });
        Ok(MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_status(&self, _id: MessageId, status: &StatusView) -> Result {
        self.record(Event::Status {
            text: status.text.clone(),
            abort_button: status.abort_button,
        });
        Ok(())
    }

    async fn delete_status(&self, _id: MessageId) -> Result {
        self.record(Event::StatusDeleted);
        Ok(())
    }

    async fn reply(&self, to: MessageId, text: &str) -> Result {
        self.record(Event::Reply {
            to: to.0,
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn log_completed(&self, _owner: UserId, original: &str, rendered: &str) -> Result {
        self.record(Event::LogCompleted {
            original: original.to_owned(),
            rendered: rendered.to_owned(),
        });
        Ok(())
    }
}

/// Crude imitation of the chat's markup parser
fn has_balanced_bold(caption: &str) -> bool {
    let mut open = false;
    let mut chars = caption.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '*' => open = !open,
            _ => {}
        }
    }
    !open
}

/// Stands in for `ffmpeg`. The "remuxed" file is the input with a marker
/// appended to it.
#[derive(Default)]
struct FakeMedia {
    fail_remux: bool,
    panic_on_probe: bool,
    remuxes: parking_lot::Mutex<Vec<RemuxTags>>,
}

#[async_trait]
impl MediaTools for FakeMedia {
    async fn remux(&self, input: &Path, output: &Path, tags: &RemuxTags) -> Result {
        self.remuxes.lock().push(tags.clone());

        if self.fail_remux {
            fs_err::tokio::write(output, "partial").await?;
            return Err(err!(ProcessError::Timeout {
                program: "ffmpeg",
                timeout: Duration::from_secs(600),
            }));
        }

        let mut content = fs_err::tokio::read(input).await?;
        content.extend_from_slice(b" +tags");
        fs_err::tokio::write(output, content).await?;

        Ok(())
    }

    async fn probe_duration(&self, _input: &Path) -> Result<Option<Duration>> {
        if self.panic_on_probe {
            panic!("probe exploded");
        }
        Ok(Some(Duration::from_secs(83)))
    }
}

struct Harness {
    queue: Arc<RenameQueue>,
    pipeline: Arc<Pipeline>,
    transport: Arc<FakeTransport>,
    media: Arc<FakeMedia>,
    work_dir: tempfile::TempDir,
}

impl Harness {
    fn new(prefs: UserPrefs, media: FakeMedia) -> Self {
        Self::with_suppression_window(prefs, media, Duration::from_secs(10))
    }

    fn with_suppression_window(prefs: UserPrefs, media: FakeMedia, window: Duration) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let media = Arc::new(media);

        let pipeline = Pipeline {
            prefs: Arc::new(MemPrefsStore::with(USER, prefs)),
            media: media.clone(),
            suppressor: Arc::new(DuplicateSuppressor::new(window)),
            matcher: PatternMatcher::default(),
            work_dir: work_dir.path().join("downloads"),
            thumbnail_side: 320,
        };

        let pipeline = Arc::new(pipeline);
        let queue = Arc::new(RenameQueue::new(transport.clone(), pipeline.clone()));

        Self {
            queue,
            pipeline,
            transport,
            media,
            work_dir,
        }
    }

    /// Registers the file in the transport and submits it
    async fn submit(&self, message: i32, file_id: &str, filename: &str) -> Submission {
        let content = format!("episode {message}");
        self.transport.add_file(file_id, content);
        self.queue.enqueue(inbound(message, file_id, filename)).await
    }

    /// Nothing may remain on disk after the jobs are finished
    fn assert_no_leftovers(&self) {
        let dir = self.work_dir.path().join("downloads");
        if !dir.exists() {
            return;
        }
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:#?}");
    }
}

fn inbound(message: i32, file_id: &str, filename: &str) -> InboundFile {
    InboundFile {
        owner: USER,
        message: MessageId(message),
        filename: Some(filename.to_owned()),
        media: Some(InboundMedia {
            file_id: file_id.to_owned(),
            kind: MediaKind::Document,
            size: 0,
            thumbnail: None,
        }),
    }
}

fn prefs_with_template() -> UserPrefs {
    UserPrefs {
        format_template: Some("Show {episode} [quality]".to_owned()),
        ..Default::default()
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[test_log::test(tokio::test)]
async fn files_are_processed_in_submission_order() {
    let prefs = UserPrefs {
        metadata: Metadata {
            title: Some("My title".to_owned()),
            ..Default::default()
        },
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());

    for episode in 1..=3 {
        let submission = harness
            .submit(episode, &format!("file-{episode}"), &format!("Show S01E0{episode} 1080p.mkv"))
            .await;
        assert_matches!(submission, Submission::Accepted(_));
    }

    harness.queue.wait_idle().await;

    expect![[r#"
        [
            "Show 01 [1080p].mkv",
            "Show 02 [1080p].mkv",
            "Show 03 [1080p].mkv",
        ]
    "#]]
    .assert_debug_eq(&harness.transport.uploaded_names());

    let uploads = harness.transport.uploads();
    let Event::Upload {
        kind,
        caption,
        content,
        thumbnail,
        ..
    } = &uploads[0]
    else {
        unreachable!()
    };

    assert_eq!(*kind, MediaKind::Document);
    assert_eq!(content, "episode 1 +tags");
    assert_eq!(*thumbnail, None);
    expect![[r#"*Show 01 \[1080p\]\.mkv*"#]].assert_eq(caption);

    assert_matches!(
        &harness.media.remuxes.lock()[0],
        RemuxTags::Video { title: Some(title), author: None, .. } if title == "My title"
    );

    // The worker never processes two jobs at once
    for status in harness.transport.statuses() {
        assert!(status.matches("(processing)").count() <= 1, "{status}");
    }

    let completed: Vec<_> = harness
        .transport
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::LogCompleted { original, rendered } => Some(format!("{original} -> {rendered}")),
            _ => None,
        })
        .collect();

    expect![[r#"
        [
            "Show S01E01 1080p.mkv -> Show 01 [1080p].mkv",
            "Show S01E02 1080p.mkv -> Show 02 [1080p].mkv",
            "Show S01E03 1080p.mkv -> Show 03 [1080p].mkv",
        ]
    "#]]
    .assert_debug_eq(&completed);

    assert_eq!(harness.transport.events().last(), Some(&Event::StatusDeleted));
    assert!(harness.transport.replies().is_empty());
    harness.assert_no_leftovers();
}

#[test_log::test(tokio::test)]
async fn status_shows_every_terminal_job_once() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    let statuses = harness.transport.statuses();
    let completed: Vec<_> = statuses
        .iter()
        .filter(|status| status.contains("✅"))
        .collect();

    expect![[r#"
        [
            "📥 Files Added to Queue:\n✅ [OG] Show S01E01 1080p.mkv\n    └─ [RN] Show 01 [1080p].mkv\n",
        ]
    "#]]
    .assert_debug_eq(&completed);

    let Some(Event::Status { abort_button, .. }) = harness.transport.events().first().cloned()
    else {
        panic!("the first event must be the status");
    };
    assert!(abort_button);
}

#[test_log::test(tokio::test)]
async fn caption_template_is_filled() {
    let prefs = UserPrefs {
        caption: Some("{filename} | {filesize} | {duration}".to_owned()),
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    let uploads = harness.transport.uploads();
    let Event::Upload { caption, .. } = &uploads[0] else {
        unreachable!()
    };

    expect![[r#"Show 01 \[1080p\]\.mkv \| 15 B \| 00:01:23"#]].assert_eq(caption);
}

#[test_log::test(tokio::test)]
async fn caption_formatting_is_kept() {
    let prefs = UserPrefs {
        caption: Some("*{filename}* done!".to_owned()),
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    let uploads = harness.transport.uploads();
    let Event::Upload { caption, .. } = &uploads[0] else {
        unreachable!()
    };

    expect![[r#"*Show 01 \[1080p\]\.mkv* done\!"#]].assert_eq(caption);
}

#[test_log::test(tokio::test)]
async fn broken_caption_markup_falls_back_to_plain_text() {
    let prefs = UserPrefs {
        caption: Some("*{filename} unclosed".to_owned()),
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    let uploads = harness.transport.uploads();
    assert_eq!(uploads.len(), 1);

    let Event::Upload { caption, .. } = &uploads[0] else {
        unreachable!()
    };

    expect![[r#"\*Show 01 \[1080p\]\.mkv unclosed"#]].assert_eq(caption);
    assert!(harness.transport.replies().is_empty());
    harness.assert_no_leftovers();
}

#[test_log::test(tokio::test)]
async fn duplicate_submission_is_rejected() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());

    let first = harness.submit(1, "same-file", "Show S01E01 1080p.mkv").await;
    let second = harness.submit(2, "same-file", "Show S01E01 1080p.mkv").await;

    assert_matches!(first, Submission::Accepted(_));
    assert_eq!(second, Submission::Duplicate);

    harness.queue.wait_idle().await;

    assert_eq!(harness.transport.uploads().len(), 1);

    // The mark is released once the job is finished
    let third = harness.submit(3, "same-file", "Show S01E01 1080p.mkv").await;
    assert_matches!(third, Submission::Accepted(_));

    harness.queue.wait_idle().await;

    assert_eq!(harness.transport.uploads().len(), 2);
}

#[test_log::test(tokio::test)]
async fn duplicate_caught_by_the_worker_is_reported() {
    let harness = Harness::with_suppression_window(
        prefs_with_template(),
        FakeMedia::default(),
        Duration::from_millis(300),
    );

    harness.submit(1, SLOW_FILE, "Show S01E01 1080p.mkv").await;
    harness.transport.slow_download_started.notified().await;

    harness.submit(2, "same-file", "Show S01E02 1080p.mkv").await;

    // The mark of the second job expires while it is still waiting
    tokio::time::sleep(Duration::from_millis(400)).await;

    let third = harness.submit(3, "same-file", "Show S01E03 1080p.mkv").await;
    assert_matches!(third, Submission::Accepted(_));

    harness.transport.slow_download_release.add_permits(1);
    harness.queue.wait_idle().await;

    assert_eq!(
        harness.transport.replies(),
        [(2, DUPLICATE_REPLY.to_owned())]
    );

    expect![[r#"
        [
            "Show 01 [1080p].mkv",
            "Show 03 [1080p].mkv",
        ]
    "#]]
    .assert_debug_eq(&harness.transport.uploaded_names());

    for status in harness.transport.statuses() {
        assert!(
            !status.contains("Show S01E02 1080p.mkv (processing)"),
            "{status}"
        );
    }

    harness.assert_no_leftovers();
}

#[test_log::test(tokio::test)]
async fn missing_template_fails_the_job() {
    let harness = Harness::new(UserPrefs::default(), FakeMedia::default());

    harness.submit(1, "file-1", "a.mkv").await;
    harness.submit(2, "file-2", "b.mkv").await;
    harness.queue.wait_idle().await;

    expect![[r#"
        [
            (
                1,
                "❌ Failed: No rename format set",
            ),
            (
                2,
                "❌ Failed: No rename format set",
            ),
        ]
    "#]]
    .assert_debug_eq(&harness.transport.replies());

    assert!(harness
        .transport
        .statuses()
        .iter()
        .any(|status| status.contains("❌ a.mkv\n    └─ (Reason: No rename format set)")));

    assert!(harness.transport.uploads().is_empty());
}

#[test_log::test(tokio::test)]
async fn message_without_media_is_unsupported() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());

    let file = InboundFile {
        media: None,
        ..inbound(1, "unused", "notes.txt")
    };

    harness.queue.enqueue(file).await;
    harness.queue.wait_idle().await;

    assert_eq!(
        harness.transport.replies(),
        [(1, "❌ Failed: Unsupported file type".to_owned())]
    );
}

#[test_log::test(tokio::test)]
async fn remux_failure_is_reported_and_cleaned_up() {
    let media = FakeMedia {
        fail_remux: true,
        ..Default::default()
    };
    let harness = Harness::new(prefs_with_template(), media);

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.submit(2, "file-2", "Show S01E02 1080p.mp3").await;
    harness.queue.wait_idle().await;

    expect![[r#"
        [
            (
                1,
                "❌ Failed: Metadata error: `ffmpeg` didn't finish in 600s",
            ),
            (
                2,
                "❌ Failed: Metadata error: `ffmpeg` didn't finish in 600s",
            ),
        ]
    "#]]
    .assert_debug_eq(&harness.transport.replies());

    assert_matches!(harness.media.remuxes.lock()[1], RemuxTags::Audio { .. });
    harness.assert_no_leftovers();
}

#[test_log::test(tokio::test)]
async fn unknown_container_skips_remux() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());

    harness.submit(1, "file-1", "Show S01E01 1080p.zip").await;
    harness.queue.wait_idle().await;

    let uploads = harness.transport.uploads();
    let Event::Upload {
        file_name, content, ..
    } = &uploads[0]
    else {
        unreachable!()
    };

    assert_eq!(file_name, "Show 01 [1080p].zip");
    assert_eq!(content, "episode 1");
    assert!(harness.media.remuxes.lock().is_empty());
}

#[test_log::test(tokio::test)]
async fn upload_failure_does_not_stop_the_queue() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());
    harness.transport.fail_uploads.store(true, Ordering::SeqCst);

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    assert_eq!(
        harness.transport.replies(),
        [(1, "❌ Failed: Upload failed: FATAL: upload rejected".to_owned())]
    );
    harness.assert_no_leftovers();

    harness.transport.fail_uploads.store(false, Ordering::SeqCst);

    harness.submit(2, "file-2", "Show S01E02 1080p.mkv").await;
    harness.queue.wait_idle().await;

    assert_eq!(harness.transport.uploaded_names(), ["Show 02 [1080p].mkv"]);
}

#[test_log::test(tokio::test)]
async fn panic_is_contained_to_the_job() {
    let media = FakeMedia {
        panic_on_probe: true,
        ..Default::default()
    };
    let harness = Harness::new(prefs_with_template(), media);

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.submit(2, "file-2", "Show S01E02 1080p.mkv").await;
    harness.queue.wait_idle().await;

    expect![[r#"
        [
            (
                1,
                "❌ Failed: Unexpected error: probe exploded",
            ),
            (
                2,
                "❌ Failed: Unexpected error: probe exploded",
            ),
        ]
    "#]]
    .assert_debug_eq(&harness.transport.replies());

    harness.assert_no_leftovers();
}

#[test_log::test(tokio::test)]
async fn abort_cancels_pending_and_current_jobs() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());

    harness.submit(1, SLOW_FILE, "Show S01E01 1080p.mkv").await;
    harness.submit(2, "file-2", "Show S01E02 1080p.mkv").await;
    harness.submit(3, "file-3", "Show S01E03 1080p.mkv").await;

    harness.transport.slow_download_started.notified().await;

    assert!(harness.queue.request_abort_all().await);

    // Pending jobs are aborted before the current one is released
    expect![[r#"
        [
            (
                2,
                "🚫 Aborted by user",
            ),
            (
                3,
                "🚫 Aborted by user",
            ),
        ]
    "#]]
    .assert_debug_eq(&harness.transport.replies());

    let status = harness.queue.render_status();
    assert!(!status.abort_button);
    assert!(status.text.contains("(processing)"), "{}", status.text);

    harness.transport.slow_download_release.add_permits(1);
    harness.queue.wait_idle().await;

    assert_eq!(harness.transport.replies().len(), 3);
    assert_eq!(
        harness.transport.replies()[2],
        (1, "🚫 Aborted by user".to_owned())
    );
    assert!(harness.transport.uploads().is_empty());
    harness.assert_no_leftovers();

    // The queue accepts new work after the abort
    harness.submit(4, "file-4", "Show S01E04 1080p.mkv").await;
    harness.queue.wait_idle().await;

    assert_eq!(harness.transport.uploaded_names(), ["Show 04 [1080p].mkv"]);
}

#[test_log::test(tokio::test)]
async fn registry_forgets_idle_queues() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());
    let registry = QueueRegistry::default();
    let create = || RenameQueue::new(harness.transport.clone(), harness.pipeline.clone());

    let busy = registry.get_or_create(1, create);
    harness.transport.add_file(SLOW_FILE, "slow");
    busy.enqueue(inbound(1, SLOW_FILE, "Show S01E01 1080p.mkv")).await;
    harness.transport.slow_download_started.notified().await;
    drop(busy);

    // Never used, so it is idle right away
    drop(registry.get_or_create(2, create));

    let same = registry.get_or_create(1, create);
    assert_eq!(registry.len(), 1);
    assert!(registry.get(&2).is_none());

    harness.transport.slow_download_release.add_permits(1);
    same.wait_idle().await;
    drop(same);

    // The worker may still be unwinding right after the queue becomes idle
    for _ in 0..100 {
        drop(registry.get_or_create(3, create));
        if registry.get(&1).is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(registry.get(&1).is_none());
    assert_eq!(harness.transport.uploaded_names(), ["Show 01 [1080p].mkv"]);
}

#[test_log::test(tokio::test)]
async fn abort_on_idle_queue_is_noop() {
    let harness = Harness::new(prefs_with_template(), FakeMedia::default());

    assert!(!harness.queue.request_abort_all().await);
    assert!(harness.transport.events().is_empty());
}

#[test_log::test(tokio::test)]
async fn custom_thumbnail_is_resized() {
    let prefs = UserPrefs {
        thumbnail: Some("thumb".to_owned()),
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());
    harness.transport.add_file("thumb", png(64, 48));

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    let uploads = harness.transport.uploads();
    let Event::Upload { thumbnail, .. } = &uploads[0] else {
        unreachable!()
    };

    assert_eq!(*thumbnail, Some((320, 320)));
    harness.assert_no_leftovers();
}

#[test_log::test(tokio::test)]
async fn broken_thumbnail_is_skipped() {
    let prefs = UserPrefs {
        thumbnail: Some("thumb".to_owned()),
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());
    harness.transport.add_file("thumb", "definitely not an image");

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    let uploads = harness.transport.uploads();
    let Event::Upload { thumbnail, .. } = &uploads[0] else {
        unreachable!()
    };

    assert_eq!(*thumbnail, None);
    assert!(harness.transport.replies().is_empty());
}

#[test_log::test(tokio::test)]
async fn media_type_override_changes_upload_kind() {
    let prefs = UserPrefs {
        media_type: Some(MediaKind::Video),
        ..prefs_with_template()
    };
    let harness = Harness::new(prefs, FakeMedia::default());

    harness.submit(1, "file-1", "Show S01E01 1080p.mkv").await;
    harness.queue.wait_idle().await;

    assert_matches!(
        harness.transport.uploads()[0],
        Event::Upload {
            kind: MediaKind::Video,
            ..
        }
    );
}
