use std::fmt;
use std::path::PathBuf;
use teloxide::types::{MessageId, UserId};

/// Identifies a job for the whole lifetime of the process. It is derived from
/// the transport's file id, but has a random suffix, because the same file
/// may be legitimately submitted more than once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct JobId(String);

impl JobId {
    pub(crate) fn new(file_id: Option<&str>) -> Self {
        let prefix: String = file_id
            .unwrap_or("nofile")
            .chars()
            .rev()
            .filter(|char| char.is_ascii_alphanumeric())
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        Self(format!("{prefix}-{}", nanoid::nanoid!(6)))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub(crate) enum MediaKind {
    Document,
    Video,
    Audio,
}

/// File-bearing payload of the inbound message
#[derive(Debug, Clone)]
pub(crate) struct InboundMedia {
    pub(crate) file_id: String,
    pub(crate) kind: MediaKind,

    /// Size reported by the transport, zero if unknown
    pub(crate) size: u64,

    /// File id of the thumbnail embedded by the sender's client
    pub(crate) thumbnail: Option<String>,
}

/// Message with a file that the user sent to the bot
#[derive(Debug, Clone)]
pub(crate) struct InboundFile {
    pub(crate) owner: UserId,
    pub(crate) message: MessageId,
    pub(crate) filename: Option<String>,

    /// `None` if the message doesn't carry a document, a video or an audio
    pub(crate) media: Option<InboundMedia>,
}

impl InboundFile {
    pub(crate) fn file_id(&self) -> Option<&str> {
        self.media.as_ref().map(|media| media.file_id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Aborted,
}

impl JobStatus {
    pub(crate) fn is_terminal(self) -> bool {
        match self {
            Self::Pending | Self::Processing => false,
            Self::Completed | Self::Failed | Self::Aborted => true,
        }
    }
}

/// Coarse indicator of how far the job advanced through the pipeline.
/// Rendered as `◯◯◯`, `⬤◯◯`, `⬤⬤◯`, `⬤⬤⬤`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub(crate) struct Progress(u8);

impl Progress {
    pub(crate) const STEPS: u8 = 3;

    pub(crate) fn new(step: u8) -> Self {
        Self(step.min(Self::STEPS))
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in 0..Self::STEPS {
            f.write_str(if step < self.0 { "⬤" } else { "◯" })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) file: InboundFile,

    /// Empty if the sender didn't supply the file name
    pub(crate) original_filename: String,

    pub(crate) status: JobStatus,
    pub(crate) progress: Progress,

    /// The last thing the pipeline reported while processing the job
    pub(crate) log: Option<String>,

    pub(crate) rendered_name: Option<String>,
    pub(crate) error_reason: Option<String>,

    /// Files and directories on disk that belong to this job. None of them
    /// remain after the job reaches a terminal state.
    pub(crate) local_paths: Vec<PathBuf>,
}

impl Job {
    pub(crate) fn new(file: InboundFile) -> Self {
        Self {
            id: JobId::new(file.file_id()),
            original_filename: file.filename.clone().unwrap_or_default(),
            file,
            status: JobStatus::Pending,
            progress: Progress::default(),
            log: None,
            rendered_name: None,
            error_reason: None,
            local_paths: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn progress_marker() {
        let rendered: Vec<_> = (0..=4).map(|step| Progress::new(step).to_string()).collect();
        expect![[r#"["◯◯◯", "⬤◯◯", "⬤⬤◯", "⬤⬤⬤", "⬤⬤⬤"]"#]].assert_eq(&format!("{rendered:?}"));
    }

    #[test]
    fn job_ids_are_unique_per_submission() {
        let file_id = "BQACAgIAAxkBAAIBY2X-some_long-file_id";
        let first = JobId::new(Some(file_id));
        let second = JobId::new(Some(file_id));

        assert_ne!(first, second);
        assert!(first.as_str().starts_with("ngfileid-"), "{first}");
    }

    #[test]
    fn media_kind_names() {
        assert_eq!(MediaKind::Document.to_string(), "document");
        assert_eq!("VIDEO".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert!("picture".parse::<MediaKind>().is_err());
    }
}
