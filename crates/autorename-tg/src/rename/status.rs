use super::{Job, JobStatus};
use std::fmt::Write;

/// Plain-text status of the queue. Escaping for the chat markup is up to
/// the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusView {
    pub(crate) text: String,

    /// Whether the "abort all" control is attached to the message
    pub(crate) abort_button: bool,
}

pub(crate) const ABORT_ALL_CALLBACK: &str = "abort_all";
pub(crate) const ABORT_ALL_LABEL: &str = "❌ Abort All Operations";

/// Renders one entry per job in the submission order. The abort control is
/// offered while there is anything left to abort.
pub(crate) fn render_status(jobs: &[Job], abort_requested: bool) -> StatusView {
    let mut text = "📥 Files Added to Queue:\n".to_owned();

    for job in jobs {
        let name = &job.original_filename;

        // Writing to a `String` is infallible
        let _ = match job.status {
            JobStatus::Pending => writeln!(text, "🔄 [OG] {name} (old name)"),
            JobStatus::Processing => {
                let _ = write!(text, "{} [OG] {name} (processing)", job.progress);
                match &job.log {
                    Some(log) => writeln!(text, "\n    └─ Log: {log}"),
                    None => writeln!(text),
                }
            }
            JobStatus::Completed => {
                let _ = write!(text, "✅ [OG] {name}");
                match &job.rendered_name {
                    Some(rendered) => writeln!(text, "\n    └─ [RN] {rendered}"),
                    None => writeln!(text),
                }
            }
            JobStatus::Failed => {
                let reason = job.error_reason.as_deref().unwrap_or("Unknown error");
                writeln!(text, "❌ {name}\n    └─ (Reason: {reason})")
            }
            JobStatus::Aborted => {
                let reason = job.error_reason.as_deref().unwrap_or("Aborted by user");
                writeln!(text, "🚫 {name}\n    └─ (Reason: {reason})")
            }
        };
    }

    let abort_button = !abort_requested && jobs.iter().any(|job| !job.status.is_terminal());

    StatusView { text, abort_button }
}
