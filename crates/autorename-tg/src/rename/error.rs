use crate::Error;

/// Reasons for a job to not reach the completed state
#[derive(Debug, thiserror::Error)]
pub(crate) enum RenameError {
    #[error("No rename format set")]
    NoFormatTemplate,

    #[error("Unsupported file type")]
    UnsupportedInput,

    #[error("File is already being processed")]
    DuplicateSubmission,

    #[error("Download failed: {}", source.reason())]
    Download { source: Error },

    #[error("Metadata error: {}", source.reason())]
    Remux { source: Error },

    #[error("Failed to move {from} to {to}: {source}")]
    Filesystem {
        from: String,
        to: String,
        source: std::io::Error,
    },

    #[error("Upload failed: {}", source.reason())]
    Upload { source: Error },

    #[error("Aborted by user")]
    Aborted,
}

impl RenameError {
    pub(crate) fn is_user_error(&self) -> bool {
        match self {
            Self::NoFormatTemplate
            | Self::UnsupportedInput
            | Self::DuplicateSubmission
            | Self::Aborted => true,
            Self::Download { .. }
            | Self::Remux { .. }
            | Self::Filesystem { .. }
            | Self::Upload { .. } => false,
        }
    }
}
