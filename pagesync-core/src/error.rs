use crate::DocumentId;

/// Conditions reported to the presentation layer. None of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("document {0} is not in the list of known documents")]
    DocumentNotFound(DocumentId),
    #[error("no active document")]
    NoActiveDocument,
    #[error("invalid page number {0:?}")]
    MalformedInput(String),
    #[error("bookmark description must not be empty")]
    EmptyBookmarkDescription,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
