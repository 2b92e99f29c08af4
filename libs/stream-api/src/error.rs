/// How the pipeline should react to a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Permanent store or setup problem. Abandoned and logged at error.
    Config,
    /// Transient failure. Retried after the backoff.
    Io,
    /// The handler rejects the message. Skipped without retry.
    Format,
    /// Checkpoint refused because the shard changed owner.
    Fenced,
    /// Handler failure of unknown cause. Retried.
    Logic,
}

impl ErrorKind {
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Io | ErrorKind::Logic)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Fenced => f.write_str("fenced"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Failure reported by a collaborator: the checkpoint store or the
/// message handler.
///
/// The pipeline only looks at `kind` to pick between retrying and giving up;
/// `message` ends up in the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamError {
    kind: ErrorKind,
    message: String,
}

impl StreamError {
    /// Handler failure without a more specific category. Retried.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Logic, msg)
    }

    /// The store rejects every write (missing table, no permission).
    pub fn config(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Config, msg)
    }

    /// Throttling, timeouts, flaky disks.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, msg)
    }

    /// The message itself is unacceptable to the handler.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Format, msg)
    }

    /// Another worker took the shard lease.
    pub fn fenced(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Fenced, msg)
    }

    fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

impl std::fmt::Debug for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StreamError {}

/// Lets handlers that write to files or sockets use `?`; such failures
/// are treated as transient.
impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
