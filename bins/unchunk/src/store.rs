use std::future::Future;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use stream_api::{CheckpointToken, Checkpointer, StreamError};

/// Checkpoint store keeping the resume position of one shard in a file.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so a crash never leaves a half-written token behind.
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored token, or `None` if nothing was checkpointed yet.
    pub async fn load(&self) -> Result<Option<CheckpointToken>, StreamError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| CheckpointToken::from(token)))
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify(&self.path, e)),
        }
    }

    async fn store(&self, token: &CheckpointToken) -> Result<(), StreamError> {
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, token.as_str())
            .await
            .map_err(|e| classify(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| classify(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), %token, "checkpoint written");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl Checkpointer for FileCheckpointStore {
    fn checkpoint<'a>(
        &'a self,
        token: &'a CheckpointToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + 'a>> {
        Box::pin(self.store(token))
    }
}

/// Missing directories and permission problems will not go away on retry.
fn classify(path: &Path, e: std::io::Error) -> StreamError {
    let message = format!("{}: {e}", path.display());
    match e.kind() {
        IoErrorKind::NotFound | IoErrorKind::PermissionDenied => StreamError::config(message),
        _ => StreamError::io(message),
    }
}
