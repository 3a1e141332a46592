// Result Persister Port
// Hands a finished RunResult to stable storage

use crate::domain::RunResult;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Store one run outcome
    ///
    /// # Errors
    /// - AppError::Io / AppError::Persistence if the result cannot be written
    async fn persist(&self, result: &RunResult) -> Result<()>;
}
