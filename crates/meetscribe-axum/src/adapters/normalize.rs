//! Default `Normalizer`: a no-op, for deployments where uploads already
//! arrive as 16 kHz mono WAV or where the transcriber handles arbitrary
//! input formats itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use meetscribe_core::ports::Normalizer;
use meetscribe_core::RunnerError;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughNormalizer;

#[async_trait]
impl Normalizer for PassthroughNormalizer {
    async fn normalize(&self, path: &Path) -> Result<PathBuf, RunnerError> {
        Ok(path.to_path_buf())
    }
}
