//! Chunked dispatch of actions to the Gmail batchModify endpoint.

use crate::action::Action;
use crate::error::{Error, Result};
use async_trait::async_trait;
use google_gmail1::api::BatchModifyMessagesRequest;
use std::fmt;
use tracing::{debug, info, warn};

/// Gmail accepts at most this many ids per batchModify call.
pub const MAX_IDS_PER_REQUEST: usize = 1000;

/// Why one bulk-modify call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyFailure {
    /// HTTP status, absent when no response was received
    pub status: Option<u16>,
    /// Response body or transport error text
    pub detail: String,
}

impl fmt::Display for ModifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// Transport for a single bulk-modify call.
#[async_trait]
pub trait BulkModify: Send + Sync {
    async fn batch_modify(
        &self,
        request: &BatchModifyMessagesRequest,
    ) -> std::result::Result<(), ModifyFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: usize,
    pub size: usize,
    pub result: std::result::Result<(), ModifyFailure>,
}

/// Per-chunk results of one action, in dispatch order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub action: Action,
    pub chunks: Vec<ChunkOutcome>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.chunks.iter().all(|c| c.result.is_ok())
    }

    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.chunks.iter().filter(|c| c.result.is_err())
    }
}

pub struct ActionDispatcher<C> {
    client: C,
    chunk_size: usize,
}

/// Chunk sizes must lie in `1..=MAX_IDS_PER_REQUEST`.
pub fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 || chunk_size > MAX_IDS_PER_REQUEST {
        return Err(Error::ChunkSize {
            got: chunk_size,
            max: MAX_IDS_PER_REQUEST,
        });
    }
    Ok(())
}

impl<C: BulkModify> ActionDispatcher<C> {
    pub fn new(client: C, chunk_size: usize) -> Result<Self> {
        check_chunk_size(chunk_size)?;
        Ok(Self { client, chunk_size })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sends `action` for every id, one call per chunk. Each chunk is
    /// attempted regardless of how earlier chunks went; nothing is retried.
    pub async fn dispatch(&self, action: &Action, ids: &[String]) -> DispatchReport {
        let total = ids.len().div_ceil(self.chunk_size);
        info!("Action {} will be taken in {} chunk(s)", action, total);

        let mut chunks = Vec::with_capacity(total);
        for (index, chunk) in ids.chunks(self.chunk_size).enumerate() {
            let request = action.request(chunk);
            let result = self.client.batch_modify(&request).await;
            match &result {
                Ok(()) => debug!(
                    "Chunk {}/{} of {} ({} ids) done",
                    index + 1,
                    total,
                    action,
                    chunk.len()
                ),
                Err(failure) => warn!(
                    "Chunk {}/{} of {} ({} ids) failed: {}",
                    index + 1,
                    total,
                    action,
                    chunk.len(),
                    failure
                ),
            }
            chunks.push(ChunkOutcome {
                index,
                size: chunk.len(),
                result,
            });
        }

        DispatchReport {
            action: action.clone(),
            chunks,
        }
    }
}
