use crate::db::Database;
use crate::gmail::GmailClient;
use anyhow::Result;
use tracing::{debug, info, warn};

/// Gmail's page size cap for messages.list.
const MAX_RESULTS: u32 = 100;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub listed: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Lists up to `limit` of the newest messages and stores the ones not yet in
/// the database. A message that fails to fetch is logged and skipped.
pub async fn load_messages(client: &GmailClient, db: &Database, limit: u32) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();
    let mut remaining = limit;
    let mut page_token = None;

    while remaining > 0 {
        let page_size = remaining.min(MAX_RESULTS);
        let (ids, next_page_token) = client.list_messages(page_size, page_token).await?;
        remaining = remaining.saturating_sub(page_size);
        summary.listed += ids.len();
        debug!("Listed {} message ids, more pages: {}", ids.len(), next_page_token.is_some());

        for id in &ids {
            if db.record_exists(id).await? {
                summary.skipped += 1;
                continue;
            }
            match client.get_message(id).await {
                Ok(record) => {
                    debug!("Adding email: {}", record.email_id);
                    if db.insert_record(&record).await? {
                        summary.inserted += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
                Err(e) => {
                    warn!("Skipping message {}: {:#}", id, e);
                    summary.failed += 1;
                }
            }
        }

        page_token = next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    info!(
        "Sync done: {} listed, {} new, {} already stored, {} failed",
        summary.listed, summary.inserted, summary.skipped, summary.failed
    );
    Ok(summary)
}
