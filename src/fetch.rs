use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::BatchResult;
use crate::discrepancy::ValidatorOptions;
use crate::history::{HistoryKind, HistoryRecord};
use crate::ingest::{self, IngestedAnalysis, RejectedRecord};
use crate::scoring::TierTable;
use crate::service::{DetailCache, ServiceClient};

/// Both history listings merged, newest first.
#[derive(Debug, Default)]
pub struct HistoryOverview {
    pub records: Vec<HistoryRecord>,
    pub rejected: Vec<(HistoryKind, RejectedRecord)>,
    /// Listings that could not be fetched, with the reason
    pub failures: Vec<(HistoryKind, String)>,
}

/// Fetch the cross-check and batch histories concurrently.
///
/// One listing failing does not stop the other; it is reported in
/// `failures`. Only when both fail is the whole call an error.
pub async fn fetch_all_history(client: &ServiceClient, limit: u32) -> Result<HistoryOverview> {
    let mut futures = FuturesUnordered::new();
    for kind in [HistoryKind::CrossCheck, HistoryKind::Batch] {
        futures.push(async move {
            let result = client.list_history(kind, 0, limit).await;
            (kind, result)
        });
    }

    let mut overview = HistoryOverview::default();
    let mut last_error = None;
    while let Some((kind, result)) = futures.next().await {
        match result.and_then(|value| Ok(ingest::history_records(&value, kind)?)) {
            Ok(ingested) => {
                debug!(kind = %kind, count = ingested.records.len(), "fetched history");
                overview.records.extend(ingested.records);
                overview
                    .rejected
                    .extend(ingested.rejected.into_iter().map(|r| (kind, r)));
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "history listing failed");
                overview.failures.push((kind, format!("{:#}", e)));
                last_error = Some(e);
            }
        }
    }

    if overview.failures.len() == 2 {
        if let Some(e) = last_error {
            return Err(e.context("Both history listings failed"));
        }
    }

    // Stable: equal timestamps keep arrival order
    overview
        .records
        .sort_by(|a, b| b.analysis_date.cmp(&a.analysis_date));
    Ok(overview)
}

/// Raw detail payload, served from the cache when possible.
pub async fn fetch_detail(
    client: &ServiceClient,
    cache: &DetailCache,
    kind: HistoryKind,
    id: u64,
) -> Result<Value> {
    if let Some(cached) = cache.get(kind, id) {
        return Ok(cached);
    }
    let detail = client.history_detail(kind, id).await?;
    cache.put(kind, id, &detail);
    Ok(detail)
}

pub async fn fetch_analysis(
    client: &ServiceClient,
    cache: &DetailCache,
    id: u64,
    options: &ValidatorOptions,
) -> Result<IngestedAnalysis> {
    let detail = fetch_detail(client, cache, HistoryKind::CrossCheck, id).await?;
    Ok(ingest::analysis_result(&detail, options)?)
}

pub async fn fetch_batch(
    client: &ServiceClient,
    cache: &DetailCache,
    id: u64,
    tiers: &TierTable,
) -> Result<BatchResult> {
    let detail = fetch_detail(client, cache, HistoryKind::Batch, id).await?;
    Ok(ingest::batch_result(&detail, tiers)?)
}
