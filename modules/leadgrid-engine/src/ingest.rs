//! Lead ingestion with batch-level and store-level dedup.

use std::collections::HashSet;

use tracing::warn;

use leadgrid_common::DiscoveredCandidate;

use crate::traits::LeadStore;

/// Counts from one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub inserted: u32,
    pub skipped: u32,
}

/// Insert a batch of candidates, skipping anything already seen earlier in
/// the batch or already stored. A record that fails to insert is counted as
/// skipped and the rest of the batch keeps going.
pub async fn ingest_candidates(
    candidates: &[DiscoveredCandidate],
    store: &dyn LeadStore,
) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(candidates.len());

    for candidate in candidates {
        if !seen.insert(candidate.external_id.as_str()) {
            outcome.skipped += 1;
            continue;
        }

        match store.exists(&candidate.external_id).await {
            Ok(true) => outcome.skipped += 1,
            Ok(false) => match store.insert(candidate).await {
                Ok(()) => outcome.inserted += 1,
                Err(e) => {
                    warn!(external_id = %candidate.external_id, error = %e, "Lead insert failed, skipping");
                    outcome.skipped += 1;
                }
            },
            Err(e) => {
                warn!(external_id = %candidate.external_id, error = %e, "Lead lookup failed, skipping");
                outcome.skipped += 1;
            }
        }
    }

    outcome
}
