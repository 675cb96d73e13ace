// Stand-ins used when no live engine or storage credentials are available.

use crate::error::ErrorKind;
use crate::navigator::{Navigator, PlatformHint};
use crate::result::{Destination, DocumentCandidate, NavigationOutcome, TransferOutcome};
use crate::store::ObjectStore;
use crate::transfer::Transfer;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

const CANNED_REFERENCES: &[&str] = &[
    "documents/solicitation.pdf",
    "documents/addendum-1.pdf",
    "documents/bid-form.pdf",
];

/// Reports a fixed set of document references without running a session.
#[derive(Debug, Clone)]
pub struct DummyNavigator {
    references: Vec<String>,
}

impl DummyNavigator {
    pub fn new() -> Self {
        Self {
            references: CANNED_REFERENCES.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }
}

impl Default for DummyNavigator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Navigator for DummyNavigator {
    async fn discover(&self, target_url: &str, hint: PlatformHint) -> NavigationOutcome {
        info!("Dummy navigation for {} ({})", target_url, hint);
        NavigationOutcome::success(
            self.references.clone(),
            format!(
                "dummy session for {} ({}) at {}",
                target_url,
                hint,
                Utc::now().to_rfc3339()
            ),
            0,
        )
    }
}

/// Reports objects already present at the destination instead of fetching.
pub struct DummyTransfer {
    store: Arc<dyn ObjectStore>,
}

impl DummyTransfer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

fn leaf_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[async_trait]
impl Transfer for DummyTransfer {
    async fn transfer(
        &self,
        candidates: &[DocumentCandidate],
        destination: &Destination,
        deadline: Option<Instant>,
    ) -> Vec<TransferOutcome> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let list_prefix = destination.list_prefix();
        let listing = self.store.list(&destination.bucket, &list_prefix);
        let listed = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, listing).await {
                Ok(listed) => listed,
                Err(_) => {
                    return candidates
                        .iter()
                        .map(|c| {
                            TransferOutcome::failed(
                                c.clone(),
                                ErrorKind::TransferTimeout,
                                "request deadline reached while listing destination".to_string(),
                                0,
                            )
                        })
                        .collect();
                }
            },
            None => listing.await,
        };

        let keys = match listed {
            Ok(keys) => keys,
            Err(e) => {
                return candidates
                    .iter()
                    .map(|c| TransferOutcome::failed(c.clone(), e.kind(), e.to_string(), 0))
                    .collect();
            }
        };

        info!(
            "Dummy transfer pairing {} candidates with {} existing objects",
            candidates.len(),
            keys.len()
        );

        // Name matches first, then whatever is left in key order.
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut paired: Vec<Option<usize>> = candidates
            .iter()
            .map(|c| {
                let found = keys
                    .iter()
                    .enumerate()
                    .find(|(i, k)| !claimed.contains(i) && leaf_name(k) == c.suggested_name)
                    .map(|(i, _)| i);
                if let Some(i) = found {
                    claimed.insert(i);
                }
                found
            })
            .collect();

        let mut spare = (0..keys.len()).filter(|i| !claimed.contains(i)).collect::<Vec<_>>().into_iter();
        for slot in paired.iter_mut().filter(|slot| slot.is_none()) {
            *slot = spare.next();
        }

        candidates
            .iter()
            .zip(paired)
            .map(|(candidate, slot)| match slot {
                Some(i) => TransferOutcome::stored(
                    candidate.clone(),
                    destination.uri_for_key(&keys[i]),
                    mime_guess::from_path(&keys[i]).first_raw().map(str::to_string),
                    0,
                ),
                None => TransferOutcome::failed(
                    candidate.clone(),
                    ErrorKind::TransferClientError,
                    "object not present at destination".to_string(),
                    0,
                ),
            })
            .collect()
    }
}
