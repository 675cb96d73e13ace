use crate::model::{ExtractionRequest, ExtractionResult, ExtractionStatus};
use crate::platform::PlatformTable;
use harvester_scanner::{
    CandidateValidator, Destination, ErrorKind, NavigationOutcome, Navigator, Transfer,
    TransferOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Message reported when navigation yields nothing that looks like a document.
pub const NO_DOCUMENTS_MESSAGE: &str = "no documents discovered";

const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(15 * 60);

/// Drives one extraction: platform hint, navigation, validation, transfer.
pub struct Extractor {
    platforms: PlatformTable,
    navigator: Arc<dyn Navigator>,
    transfer: Arc<dyn Transfer>,
    validator: CandidateValidator,
    request_deadline: Duration,
}

impl Extractor {
    pub fn new(navigator: Arc<dyn Navigator>, transfer: Arc<dyn Transfer>) -> Self {
        Self {
            platforms: PlatformTable::default(),
            navigator,
            transfer,
            validator: CandidateValidator::new(),
            request_deadline: DEFAULT_REQUEST_DEADLINE,
        }
    }

    pub fn with_platforms(mut self, platforms: PlatformTable) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_validator(mut self, validator: CandidateValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn platforms(&self) -> &PlatformTable {
        &self.platforms
    }

    pub async fn run(&self, request: &ExtractionRequest) -> ExtractionResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("extraction", run_id = %run_id, target = %request.target_url);
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: &ExtractionRequest) -> ExtractionResult {
        let deadline = Instant::now() + self.request_deadline;
        let hint = self.platforms.hint_for(&request.target_url);
        info!("Starting extraction (platform: {})", hint);

        let outcome = match tokio::time::timeout_at(
            deadline,
            self.navigator.discover(&request.target_url, hint),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => NavigationOutcome::failure(
                ErrorKind::NavigationTimeout,
                format!(
                    "request deadline of {}s reached during navigation",
                    self.request_deadline.as_secs()
                ),
                0,
            ),
        };

        if !outcome.succeeded {
            let kind = outcome.failure_kind.unwrap_or(ErrorKind::NavigationFailure);
            let reason = outcome
                .failure_reason
                .unwrap_or_else(|| "no reason given".to_string());
            warn!("Navigation failed [{}]: {}", kind, reason);
            return ExtractionResult::failure(kind, format!("navigation failed [{}]: {}", kind, reason));
        }
        info!(
            "Navigation returned {} references after {} attempt(s)",
            outcome.raw_references.len(),
            outcome.attempts
        );

        let candidates = self.validator.validate_with_hints(
            &outcome.raw_references,
            &request.target_url,
            &outcome.name_hints,
        );
        if candidates.is_empty() {
            warn!("No document candidates among {} references", outcome.raw_references.len());
            return ExtractionResult::failure(ErrorKind::NoCandidatesDiscovered, NO_DOCUMENTS_MESSAGE);
        }

        let destination = Destination::new(&request.storage_bucket, &request.storage_prefix);
        let outcomes = self
            .transfer
            .transfer_with_session(&candidates, &destination, Some(deadline), &outcome.session)
            .await;

        let result = summarize(&outcomes);
        info!("Extraction finished: {}", result.message);
        result
    }
}

/// Fold per-candidate outcomes into the run result. Paths keep discovery order.
pub fn summarize(outcomes: &[TransferOutcome]) -> ExtractionResult {
    let stored_paths: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.stored_path.clone())
        .collect();
    let failed: Vec<&TransferOutcome> = outcomes.iter().filter(|o| !o.is_success()).collect();

    let mut message = format!(
        "{} of {} documents extracted",
        stored_paths.len(),
        outcomes.len()
    );
    if !failed.is_empty() {
        let listed: Vec<String> = failed
            .iter()
            .map(|o| {
                let kind = o.error.unwrap_or(ErrorKind::TransferTransientError);
                format!("{} ({})", o.candidate.resolved_url, kind)
            })
            .collect();
        message.push_str("; failed: ");
        message.push_str(&listed.join(", "));
    }

    let status = if outcomes.is_empty() || stored_paths.is_empty() {
        ExtractionStatus::Failure
    } else if failed.is_empty() {
        ExtractionStatus::Success
    } else {
        ExtractionStatus::Partial
    };

    let error_kind = match status {
        ExtractionStatus::Success => None,
        _ if outcomes.is_empty() => Some(ErrorKind::NoCandidatesDiscovered),
        _ => failed.first().and_then(|o| o.error),
    };

    ExtractionResult {
        status,
        stored_paths,
        message,
        error_kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_scanner::DocumentCandidate;

    fn candidate(name: &str) -> DocumentCandidate {
        DocumentCandidate {
            resolved_url: format!("https://example.gov/docs/{}", name),
            source_page: "https://example.gov/bid".to_string(),
            suggested_name: name.to_string(),
        }
    }

    #[test]
    fn test_summarize_all_stored() {
        let outcomes = vec![
            TransferOutcome::stored(candidate("a.pdf"), "s3://b/p/a.pdf".to_string(), Some("application/pdf".to_string()), 1),
            TransferOutcome::stored(candidate("b.pdf"), "s3://b/p/b.pdf".to_string(), Some("application/pdf".to_string()), 1),
        ];
        let result = summarize(&outcomes);
        assert_eq!(result.status, ExtractionStatus::Success);
        assert_eq!(result.message, "2 of 2 documents extracted");
        assert_eq!(result.error_kind, None);
    }

    #[test]
    fn test_summarize_lists_failures() {
        let outcomes = vec![
            TransferOutcome::stored(candidate("a.pdf"), "s3://b/p/a.pdf".to_string(), Some("application/pdf".to_string()), 1),
            TransferOutcome::failed(candidate("b.pdf"), ErrorKind::TransferClientError, "HTTP 403".to_string(), 1),
        ];
        let result = summarize(&outcomes);
        assert_eq!(result.status, ExtractionStatus::Partial);
        assert_eq!(
            result.message,
            "1 of 2 documents extracted; failed: https://example.gov/docs/b.pdf (TransferClientError)"
        );
        assert_eq!(result.stored_paths, vec!["s3://b/p/a.pdf"]);
    }

    #[test]
    fn test_summarize_nothing_stored_is_failure() {
        let outcomes = vec![TransferOutcome::failed(
            candidate("a.pdf"),
            ErrorKind::TransferTimeout,
            "timed out".to_string(),
            3,
        )];
        let result = summarize(&outcomes);
        assert_eq!(result.status, ExtractionStatus::Failure);
        assert_eq!(result.error_kind, Some(ErrorKind::TransferTimeout));
        assert!(result.stored_paths.is_empty());
    }
}
