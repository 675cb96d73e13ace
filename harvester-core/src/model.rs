use harvester_scanner::ErrorKind;
use serde::{Deserialize, Serialize};

/// One accepted extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    #[serde(rename = "url", alias = "target_url")]
    pub target_url: String,
    #[serde(rename = "s3_bucket", alias = "storage_bucket")]
    pub storage_bucket: String,
    #[serde(rename = "s3_prefix", alias = "storage_prefix")]
    pub storage_prefix: String,
}

impl ExtractionRequest {
    pub fn new(
        target_url: impl Into<String>,
        storage_bucket: impl Into<String>,
        storage_prefix: impl Into<String>,
    ) -> Self {
        Self {
            target_url: target_url.into(),
            storage_bucket: storage_bucket.into(),
            storage_prefix: storage_prefix.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Success,
    Partial,
    Failure,
}

/// Terminal artifact of a run. Serialized as `{status, files, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub status: ExtractionStatus,
    #[serde(rename = "files")]
    pub stored_paths: Vec<String>,
    pub message: String,
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
}

impl ExtractionResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Failure,
            stored_paths: Vec::new(),
            message: message.into(),
            error_kind: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_wire_shape() {
        let result = ExtractionResult {
            status: ExtractionStatus::Partial,
            stored_paths: vec!["s3://b/p/a.pdf".to_string()],
            message: "1 of 2 documents extracted".to_string(),
            error_kind: Some(ErrorKind::TransferClientError),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "status": "partial",
                "files": ["s3://b/p/a.pdf"],
                "message": "1 of 2 documents extracted"
            })
        );
    }

    #[test]
    fn test_request_accepts_both_field_spellings() {
        let a: ExtractionRequest = serde_json::from_value(serde_json::json!({
            "url": "https://example.gov",
            "s3_bucket": "b",
            "s3_prefix": "p"
        }))
        .unwrap();
        let b: ExtractionRequest = serde_json::from_value(serde_json::json!({
            "target_url": "https://example.gov",
            "storage_bucket": "b",
            "storage_prefix": "p"
        }))
        .unwrap();
        assert_eq!(a, b);
    }
}
