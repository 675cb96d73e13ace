use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cookie the engine's browser session held when navigation finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    /// Host-only for the document hosts when absent.
    #[serde(default)]
    pub domain: Option<String>,
}

/// Authentication state handed from navigation to transfer, for portals
/// that only serve attachments to a logged-in session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SessionContext {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.headers.is_empty()
    }
}

/// What a navigation session reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationOutcome {
    pub raw_references: Vec<String>,
    pub session_narrative: String,
    pub succeeded: bool,
    pub failure_reason: Option<String>,
    pub failure_kind: Option<ErrorKind>,
    pub attempts: u32,
    /// Display filenames keyed by the raw reference they were reported with.
    #[serde(default)]
    pub name_hints: BTreeMap<String, String>,
    #[serde(default)]
    pub session: SessionContext,
}

impl NavigationOutcome {
    pub fn success(raw_references: Vec<String>, session_narrative: String, attempts: u32) -> Self {
        Self {
            raw_references,
            session_narrative,
            succeeded: true,
            failure_reason: None,
            failure_kind: None,
            attempts,
            name_hints: BTreeMap::new(),
            session: SessionContext::default(),
        }
    }

    pub fn failure(kind: ErrorKind, reason: String, attempts: u32) -> Self {
        Self {
            raw_references: Vec::new(),
            session_narrative: String::new(),
            succeeded: false,
            failure_reason: Some(reason),
            failure_kind: Some(kind),
            attempts,
            name_hints: BTreeMap::new(),
            session: SessionContext::default(),
        }
    }

    pub fn with_name_hints(mut self, name_hints: BTreeMap<String, String>) -> Self {
        self.name_hints = name_hints;
        self
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }
}

/// A validated document location eligible for transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentCandidate {
    pub resolved_url: String,
    pub source_page: String,
    pub suggested_name: String,
}

/// Where transferred documents land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub bucket: String,
    pub prefix: String,
}

impl Destination {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    /// Prefix used when listing, always ending in `/` unless empty.
    pub fn list_prefix(&self) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        }
    }

    pub fn uri_for_key(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// The finalized result of one transfer unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub candidate: DocumentCandidate,
    pub stored_path: Option<String>,
    pub content_type: Option<String>,
    pub error: Option<ErrorKind>,
    pub detail: Option<String>,
    pub attempts: u32,
}

impl TransferOutcome {
    pub fn stored(
        candidate: DocumentCandidate,
        stored_path: String,
        content_type: Option<String>,
        attempts: u32,
    ) -> Self {
        Self {
            candidate,
            stored_path: Some(stored_path),
            content_type,
            error: None,
            detail: None,
            attempts,
        }
    }

    pub fn failed(candidate: DocumentCandidate, kind: ErrorKind, detail: String, attempts: u32) -> Self {
        Self {
            candidate,
            stored_path: None,
            content_type: None,
            error: Some(kind),
            detail: Some(detail),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.stored_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_keys() {
        let dest = Destination::new("bucket", "/solicitations/2024/");
        assert_eq!(dest.key_for("a.pdf"), "solicitations/2024/a.pdf");
        assert_eq!(dest.list_prefix(), "solicitations/2024/");
        assert_eq!(
            dest.uri_for_key("solicitations/2024/a.pdf"),
            "s3://bucket/solicitations/2024/a.pdf"
        );

        let bare = Destination::new("bucket", "");
        assert_eq!(bare.key_for("a.pdf"), "a.pdf");
        assert_eq!(bare.list_prefix(), "");
    }

    #[test]
    fn test_outcome_without_session_fields_deserializes() {
        let json = r#"{
            "raw_references": ["/a.pdf"],
            "session_narrative": "",
            "succeeded": true,
            "failure_reason": null,
            "failure_kind": null,
            "attempts": 1
        }"#;
        let outcome: NavigationOutcome = serde_json::from_str(json).unwrap();
        assert!(outcome.name_hints.is_empty());
        assert!(outcome.session.is_empty());
    }
}
