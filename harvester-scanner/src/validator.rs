use crate::result::DocumentCandidate;
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use url::Url;

/// A rule that marks a resolved URL as a downloadable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRule {
    /// Last path segment ends with `.<ext>` (case-insensitive).
    Extension(String),
    /// Lower-cased path contains this fragment, e.g. `/attachment`.
    PathIndicator(String),
    /// Query string carries this key (case-insensitive).
    QueryKey(String),
    /// Query string carries `key=value` (case-insensitive).
    QueryValue { key: String, value: String },
}

/// Which rule family matched a URL. Drives normalization and naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Extension(String),
    Indicator,
}

const DEFAULT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "rtf", "odt", "csv", "zip",
];
const DEFAULT_PATH_INDICATORS: &[&str] = &[
    "/download",
    "/attachment",
    "/attachments/",
    "/pdf/",
    "/getfile",
    "/viewfile",
    "/file/",
];
const DEFAULT_QUERY_KEYS: &[&str] = &[
    "attachment",
    "attachmentid",
    "download",
    "docid",
    "documentid",
    "fileid",
];

/// Turns raw discovery references into validated document candidates.
#[derive(Debug, Clone)]
pub struct CandidateValidator {
    rules: Vec<DocumentRule>,
}

impl CandidateValidator {
    pub fn new() -> Self {
        let mut rules: Vec<DocumentRule> = DEFAULT_EXTENSIONS
            .iter()
            .map(|ext| DocumentRule::Extension(ext.to_string()))
            .collect();
        rules.extend(
            DEFAULT_PATH_INDICATORS
                .iter()
                .map(|p| DocumentRule::PathIndicator(p.to_string())),
        );
        rules.extend(
            DEFAULT_QUERY_KEYS
                .iter()
                .map(|k| DocumentRule::QueryKey(k.to_string())),
        );
        for key in ["format", "type"] {
            rules.push(DocumentRule::QueryValue {
                key: key.to_string(),
                value: "pdf".to_string(),
            });
        }
        Self { rules }
    }

    /// A validator with no rules at all; every reference is dropped until
    /// rules are added.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: DocumentRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[DocumentRule] {
        &self.rules
    }

    pub fn validate(&self, raw_references: &[String], source_page: &str) -> Vec<DocumentCandidate> {
        self.validate_with_hints(raw_references, source_page, &BTreeMap::new())
    }

    /// Like [`validate`](Self::validate), with display filenames the engine
    /// reported for some references. A hint names a candidate only when the
    /// URL's own last segment carries no file extension.
    pub fn validate_with_hints(
        &self,
        raw_references: &[String],
        source_page: &str,
        name_hints: &BTreeMap<String, String>,
    ) -> Vec<DocumentCandidate> {
        let base = Url::parse(source_page).ok();
        let mut seen: HashSet<String> = HashSet::new();
        let mut taken_names: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for raw in raw_references {
            let Some(resolved) = resolve_reference(base.as_ref(), raw) else {
                debug!("Dropping unresolvable reference {:?}", raw);
                continue;
            };

            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                debug!("Dropping non-http reference {}", resolved);
                continue;
            }

            let Some(classification) = self.classify(&resolved) else {
                debug!("Dropping non-document reference {}", resolved);
                continue;
            };

            let normalized = normalize_url(&resolved, &classification);
            if !seen.insert(normalized) {
                debug!("Dropping duplicate reference {}", resolved);
                continue;
            }

            let ordinal = candidates.len() + 1;
            let hint = name_hints.get(raw).map(String::as_str);
            let name = suggested_name(&resolved, &classification, hint)
                .unwrap_or_else(|| format!("document-{}.pdf", ordinal));
            let name = disambiguate(name, &mut taken_names);

            candidates.push(DocumentCandidate {
                resolved_url: resolved.to_string(),
                source_page: source_page.to_string(),
                suggested_name: name,
            });
        }

        info!(
            "Validated {} document candidates from {} references",
            candidates.len(),
            raw_references.len()
        );
        candidates
    }

    /// Apply the rule set. Extension rules take precedence over indicators.
    pub fn classify(&self, url: &Url) -> Option<Classification> {
        let path = url.path().to_ascii_lowercase();
        let last_segment = path.rsplit('/').next().unwrap_or("");

        for rule in &self.rules {
            if let DocumentRule::Extension(ext) = rule
                && last_segment.ends_with(&format!(".{}", ext.to_ascii_lowercase()))
            {
                return Some(Classification::Extension(ext.to_ascii_lowercase()));
            }
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_ascii_lowercase()))
            .collect();

        let indicated = self.rules.iter().any(|rule| match rule {
            DocumentRule::Extension(_) => false,
            DocumentRule::PathIndicator(fragment) => {
                path.contains(&fragment.to_ascii_lowercase())
            }
            DocumentRule::QueryKey(key) => {
                let key = key.to_ascii_lowercase();
                pairs.iter().any(|(k, _)| *k == key)
            }
            DocumentRule::QueryValue { key, value } => {
                let key = key.to_ascii_lowercase();
                let value = value.to_ascii_lowercase();
                pairs.iter().any(|(k, v)| *k == key && *v == value)
            }
        });

        indicated.then_some(Classification::Indicator)
    }
}

impl Default for CandidateValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_reference(base: Option<&Url>, raw: &str) -> Option<Url> {
    let href = raw.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    resolved.set_fragment(None);
    Some(resolved)
}

/// Identity used for deduplication within a run.
pub fn normalize_url(url: &Url, classification: &Classification) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    match classification {
        Classification::Extension(_) => normalized.set_query(None),
        Classification::Indicator => {
            let mut pairs: Vec<(String, String)> = normalized
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if pairs.is_empty() {
                normalized.set_query(None);
            } else {
                pairs.sort();
                normalized.query_pairs_mut().clear().extend_pairs(pairs);
            }
        }
    }

    let mut out = normalized.to_string().to_lowercase();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

fn suggested_name(url: &Url, classification: &Classification, hint: Option<&str>) -> Option<String> {
    let tail = url.path_segments()?.next_back().and_then(|segment| {
        let decoded = percent_decode_str(segment)
            .decode_utf8_lossy()
            .replace('+', " ");
        sanitize_name(&decoded)
    });

    if let Some(tail) = &tail
        && has_extension(tail)
    {
        return Some(tail.clone());
    }

    let ext = match classification {
        Classification::Extension(ext) => ext.as_str(),
        Classification::Indicator => "pdf",
    };
    hint.and_then(sanitize_name)
        .or(tail)
        .map(|name| if has_extension(&name) { name } else { format!("{}.{}", name, ext) })
}

fn sanitize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn has_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Append `-2`, `-3`, ... to the stem until the name is free in this run.
fn disambiguate(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (name.clone(), None),
    };

    let mut suffix = 2;
    loop {
        let candidate = match &ext {
            Some(ext) => format!("{}-{}.{}", stem, suffix, ext),
            None => format!("{}-{}", stem, suffix),
        };
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PAGE: &str = "https://caleprocure.ca.gov/event/0850/0000036230";

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolves_relative_references() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(&refs(&["/files/spec.pdf", "addendum.pdf"]), PAGE);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].resolved_url, "https://caleprocure.ca.gov/files/spec.pdf");
        assert_eq!(
            candidates[1].resolved_url,
            "https://caleprocure.ca.gov/event/0850/addendum.pdf"
        );
        assert!(candidates.iter().all(|c| c.source_page == PAGE));
    }

    #[test]
    fn test_drops_non_http_and_non_documents() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(
            &refs(&[
                "mailto:buyer@example.gov",
                "javascript:void(0)",
                "ftp://example.gov/file.pdf",
                "https://example.gov/about.html",
                "#attachments",
                "",
                "https://example.gov/rfp.pdf",
            ]),
            PAGE,
        );

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].suggested_name, "rfp.pdf");
    }

    #[test]
    fn test_indicator_rules() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(
            &refs(&[
                "https://example.gov/attachments/123",
                "https://example.gov/view?AttachmentId=77",
                "https://example.gov/doc?format=PDF&id=4",
                "https://example.gov/doc?format=html&id=5",
            ]),
            PAGE,
        );

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].suggested_name, "123.pdf");
        assert_eq!(candidates[1].suggested_name, "view.pdf");
        assert_eq!(candidates[2].suggested_name, "doc.pdf");
    }

    #[test]
    fn test_dedup_is_case_and_fragment_insensitive() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(
            &refs(&[
                "https://Example.gov/Docs/A.pdf",
                "https://example.gov/docs/a.pdf#page=2",
                "https://example.gov/docs/a.pdf?token=abc",
                "https://example.gov/docs/b.pdf",
            ]),
            PAGE,
        );

        let urls: Vec<&str> = candidates.iter().map(|c| c.resolved_url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.gov/Docs/A.pdf", "https://example.gov/docs/b.pdf"]
        );
    }

    #[test]
    fn test_indicator_dedup_keeps_distinct_queries() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(
            &refs(&[
                "https://example.gov/get?fileid=1&v=2",
                "https://example.gov/get?v=2&fileid=1",
                "https://example.gov/get?fileid=2",
            ]),
            PAGE,
        );

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].suggested_name, "get.pdf");
        assert_eq!(candidates[1].suggested_name, "get-2.pdf");
    }

    #[test]
    fn test_names_are_decoded_and_disambiguated() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(
            &refs(&[
                "https://example.gov/a/Bid%20Package.pdf",
                "https://example.gov/b/Bid%20Package.pdf",
                "https://example.gov/c/bid+package.PDF",
                "https://example.gov/d/Bid%20Package-2.pdf",
            ]),
            PAGE,
        );

        let names: Vec<&str> = candidates.iter().map(|c| c.suggested_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Bid Package.pdf",
                "Bid Package-2.pdf",
                "bid package-3.PDF",
                "Bid Package-2-2.pdf"
            ]
        );
    }

    #[test]
    fn test_fallback_name_uses_ordinal() {
        let validator = CandidateValidator::new();
        let candidates = validator.validate(
            &refs(&[
                "https://example.gov/one.pdf",
                "https://example.gov/file/",
            ]),
            PAGE,
        );

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].suggested_name, "document-2.pdf");
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let validator = CandidateValidator::new();
        let first = validator.validate(
            &refs(&[
                "docs/x.pdf",
                "https://example.gov/x.pdf",
                "https://example.gov/y/x.pdf",
                "https://example.gov/download?docid=9#top",
                "docs/X.PDF",
            ]),
            "https://example.gov/event/1",
        );
        let again_input: Vec<String> = first.iter().map(|c| c.resolved_url.clone()).collect();
        let second = validator.validate(&again_input, "https://example.gov/event/1");

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_when_nothing_qualifies() {
        let validator = CandidateValidator::new();
        assert!(validator.validate(&refs(&["/login", "/home.html"]), PAGE).is_empty());
        assert!(validator.validate(&[], PAGE).is_empty());
    }

    #[test]
    fn test_rule_set_is_extensible() {
        let validator = CandidateValidator::empty().with_rule(DocumentRule::Extension("dwg".into()));
        let candidates = validator.validate(
            &refs(&["https://example.gov/plan.dwg", "https://example.gov/a.pdf"]),
            PAGE,
        );

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].suggested_name, "plan.dwg");
    }

    #[test]
    fn test_engine_filename_hints() {
        let validator = CandidateValidator::new();
        let hints: BTreeMap<String, String> = [
            ("/attachments/77", "Scope of Work.docx"),
            ("/attachments/78", "Pricing Sheet"),
            ("/files/bid%20form.pdf", "ignored title.pdf"),
            ("/attachments/79", "  "),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let candidates = validator.validate_with_hints(
            &refs(&[
                "/attachments/77",
                "/attachments/78",
                "/files/bid%20form.pdf",
                "/attachments/79",
            ]),
            PAGE,
            &hints,
        );

        let names: Vec<&str> = candidates.iter().map(|c| c.suggested_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Scope of Work.docx", "Pricing Sheet.pdf", "bid form.pdf", "79.pdf"]
        );
    }

    #[test]
    fn test_hints_are_sanitized_and_disambiguated() {
        let validator = CandidateValidator::new();
        let hints: BTreeMap<String, String> = [
            ("/download?docid=1", "addenda/addendum 1.pdf"),
            ("/download?docid=2", "addenda/addendum 1.pdf"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let candidates = validator.validate_with_hints(
            &refs(&["/download?docid=1", "/download?docid=2"]),
            PAGE,
            &hints,
        );

        assert_eq!(candidates[0].suggested_name, "addenda_addendum 1.pdf");
        assert_eq!(candidates[1].suggested_name, "addenda_addendum 1-2.pdf");
    }

    fn reference() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["", "https://example.gov", "https://Example.gov", "https://mirror.example.gov"]),
            prop::sample::select(vec!["/docs/", "/Docs/", "/attachments/", "/"]),
            "[a-c]{1,2}",
            prop::sample::select(vec![".pdf", ".PDF", ".docx", ".html", ""]),
            prop::sample::select(vec!["", "#page=2", "?v=1", "?fileid=3"]),
        )
            .prop_map(|(host, dir, stem, ext, tail)| format!("{}{}{}{}{}", host, dir, stem, ext, tail))
    }

    fn identity(validator: &CandidateValidator, raw: &str) -> Option<String> {
        let base = Url::parse(PAGE).ok();
        let resolved = resolve_reference(base.as_ref(), raw)?;
        let classification = validator.classify(&resolved)?;
        Some(normalize_url(&resolved, &classification))
    }

    proptest! {
        #[test]
        fn prop_candidates_are_unique_and_in_first_seen_order(raw in prop::collection::vec(reference(), 0..16)) {
            let validator = CandidateValidator::new();
            let candidates = validator.validate(&raw, PAGE);

            let identities: Vec<String> = candidates
                .iter()
                .filter_map(|c| identity(&validator, &c.resolved_url))
                .collect();
            prop_assert_eq!(identities.len(), candidates.len());
            let distinct: HashSet<&String> = identities.iter().collect();
            prop_assert_eq!(distinct.len(), identities.len());

            let mut first_seen: Vec<String> = Vec::new();
            for reference in &raw {
                if let Some(id) = identity(&validator, reference)
                    && !first_seen.contains(&id)
                {
                    first_seen.push(id);
                }
            }
            prop_assert_eq!(identities, first_seen);

            let names: HashSet<String> = candidates.iter().map(|c| c.suggested_name.to_lowercase()).collect();
            prop_assert_eq!(names.len(), candidates.len());
        }

        #[test]
        fn prop_revalidating_resolved_urls_is_stable(raw in prop::collection::vec(reference(), 0..16)) {
            let validator = CandidateValidator::new();
            let first = validator.validate(&raw, PAGE);
            let resolved: Vec<String> = first.iter().map(|c| c.resolved_url.clone()).collect();
            let second = validator.validate(&resolved, PAGE);

            prop_assert_eq!(first, second);
        }
    }
}
