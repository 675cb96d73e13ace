use crate::error::{EngineError, ErrorKind, Result, ScanError};
use crate::result::{NavigationOutcome, SessionContext};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Site family of a target page. Selects the task phrasing handed to the
/// automation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformHint {
    Generic,
    CalEProcure,
    Bonfire,
    PlanetBids,
    BidNet,
    SamGov,
}

impl PlatformHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformHint::Generic => "generic",
            PlatformHint::CalEProcure => "cal-e-procure",
            PlatformHint::Bonfire => "bonfire",
            PlatformHint::PlanetBids => "planet-bids",
            PlatformHint::BidNet => "bid-net",
            PlatformHint::SamGov => "sam-gov",
        }
    }

    /// Labels under which this platform keeps its document listings.
    fn document_area(&self) -> &'static str {
        match self {
            PlatformHint::Generic => {
                "\"Documents\", \"Attachments\", \"Files\", \"Downloads\" or \"Bid Documents\""
            }
            PlatformHint::CalEProcure => {
                "the \"View Event Package\" button, then the attachments table \
                 (each row has a View/download icon that opens a modal whose \
                 #downloadButton link holds the PDF URL)"
            }
            PlatformHint::Bonfire => {
                "the \"Public Opportunity\" page, \"Documents\" tab and its \
                 \"Download\" buttons"
            }
            PlatformHint::PlanetBids => {
                "the bid detail \"Documents\" tab and the \"Addenda & Emails\" tab"
            }
            PlatformHint::BidNet => {
                "the solicitation \"Documents\" section (sign-in prompts may guard \
                 the download links)"
            }
            PlatformHint::SamGov => {
                "the opportunity \"Attachments/Links\" section"
            }
        }
    }

    /// Natural-language task for one discovery session on `target_url`.
    pub fn task_for(&self, target_url: &str) -> String {
        format!(
            "You are collecting the links of every downloadable document on a public page.\n\
             \n\
             GOAL:\n\
             - Visit: {target_url}\n\
             - Locate the document area: {area}.\n\
             - Open or expand the documents area if needed; scroll and page through it.\n\
             - For EACH document (link ends with .pdf, or the label mentions PDF, View or Download), \
             read the direct link it points to. Do not open a PDF viewer.\n\
             - Return one entry per document with its absolute URL as href and a filename: \
             prefer the tail of the href, fall back to the modal or row title.\n\
             \n\
             CONSTRAINTS:\n\
             - Do not click unrelated links.\n\
             - Wait for the network to be idle after each action.\n\
             - If nothing can be found, finish successfully with an empty list.",
            target_url = target_url,
            area = self.document_area(),
        )
    }
}

impl fmt::Display for PlatformHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the automation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTask {
    pub target_url: String,
    pub platform: PlatformHint,
    pub instructions: String,
}

impl NavigationTask {
    pub fn new(target_url: &str, platform: PlatformHint) -> Self {
        Self {
            target_url: target_url.to_string(),
            platform,
            instructions: platform.task_for(target_url),
        }
    }
}

/// What the engine reported for a session that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineReport {
    pub references: Vec<String>,
    pub narrative: String,
    /// Display filenames keyed by reference, when the engine saw one.
    pub name_hints: BTreeMap<String, String>,
    /// Cookies and headers of the browser session, for gated downloads.
    pub session: SessionContext,
}

/// The external page automation engine. Opaque: takes a task, returns
/// references.
#[async_trait]
pub trait NavigationEngine: Send + Sync {
    async fn run(&self, task: &NavigationTask) -> std::result::Result<EngineReport, EngineError>;
}

/// The navigation adapter contract consumed by the orchestrator.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn discover(&self, target_url: &str, hint: PlatformHint) -> NavigationOutcome;
}

/// Drives one engine session per call, bounded by a wall-clock timeout and a
/// retry budget for start-up failures.
pub struct NavigationSession {
    engine: Arc<dyn NavigationEngine>,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl NavigationSession {
    pub fn new(engine: Arc<dyn NavigationEngine>) -> Self {
        Self {
            engine,
            timeout: Duration::from_secs(300),
            max_retries: 1,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

#[async_trait]
impl Navigator for NavigationSession {
    async fn discover(&self, target_url: &str, hint: PlatformHint) -> NavigationOutcome {
        let task = NavigationTask::new(target_url, hint);
        let attempts = Arc::new(AtomicU32::new(0));

        info!("Starting navigation session for {} ({})", target_url, hint);

        let session = {
            let attempts = attempts.clone();
            let task = &task;
            async move {
                loop {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!("Engine attempt {} for {}", attempt, task.target_url);

                    match self.engine.run(task).await {
                        Ok(report) => {
                            return NavigationOutcome::success(
                                report.references,
                                report.narrative,
                                attempt,
                            )
                            .with_name_hints(report.name_hints)
                            .with_session(report.session);
                        }
                        Err(e) if e.is_transient() && attempt <= self.max_retries => {
                            warn!("Engine attempt {} failed, retrying: {}", attempt, e);
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        Err(e) => {
                            return NavigationOutcome::failure(
                                ErrorKind::NavigationFailure,
                                e.to_string(),
                                attempt,
                            );
                        }
                    }
                }
            }
        };

        let outcome = match tokio::time::timeout(self.timeout, session).await {
            Ok(outcome) => outcome,
            Err(_) => NavigationOutcome::failure(
                ErrorKind::NavigationTimeout,
                format!("navigation exceeded {}s", self.timeout.as_secs_f64()),
                attempts.load(Ordering::SeqCst),
            ),
        };

        if outcome.succeeded {
            info!(
                "Navigation found {} references after {} attempt(s)",
                outcome.raw_references.len(),
                outcome.attempts
            );
        } else {
            warn!(
                "Navigation failed after {} attempt(s): {}",
                outcome.attempts,
                outcome.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
        outcome
    }
}

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    url: &'a str,
    task: &'a str,
    platform: PlatformHint,
    headless: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReferenceEntry {
    Url(String),
    Link {
        href: String,
        #[serde(default, alias = "title", alias = "name")]
        filename: Option<String>,
    },
}

impl ReferenceEntry {
    fn into_parts(self) -> (String, Option<String>) {
        match self {
            ReferenceEntry::Url(url) => (url, None),
            ReferenceEntry::Link { href, filename } => (href, filename),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EngineResponse {
    success: bool,
    #[serde(default)]
    references: Vec<ReferenceEntry>,
    #[serde(default)]
    narrative: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    session: SessionContext,
}

/// Talks to a browser automation service over HTTP.
pub struct HttpAutomationEngine {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    headless: bool,
}

impl HttpAutomationEngine {
    pub fn new(endpoint: &str) -> Result<Self> {
        Url::parse(endpoint)
            .map_err(|e| ScanError::InvalidUrl(format!("automation endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .user_agent("Harvester/0.1 (https://github.com/trapdoorsec/harvester)")
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: None,
            headless: true,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

#[async_trait]
impl NavigationEngine for HttpAutomationEngine {
    async fn run(&self, task: &NavigationTask) -> std::result::Result<EngineReport, EngineError> {
        let body = EngineRequest {
            url: &task.target_url,
            task: &task.instructions,
            platform: task.platform,
            headless: self.headless,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Startup(format!("could not reach engine: {}", e)))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::Startup(format!("engine unavailable: HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(EngineError::Session(format!("engine rejected task: HTTP {}", status)));
        }

        let parsed: EngineResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Session(format!("unreadable engine response: {}", e)))?;

        if !parsed.success {
            return Err(EngineError::Session(
                parsed
                    .error
                    .unwrap_or_else(|| "engine reported failure".to_string()),
            ));
        }

        let mut references = Vec::with_capacity(parsed.references.len());
        let mut name_hints = BTreeMap::new();
        for entry in parsed.references {
            let (href, filename) = entry.into_parts();
            if let Some(filename) = filename.filter(|f| !f.trim().is_empty()) {
                name_hints.insert(href.clone(), filename);
            }
            references.push(href);
        }

        if !parsed.session.is_empty() {
            debug!(
                "Engine returned {} session cookies and {} headers",
                parsed.session.cookies.len(),
                parsed.session.headers.len()
            );
        }

        Ok(EngineReport {
            references,
            narrative: parsed.narrative,
            name_hints,
            session: parsed.session,
        })
    }
}
