use crate::error::{ErrorKind, Result};
use crate::result::{Destination, DocumentCandidate, SessionContext, TransferOutcome};
use crate::store::ObjectStore;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// The transfer contract consumed by the orchestrator: one outcome per
/// candidate, in input order.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Units still running at `deadline` are cancelled and recorded as
    /// `TransferTimeout`.
    async fn transfer(
        &self,
        candidates: &[DocumentCandidate],
        destination: &Destination,
        deadline: Option<Instant>,
    ) -> Vec<TransferOutcome>;

    /// Transfer inside the authenticated browser session navigation ended
    /// in. Implementations that cannot use a session ignore it.
    async fn transfer_with_session(
        &self,
        candidates: &[DocumentCandidate],
        destination: &Destination,
        deadline: Option<Instant>,
        _session: &SessionContext,
    ) -> Vec<TransferOutcome> {
        self.transfer(candidates, destination, deadline).await
    }
}

/// Retry and timing knobs shared by every unit of one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    pub parallelism: usize,
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            parallelism: 4,
            attempt_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl TransferPolicy {
    /// Delay before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Fetches candidates over HTTP and writes them to an object store.
pub struct TransferManager {
    client: Client,
    store: Arc<dyn ObjectStore>,
    policy: TransferPolicy,
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/pdf,application/octet-stream,*/*;q=0.8"),
    );
    headers
}

fn client_builder(headers: HeaderMap) -> ClientBuilder {
    Client::builder()
        .user_agent("Harvester/0.1 (https://github.com/trapdoorsec/harvester)")
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
}

/// A client that replays the browser session's cookies and headers. Cookies
/// without a domain are scoped to the hosts of the candidates.
fn session_client(session: &SessionContext, candidates: &[DocumentCandidate]) -> Result<Client> {
    let jar = Arc::new(Jar::default());
    for cookie in &session.cookies {
        let pair = format!("{}={}; Path=/", cookie.name, cookie.value);
        match cookie.domain.as_deref().map(|d| d.trim_start_matches('.')) {
            Some(domain) if !domain.is_empty() => match Url::parse(&format!("https://{}/", domain)) {
                Ok(url) => jar.add_cookie_str(&format!("{}; Domain={}", pair, domain), &url),
                Err(e) => warn!("Skipping session cookie {} for {}: {}", cookie.name, domain, e),
            },
            _ => {
                for candidate in candidates {
                    if let Ok(url) = Url::parse(&candidate.resolved_url) {
                        jar.add_cookie_str(&pair, &url);
                    }
                }
            }
        }
    }

    let mut headers = base_headers();
    for (name, value) in &session.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping unusable session header {:?}", name),
        }
    }

    Ok(client_builder(headers).cookie_provider(jar).build()?)
}

/// Aborts the spawned unit when dropped, so a cancelled transfer leaves no
/// unit running behind it.
struct UnitHandle(JoinHandle<TransferOutcome>);

impl Drop for UnitHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl TransferManager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Result<Self> {
        let client = client_builder(base_headers()).build()?;

        Ok(Self {
            client,
            store,
            policy: TransferPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: TransferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    async fn run_units(
        &self,
        client: &Client,
        candidates: &[DocumentCandidate],
        destination: &Destination,
        deadline: Option<Instant>,
    ) -> Vec<TransferOutcome> {
        info!(
            "Transferring {} candidates with {} workers",
            candidates.len(),
            self.policy.parallelism
        );

        let semaphore = Arc::new(Semaphore::new(self.policy.parallelism.max(1)));
        let mut units = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let attempts = Arc::new(AtomicU32::new(0));
            let unit = TransferUnit {
                client: client.clone(),
                store: self.store.clone(),
                destination: destination.clone(),
                policy: self.policy,
                attempts: attempts.clone(),
            };
            let semaphore = semaphore.clone();
            let owned = candidate.clone();

            let handle = UnitHandle(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                unit.run(owned).await
            }));

            units.push((candidate.clone(), attempts, handle));
        }

        // Collected positionally so completion order never reorders outcomes.
        let mut outcomes = Vec::with_capacity(units.len());
        for (candidate, attempts, mut handle) in units {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle.0).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Deadline reached before {} finished", candidate.resolved_url);
                        outcomes.push(TransferOutcome::failed(
                            candidate,
                            ErrorKind::TransferTimeout,
                            "request deadline reached before the transfer finished".to_string(),
                            attempts.load(Ordering::SeqCst),
                        ));
                        continue;
                    }
                },
                None => (&mut handle.0).await,
            };

            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(TransferOutcome::failed(
                    candidate,
                    ErrorKind::TransferTransientError,
                    format!("transfer unit aborted: {}", e),
                    attempts.load(Ordering::SeqCst),
                )),
            }
        }

        let stored = outcomes.iter().filter(|o| o.is_success()).count();
        info!("Transfer complete: {}/{} stored", stored, outcomes.len());
        outcomes
    }
}

#[async_trait]
impl Transfer for TransferManager {
    async fn transfer(
        &self,
        candidates: &[DocumentCandidate],
        destination: &Destination,
        deadline: Option<Instant>,
    ) -> Vec<TransferOutcome> {
        self.run_units(&self.client, candidates, destination, deadline)
            .await
    }

    async fn transfer_with_session(
        &self,
        candidates: &[DocumentCandidate],
        destination: &Destination,
        deadline: Option<Instant>,
        session: &SessionContext,
    ) -> Vec<TransferOutcome> {
        if session.is_empty() {
            return self.transfer(candidates, destination, deadline).await;
        }

        match session_client(session, candidates) {
            Ok(client) => {
                info!(
                    "Using browser session ({} cookies, {} headers) for transfer",
                    session.cookies.len(),
                    session.headers.len()
                );
                self.run_units(&client, candidates, destination, deadline)
                    .await
            }
            Err(e) => {
                warn!("Could not build session client, transferring without it: {}", e);
                self.transfer(candidates, destination, deadline).await
            }
        }
    }
}

#[derive(Debug)]
struct UnitFailure {
    kind: ErrorKind,
    detail: String,
}

impl UnitFailure {
    fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            ErrorKind::TransferTimeout
        } else if e.is_builder() || e.is_redirect() {
            ErrorKind::TransferClientError
        } else {
            ErrorKind::TransferTransientError
        };
        Self::new(kind, e.to_string())
    }
}

struct TransferUnit {
    client: Client,
    store: Arc<dyn ObjectStore>,
    destination: Destination,
    policy: TransferPolicy,
    attempts: Arc<AtomicU32>,
}

impl TransferUnit {
    async fn run(self, candidate: DocumentCandidate) -> TransferOutcome {
        let key = self.destination.key_for(&candidate.suggested_name);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.attempts.store(attempt, Ordering::SeqCst);
            debug!("Attempt {} for {}", attempt, candidate.resolved_url);

            let result = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.fetch_and_store(&candidate, &key),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(UnitFailure::new(
                    ErrorKind::TransferTimeout,
                    format!(
                        "attempt exceeded {}s",
                        self.policy.attempt_timeout.as_secs_f64()
                    ),
                )),
            };

            match result {
                Ok(content_type) => {
                    let stored_path = self.destination.uri_for_key(&key);
                    info!("Stored {} as {}", candidate.resolved_url, stored_path);
                    return TransferOutcome::stored(candidate, stored_path, Some(content_type), attempt);
                }
                Err(failure) if failure.kind.is_retriable() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Attempt {} for {} failed ({}: {}), retrying in {:?}",
                        attempt, candidate.resolved_url, failure.kind, failure.detail, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    warn!(
                        "Giving up on {} after {} attempt(s): {} ({})",
                        candidate.resolved_url, attempt, failure.detail, failure.kind
                    );
                    return TransferOutcome::failed(candidate, failure.kind, failure.detail, attempt);
                }
            }
        }
    }

    async fn fetch_and_store(
        &self,
        candidate: &DocumentCandidate,
        key: &str,
    ) -> std::result::Result<String, UnitFailure> {
        let response = self
            .client
            .get(&candidate.resolved_url)
            .send()
            .await
            .map_err(UnitFailure::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(UnitFailure::new(
                ErrorKind::TransferTransientError,
                format!("HTTP {}", status),
            ));
        }
        if !status.is_success() {
            return Err(UnitFailure::new(
                ErrorKind::TransferClientError,
                format!("HTTP {}", status),
            ));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type)
            .filter(|ct| !ct.is_empty());

        let body = response.bytes().await.map_err(UnitFailure::from_reqwest)?;

        check_document_body(&candidate.resolved_url, declared.as_deref(), &body)?;

        let content_type = resolve_content_type(declared, &candidate.suggested_name);
        self.store
            .put(&self.destination.bucket, key, body.to_vec(), &content_type)
            .await
            .map_err(|e| UnitFailure::new(e.kind(), e.to_string()))?;

        Ok(content_type)
    }
}

/// `text/html; charset=utf-8` -> `text/html`
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Header type when it says something useful, otherwise inferred from the
/// file name.
pub fn resolve_content_type(declared: Option<String>, name: &str) -> String {
    match declared {
        Some(ct) if ct != "application/octet-stream" && ct != "binary/octet-stream" => ct,
        _ => mime_guess::from_path(name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

/// Rejects bodies that are clearly not the document that was asked for,
/// such as login pages served with a 200. PDF magic is only required when
/// the server says PDF, or says nothing useful about a `.pdf` URL.
fn check_document_body(
    url: &str,
    declared: Option<&str>,
    body: &[u8],
) -> std::result::Result<(), UnitFailure> {
    if body.is_empty() {
        return Err(UnitFailure::new(ErrorKind::TransferClientError, "empty response body"));
    }
    if declared.is_some_and(|ct| ct == "text/html" || ct == "application/xhtml+xml") {
        return Err(UnitFailure::new(
            ErrorKind::TransferClientError,
            "received an HTML page instead of a document",
        ));
    }
    let expects_pdf = match declared {
        Some("application/pdf") => true,
        None | Some("application/octet-stream") | Some("binary/octet-stream") => url_names_pdf(url),
        Some(_) => false,
    };
    if expects_pdf && !body.starts_with(b"%PDF") {
        return Err(UnitFailure::new(
            ErrorKind::TransferClientError,
            "content is not a PDF file",
        ));
    }
    Ok(())
}

fn url_names_pdf(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".pdf"),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .is_some_and(|path| path.to_ascii_lowercase().ends_with(".pdf")),
    }
}
