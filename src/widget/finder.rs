//! Search and assistant flows against the backend

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{error, info, instrument};

use super::markers::MapView;
use super::presenter::Presenter;
use super::render::ResultsView;
use super::sequence::{ResponseOrdering, SearchSequencer};
use crate::models::{ClinicRecord, SearchQuery};
use crate::{CareMapError, Result, search};

pub const ASSISTANT_FALLBACK: &str = "Sorry, I couldn’t understand that.";
pub const ASSISTANT_FAILED: &str = "❌ AI assistant failed to respond.";

/// Where the full clinic list comes from
#[async_trait]
pub trait ClinicSource: Send + Sync {
    async fn fetch_clinics(&self) -> Result<Vec<ClinicRecord>>;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("CareMap/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CareMapError::config(format!("Failed to create HTTP client: {e}")))
}

/// `GET <base>/api/clinics`
pub struct HttpClinicSource {
    client: reqwest::Client,
    url: String,
}

impl HttpClinicSource {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: format!("{}/api/clinics", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ClinicSource for HttpClinicSource {
    async fn fetch_clinics(&self) -> Result<Vec<ClinicRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CareMapError::upstream(format!("Failed to fetch clinics: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| CareMapError::upstream(format!("Invalid clinic list: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: Option<String>,
}

/// `POST <base>/ask`
pub struct HttpAssistantClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAssistantClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: format!("{}/ask", base_url.trim_end_matches('/')),
        })
    }

    /// Text to show for `prompt`. Never fails.
    #[instrument(skip(self, prompt))]
    pub async fn ask(&self, prompt: &str) -> String {
        match self.request(prompt).await {
            Ok(Some(answer)) if !answer.is_empty() => answer,
            Ok(_) => ASSISTANT_FALLBACK.to_string(),
            Err(e) => {
                error!("AI error: {}", e);
                ASSISTANT_FAILED.to_string()
            }
        }
    }

    async fn request(&self, prompt: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| CareMapError::upstream(e.to_string()))?;
        let body: AskResponse = response
            .json()
            .await
            .map_err(|e| CareMapError::upstream(e.to_string()))?;
        Ok(body.answer)
    }
}

/// Result of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Applied(ResultsView),
    /// A newer search had already been applied
    Discarded,
}

/// Ties a clinic source, the search engine and a presenter together.
pub struct ClinicFinder<M, S> {
    source: S,
    presenter: AsyncMutex<Presenter<M>>,
    sequencer: AsyncMutex<SearchSequencer>,
    assistant: Option<HttpAssistantClient>,
}

impl<M, S> ClinicFinder<M, S>
where
    M: MapView + Send,
    S: ClinicSource,
{
    pub fn new(view: M, source: S) -> Self {
        Self::with_ordering(view, source, ResponseOrdering::default())
    }

    pub fn with_ordering(view: M, source: S, ordering: ResponseOrdering) -> Self {
        Self {
            source,
            presenter: AsyncMutex::new(Presenter::new(view)),
            sequencer: AsyncMutex::new(SearchSequencer::new(ordering)),
            assistant: None,
        }
    }

    #[must_use]
    pub fn with_assistant(mut self, assistant: HttpAssistantClient) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub async fn presenter(&self) -> MutexGuard<'_, Presenter<M>> {
        self.presenter.lock().await
    }

    /// Fetch the list, filter it and hand the results to the presenter.
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        let ticket = self.sequencer.lock().await.issue();

        let fetched = self.source.fetch_clinics().await;

        // Held until the view is updated so accepted responses render in
        // acceptance order.
        let mut sequencer = self.sequencer.lock().await;
        if !sequencer.accept(ticket) {
            info!("Discarding stale results for search #{}", ticket.sequence());
            return SearchOutcome::Discarded;
        }

        let mut presenter = self.presenter.lock().await;
        let view = match fetched {
            Ok(clinics) => presenter.display(&search::search_owned(&clinics, query)),
            Err(e) => {
                error!("❌ Failed to fetch clinics: {}", e);
                presenter.display_error()
            }
        };
        SearchOutcome::Applied(view)
    }

    /// Ask the assistant. Blank prompts are not sent.
    pub async fn ask(&self, prompt: &str) -> Option<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        match &self.assistant {
            Some(assistant) => Some(assistant.ask(prompt).await),
            None => Some(ASSISTANT_FAILED.to_string()),
        }
    }
}
