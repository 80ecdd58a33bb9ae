//! HTTP calendar provider client.
//!
//! Speaks the Google-Calendar-style events API: window fetches with
//! `timeMin`/`timeMax`, incremental fetches with `syncToken`, pagination via
//! `pageToken`. A `410 GONE` on an incremental fetch means the delta token
//! expired and is reported as `full_resync_required`, not as an error.

use async_trait::async_trait;
use hourmark_domain::{
    Calendar, DateRange, FetchResult, HourmarkError, IncrementalFetchResult, ProviderConfig,
    ProviderEvent, Result,
};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use super::types::EventsPageDto;
use crate::errors::InfraError;

/// REST client implementing [`hourmark_core::CalendarProvider`]
pub struct HttpCalendarProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpCalendarProvider {
    /// Create a provider client.
    ///
    /// # Errors
    /// Returns `Config` when the HTTP client cannot be constructed.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| HourmarkError::Config(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn events_url(&self, provider_calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.base_url.trim_end_matches('/'),
            provider_calendar_id
        )
    }

    /// Fetch every page of a listing; returns events plus the final sync
    /// token.
    async fn fetch_pages(
        &self,
        calendar: &Calendar,
        base_params: &[(&str, String)],
    ) -> Result<(Vec<ProviderEvent>, Option<String>)> {
        let url = self.events_url(&calendar.provider_calendar_id);
        let mut events = Vec::new();
        let mut sync_token = None;
        let mut page_token: Option<String> = None;

        loop {
            let mut params = base_params.to_vec();
            params.push(("maxResults", self.config.page_size.to_string()));
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let mut request = self.client.get(&url).query(&params);
            if let Some(token) = &self.config.bearer_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(InfraError::from)?;
            let status = response.status();
            if status == StatusCode::GONE {
                return Err(HourmarkError::Provider {
                    transient: false,
                    message: "sync token expired (410 GONE)".to_string(),
                });
            }
            if !status.is_success() {
                return Err(status_error(status));
            }

            let page: EventsPageDto = response.json().await.map_err(InfraError::from)?;
            sync_token = page.next_sync_token.or(sync_token);
            page_token = page.next_page_token;

            for dto in page.items {
                match dto.into_provider_event() {
                    Ok(event) => events.push(event),
                    Err(e) => {
                        // One malformed event must not sink the whole page
                        warn!(error = %e, "skipping malformed provider event");
                    }
                }
            }

            if page_token.is_none() {
                break;
            }
        }

        debug!(
            calendar_id = %calendar.id,
            count = events.len(),
            has_sync_token = sync_token.is_some(),
            "fetched provider events"
        );
        Ok((events, sync_token))
    }
}

fn status_error(status: StatusCode) -> HourmarkError {
    let transient = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
    HourmarkError::Provider {
        transient,
        message: format!("provider returned HTTP {status}"),
    }
}

#[async_trait]
impl hourmark_core::CalendarProvider for HttpCalendarProvider {
    #[instrument(skip(self, calendar), fields(calendar_id = %calendar.id))]
    async fn fetch_events(&self, calendar: &Calendar, range: DateRange) -> Result<FetchResult> {
        let params = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("timeMin", range.start.to_rfc3339()),
            ("timeMax", range.end.to_rfc3339()),
            ("timeZone", "UTC".to_string()),
        ];

        let (events, next_sync_token) = self.fetch_pages(calendar, &params).await?;
        Ok(FetchResult { events, next_sync_token })
    }

    #[instrument(skip(self, calendar, sync_token), fields(calendar_id = %calendar.id))]
    async fn fetch_incremental(
        &self,
        calendar: &Calendar,
        sync_token: &str,
    ) -> Result<IncrementalFetchResult> {
        let params = vec![("syncToken", sync_token.to_string())];

        match self.fetch_pages(calendar, &params).await {
            Ok((events, next_sync_token)) => {
                Ok(IncrementalFetchResult { events, next_sync_token, full_resync_required: false })
            }
            Err(HourmarkError::Provider { transient: false, message })
                if message.contains("410") =>
            {
                warn!(calendar_id = %calendar.id, "sync token invalid; full resync required");
                Ok(IncrementalFetchResult {
                    events: Vec::new(),
                    next_sync_token: None,
                    full_resync_required: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}
