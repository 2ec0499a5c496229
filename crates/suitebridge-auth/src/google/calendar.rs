//! Google Calendar API client.
//!
//! Fetches the events of one calendar inside a window and reduces them to
//! busy intervals.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use suitebridge_core::{BusyInterval, EventTime, TimeWindow};

use crate::error::{AuthError, AuthResult};

use super::config::GoogleConfig;

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Page size requested from events.list.
const PAGE_SIZE: usize = 250;

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendar {
    http_client: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new(config: &GoogleConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                AuthError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;
        Ok(Self { http_client })
    }

    /// Lists busy intervals overlapping `window`, in start order.
    ///
    /// `authorization` is the full `Authorization` header value. Recurring
    /// events are expanded server-side.
    pub async fn list_busy_intervals(
        &self,
        authorization: &str,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> AuthResult<Vec<BusyInterval>> {
        let mut busy = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(authorization, calendar_id, window, page_token.as_deref())
                .await?;

            busy.extend(page.items.into_iter().filter_map(ApiEvent::into_busy));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            "fetched {} busy intervals from calendar {}",
            busy.len(),
            calendar_id
        );
        Ok(busy)
    }

    async fn list_events_page(
        &self,
        authorization: &str,
        calendar_id: &str,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> AuthResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::network("request timeout")
            } else if e.is_connect() {
                AuthError::network(format!("connection failed: {}", e))
            } else {
                AuthError::network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(rate_limit_error(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::network(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| AuthError::invalid_response(format!("failed to parse response: {}", e)))
    }
}

fn rate_limit_error(retry_after: Option<u64>) -> AuthError {
    AuthError::rate_limited(format!(
        "rate limit exceeded{}",
        retry_after
            .map(|s| format!(", retry after {} seconds", s))
            .unwrap_or_default()
    ))
}

/// Maps a non-2xx, non-429 calendar status to an error.
fn status_error(status: reqwest::StatusCode, body: &str) -> AuthError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED => {
            AuthError::authentication("access token expired or invalid")
        }
        reqwest::StatusCode::FORBIDDEN => AuthError::authentication("access denied to calendar"),
        _ => AuthError::server(format!("API error ({}): {}", status, body)),
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    /// `"transparent"` when the event is marked "show as available".
    transparency: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

impl ApiEvent {
    /// Converts to a busy interval, dropping events that do not block time.
    fn into_busy(self) -> Option<BusyInterval> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }
        if self.transparency.as_deref() == Some("transparent") {
            return None;
        }

        let id = self.id.as_deref().unwrap_or("<unknown>");
        let start = self.start.as_ref().and_then(|t| t.parse(id, "start"))?;
        let end = self.end.as_ref().and_then(|t| t.parse(id, "end"))?;
        Some(BusyInterval::new(start, end))
    }
}

impl ApiEventTime {
    fn parse(&self, id: &str, which: &str) -> Option<EventTime> {
        match (&self.date_time, &self.date) {
            (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
                .map(|parsed| EventTime::from_utc(parsed.with_timezone(&Utc)))
                .map_err(|e| warn!("event {}: failed to parse {} time: {}", id, which, e))
                .ok(),
            (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(EventTime::from_date)
                .map_err(|e| warn!("event {}: failed to parse {} date: {}", id, which, e))
                .ok(),
            (None, None) => {
                warn!("event {} has no {} time", id, which);
                None
            }
        }
    }
}
