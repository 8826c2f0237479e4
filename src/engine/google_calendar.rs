use std::time::Instant;

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::engine::calendar::{CalendarSyncAdapter, EventSpec};
use crate::engine::google_oauth::{exchange_refresh_token, AccessToken, GoogleCredentials};
use crate::error::AppError;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

// ============================================================================
// Helper
// ============================================================================

fn calendar_err(e: impl std::fmt::Display) -> AppError {
    AppError::Calendar(e.to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct EventBody<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: EventDateTime,
    end: EventDateTime,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

fn event_body<'a>(spec: &'a EventSpec, time_zone: &str) -> EventBody<'a> {
    let start = NaiveDateTime::new(spec.date, spec.time);
    let end = start + ChronoDuration::minutes(i64::from(spec.duration_minutes));
    let fmt = |dt: NaiveDateTime| EventDateTime {
        date_time: dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        time_zone: time_zone.to_string(),
    };
    EventBody {
        summary: &spec.title,
        description: spec.description.as_deref(),
        start: fmt(start),
        end: fmt(end),
    }
}

// ============================================================================
// GoogleCalendarClient
// ============================================================================

/// Google Calendar REST v3 adapter. Keeps one access token in memory and
/// refreshes it on demand.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    events_url: String,
    time_zone: String,
    credentials: GoogleCredentials,
    token: Mutex<Option<AccessToken>>,
}

impl GoogleCalendarClient {
    pub fn new(
        calendar_id: &str,
        time_zone: String,
        credentials: GoogleCredentials,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(calendar_err)?;

        Ok(Self {
            http,
            events_url: format!(
                "{}/calendars/{}/events",
                API_BASE,
                urlencoding::encode(calendar_id)
            ),
            time_zone,
            credentials,
            token: Mutex::new(None),
        })
    }

    // --------------------------------------------------------------------
    // Private HTTP helpers
    // --------------------------------------------------------------------

    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.token.clone());
        }
        let fresh = exchange_refresh_token(&self.http, &self.credentials).await?;
        let value = fresh.token.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn authed(&self, method: reqwest::Method, url: String) -> Result<reqwest::RequestBuilder, AppError> {
        let token = self.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url, urlencoding::encode(event_id))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        let resp = req.send().await.map_err(calendar_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Google Calendar API error ({}): {}",
                status, body
            )));
        }
        resp.json().await.map_err(calendar_err)
    }

    async fn send_ok(&self, req: reqwest::RequestBuilder) -> Result<(), AppError> {
        let resp = req.send().await.map_err(calendar_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Google Calendar API error ({}): {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CalendarSyncAdapter for GoogleCalendarClient {
    /// `POST /calendars/{id}/events`
    async fn create_event(&self, spec: &EventSpec) -> Result<String, AppError> {
        let req = self
            .authed(reqwest::Method::POST, self.events_url.clone())
            .await?
            .json(&event_body(spec, &self.time_zone));
        let created: CreatedEvent = self.send_json(req).await?;
        Ok(created.id)
    }

    /// `PATCH /calendars/{id}/events/{event_id}`
    async fn update_event(&self, event_id: &str, spec: &EventSpec) -> Result<(), AppError> {
        let req = self
            .authed(reqwest::Method::PATCH, self.event_url(event_id))
            .await?
            .json(&event_body(spec, &self.time_zone));
        self.send_ok(req).await
    }

    /// `DELETE /calendars/{id}/events/{event_id}`. 404 and 410 mean the
    /// event is already gone.
    async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        let req = self
            .authed(reqwest::Method::DELETE, self.event_url(event_id))
            .await?;
        let resp = req.send().await.map_err(calendar_err)?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AppError::Calendar(format!(
            "Google Calendar API error ({}): {}",
            status, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn creds() -> GoogleCredentials {
        GoogleCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        }
    }

    #[test]
    fn test_event_body_spans_duration() {
        let spec = EventSpec {
            title: "Bill due: Rent".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            time: NaiveTime::from_hms_opt(23, 45, 0).unwrap(),
            duration_minutes: 30,
        };
        let body = event_body(&spec, "Europe/Prague");
        assert_eq!(body.start.date_time, "2024-12-31T23:45:00");
        assert_eq!(body.end.date_time, "2025-01-01T00:15:00");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["start"]["timeZone"], "Europe/Prague");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_urls_are_encoded() {
        let client =
            GoogleCalendarClient::new("family#team@group.calendar.google.com", "UTC".into(), creds())
                .unwrap();
        assert_eq!(
            client.events_url,
            "https://www.googleapis.com/calendar/v3/calendars/family%23team%40group.calendar.google.com/events"
        );
        assert!(client.event_url("abc/def").ends_with("/events/abc%2Fdef"));
    }
}
