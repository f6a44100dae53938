//! REST client for the booking API.
//!
//! Endpoints:
//! - `/courts`, `/courts/{id}`, `/courts/{id}/bookings`, `/courts/{id}/blocked-times`
//! - `/bookings`, `/bookings/me`, `/bookings/{id}/cancel`, `/bookings/{id}/status`
//! - `/blocked-times/{id}`, `/auth/refresh`
//!
//! Credentials live in an explicit [`Session`]; a 401 triggers one token
//! refresh and a single retry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveTime;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{format_hhmm, parse_calendar_day, parse_time_of_day};
use crate::config::Config;
use crate::model::*;
use crate::observability;
use crate::requests::{BlockWhen, CourtDraft, Decision, NewBlock, NewBooking};
use crate::source::*;

/// Bearer credentials, passed in by whoever logged the user in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            token: Some(token.into()),
            refresh_token,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

// ── Wire records ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourtRecord {
    id: CourtId,
    name: String,
    location: String,
    description: Option<String>,
    open_time: String,
    close_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingRecord {
    id: BookingId,
    court_id: CourtId,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockRecord {
    id: BlockId,
    court_id: CourtId,
    date: Option<String>,
    recurring_day: Option<i64>,
    start_time: Option<String>,
    end_time: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenRecord {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorRecord {
    error: String,
}

trait IntoModel {
    type Model;
    /// Err carries the reason the record was unusable.
    fn into_model(self) -> Result<Self::Model, String>;
}

fn time_field(raw: &str, field: &str) -> Result<NaiveTime, String> {
    parse_time_of_day(raw).ok_or_else(|| format!("bad {field}: {raw:?}"))
}

fn optional_time_field(raw: Option<&str>, field: &str) -> Result<Option<NaiveTime>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => time_field(raw, field).map(Some),
        None => Ok(None),
    }
}

impl IntoModel for CourtRecord {
    type Model = Court;

    fn into_model(self) -> Result<Court, String> {
        Ok(Court {
            id: self.id,
            open_time: time_field(&self.open_time, "openTime")?,
            close_time: time_field(&self.close_time, "closeTime")?,
            name: self.name,
            location: self.location,
            description: self.description,
        })
    }
}

impl IntoModel for BookingRecord {
    type Model = Booking;

    fn into_model(self) -> Result<Booking, String> {
        let status = serde_json::from_value::<BookingStatus>(Value::String(self.status.clone()))
            .map_err(|_| format!("unknown status {:?}", self.status))?;
        Ok(Booking {
            id: self.id,
            court_id: self.court_id,
            date: parse_calendar_day(&self.date).ok_or_else(|| format!("bad date: {:?}", self.date))?,
            start_time: time_field(&self.start_time, "startTime")?,
            end_time: time_field(&self.end_time, "endTime")?,
            status,
            rejection_reason: self.reason,
        })
    }
}

impl IntoModel for BlockRecord {
    type Model = BlockedTime;

    fn into_model(self) -> Result<BlockedTime, String> {
        let date = match self.date.as_deref() {
            Some(raw) => Some(parse_calendar_day(raw).ok_or_else(|| format!("bad date: {raw:?}"))?),
            None => None,
        };
        Ok(BlockedTime {
            id: self.id,
            court_id: self.court_id,
            date,
            // Out-of-range days are kept as unmatched rather than dropped.
            recurring_day: self.recurring_day.map(|d| u8::try_from(d).unwrap_or(u8::MAX)),
            // An unparseable bound must not silently widen into a whole-day block.
            start_time: optional_time_field(self.start_time.as_deref(), "startTime")?,
            end_time: optional_time_field(self.end_time.as_deref(), "endTime")?,
            reason: self.reason.unwrap_or_default(),
        })
    }
}

/// Decode a JSON array record by record, skipping entries that don't parse.
fn decode_list<R>(what: &'static str, values: Vec<Value>) -> Vec<R::Model>
where
    R: IntoModel + DeserializeOwned,
{
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let parsed = serde_json::from_value::<R>(value)
            .map_err(|e| e.to_string())
            .and_then(R::into_model);
        match parsed {
            Ok(model) => out.push(model),
            Err(reason) => warn!("skipping malformed {what} record: {reason}"),
        }
    }
    out
}

fn decode_one<R>(what: &'static str, value: Value) -> Result<R::Model, SourceError>
where
    R: IntoModel + DeserializeOwned,
{
    serde_json::from_value::<R>(value)
        .map_err(|e| e.to_string())
        .and_then(R::into_model)
        .map_err(|reason| SourceError::Decode(format!("{what}: {reason}")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CourtBody<'a> {
    name: &'a str,
    location: &'a str,
    description: Option<&'a str>,
    open_time: String,
    close_time: String,
}

impl<'a> From<&'a CourtDraft> for CourtBody<'a> {
    fn from(d: &'a CourtDraft) -> Self {
        Self {
            name: &d.name,
            location: &d.location,
            description: d.description.as_deref(),
            open_time: format_hhmm(d.open_time),
            close_time: format_hhmm(d.close_time),
        }
    }
}

// ── Client ───────────────────────────────────────────────────────

pub struct HttpBackend {
    client: Client,
    base_url: String,
    session: RwLock<Session>,
}

impl HttpBackend {
    pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: RwLock::new(session),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Self::new(&config.api_url, config.session.clone(), config.timeout)
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, SourceError> {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    /// Send a request, refreshing the session once on 401.
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response, SourceError> {
        let label = method.as_str().to_string();
        let result = self.send_inner(method, path, body.as_ref()).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::counter!(observability::SOURCE_REQUESTS_TOTAL, "method" => label, "outcome" => outcome)
            .increment(1);
        result
    }

    async fn send_inner(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response, SourceError> {
        debug!("{method} {path}");
        let token = self.session.read().await.token.clone();
        let resp = self.send_once(method.clone(), path, body, token.as_deref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }
        let token = self.refresh_session(token.as_deref()).await?;
        let resp = self.send_once(method, path, body, Some(&token)).await?;
        check_status(resp).await
    }

    /// Swap the rejected `stale` token for a fresh one. When another request
    /// already replaced it while we waited for the lock, reuse that token.
    async fn refresh_session(&self, stale: Option<&str>) -> Result<String, SourceError> {
        let mut session = self.session.write().await;
        if let Some(current) = session.token.as_deref()
            && Some(current) != stale
        {
            debug!("session already refreshed by a concurrent request");
            return Ok(current.to_string());
        }
        let Some(refresh_token) = session.refresh_token.clone() else {
            *session = Session::default();
            return Err(SourceError::SessionExpired);
        };
        let resp = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await;
        let token = match resp {
            Ok(resp) if resp.status().is_success() => resp.json::<TokenRecord>().await.ok(),
            _ => None,
        };
        match token {
            Some(TokenRecord { token }) => {
                info!("session token refreshed");
                session.token = Some(token.clone());
                Ok(token)
            }
            None => {
                warn!("token refresh failed, clearing session");
                *session = Session::default();
                Err(SourceError::SessionExpired)
            }
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        Ok(self.send(Method::GET, path, None).await?.json().await?)
    }

    async fn get_list<R>(&self, what: &'static str, path: &str) -> Result<Vec<R::Model>, SourceError>
    where
        R: IntoModel + DeserializeOwned,
    {
        let values: Vec<Value> = self.send(Method::GET, path, None).await?.json().await?;
        Ok(decode_list::<R>(what, values))
    }

    async fn write_one<R>(&self, what: &'static str, method: Method, path: &str, body: Option<Value>) -> Result<R::Model, SourceError>
    where
        R: IntoModel + DeserializeOwned,
    {
        let value: Value = self.send(method, path, body).await?.json().await?;
        decode_one::<R>(what, value)
    }
}

/// Map non-success statuses to errors, reading the server's `{"error": ...}` body.
async fn check_status(resp: Response) -> Result<Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SourceError::SessionExpired);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorRecord>(&text)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(SourceError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CourtSource for HttpBackend {
    async fn courts(&self) -> Result<Vec<Court>, SourceError> {
        self.get_list::<CourtRecord>("court", "/courts").await
    }

    async fn court(&self, id: CourtId) -> Result<Option<Court>, SourceError> {
        match self.get_json(&format!("/courts/{id}")).await {
            Ok(value) => decode_one::<CourtRecord>("court", value).map(Some),
            Err(SourceError::Rejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BookingSource for HttpBackend {
    async fn court_bookings(&self, court_id: CourtId) -> Result<Vec<Booking>, SourceError> {
        self.get_list::<BookingRecord>("booking", &format!("/courts/{court_id}/bookings"))
            .await
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, SourceError> {
        self.get_list::<BookingRecord>("booking", "/bookings/me").await
    }
}

#[async_trait]
impl BlockSource for HttpBackend {
    async fn court_blocks(&self, court_id: CourtId) -> Result<Vec<BlockedTime>, SourceError> {
        self.get_list::<BlockRecord>("blocked time", &format!("/courts/{court_id}/blocked-times"))
            .await
    }
}

#[async_trait]
impl BookingDesk for HttpBackend {
    async fn create_booking(&self, req: NewBooking) -> Result<Booking, SourceError> {
        req.validate()?;
        let body = json!({
            "courtId": req.court_id,
            "date": req.date.format("%Y-%m-%d").to_string(),
            "startTime": format_hhmm(req.start_time),
            "endTime": format_hhmm(req.end_time),
        });
        self.write_one::<BookingRecord>("booking", Method::POST, "/bookings", Some(body))
            .await
    }

    async fn cancel_booking(&self, id: BookingId) -> Result<Booking, SourceError> {
        self.write_one::<BookingRecord>("booking", Method::PATCH, &format!("/bookings/{id}/cancel"), None)
            .await
    }

    async fn decide_booking(&self, id: BookingId, decision: Decision) -> Result<Booking, SourceError> {
        decision.validate()?;
        let mut body = json!({ "status": decision.status() });
        if let Some(reason) = decision.reason() {
            body["reason"] = json!(reason);
        }
        self.write_one::<BookingRecord>("booking", Method::PATCH, &format!("/bookings/{id}/status"), Some(body))
            .await
    }

    async fn create_court(&self, draft: CourtDraft) -> Result<Court, SourceError> {
        draft.validate()?;
        let body = serde_json::to_value(CourtBody::from(&draft)).map_err(|e| SourceError::Decode(e.to_string()))?;
        self.write_one::<CourtRecord>("court", Method::POST, "/courts", Some(body))
            .await
    }

    async fn update_court(&self, id: CourtId, draft: CourtDraft) -> Result<Court, SourceError> {
        draft.validate()?;
        let body = serde_json::to_value(CourtBody::from(&draft)).map_err(|e| SourceError::Decode(e.to_string()))?;
        self.write_one::<CourtRecord>("court", Method::PATCH, &format!("/courts/{id}"), Some(body))
            .await
    }

    async fn delete_court(&self, id: CourtId) -> Result<(), SourceError> {
        self.send(Method::DELETE, &format!("/courts/{id}"), None).await?;
        Ok(())
    }

    async fn create_block(&self, req: NewBlock) -> Result<BlockedTime, SourceError> {
        req.validate()?;
        let (date, recurring_day) = match req.when {
            BlockWhen::OnDate(d) => (Some(d.format("%Y-%m-%d").to_string()), None),
            BlockWhen::Weekly(day) => (None, Some(day)),
        };
        let body = json!({
            "courtId": req.court_id,
            "date": date,
            "recurringDay": recurring_day,
            "startTime": req.start_time.map(format_hhmm),
            "endTime": req.end_time.map(format_hhmm),
            "reason": req.reason,
        });
        let path = format!("/courts/{}/blocked-times", req.court_id);
        self.write_one::<BlockRecord>("blocked time", Method::POST, &path, Some(body))
            .await
    }

    async fn delete_block(&self, id: BlockId) -> Result<(), SourceError> {
        self.send(Method::DELETE, &format!("/blocked-times/{id}"), None).await?;
        Ok(())
    }
}
