// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, warn};
use obra_app::{
    Company, CompanyId, Estimate, EstimateId, EstimateStatus, LineItem, LineItemId, User, UserId,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

/// Insert payload for a new estimate. The aggregate total arrives
/// precomputed from the orchestrator; the store never derives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEstimate {
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    pub status: EstimateStatus,
    pub line_items: Vec<LineItem>,
    pub total_amount_cents: i64,
}

/// Full replace of an estimate's mutable fields. There is deliberately no
/// company field here: ownership is fixed at insert and an update cannot
/// write it, under any key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEstimate {
    pub name: String,
    pub description: String,
    pub status: EstimateStatus,
    pub line_items: Vec<LineItem>,
    pub total_amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    access_token: String,
    user: User,
}

/// Thin blocking client for the hosted backend: a PostgREST-style rows API
/// under `/rest/v1` and a token/user auth API under `/auth/v1`. Construct
/// one at startup and pass it to whatever orchestrates persistence.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    anon_key: String,
    timeout: Duration,
    http: HttpClient,
    session: Option<Session>,
}

impl Client {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        validate_base_url(&base_url)?;
        if anon_key.trim().is_empty() {
            bail!("backend.anon_key must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            anon_key: anon_key.to_owned(),
            timeout,
            http,
            session: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_user(&self) -> Option<&User> {
        self.session.as_ref().map(|session| &session.user)
    }

    /// Cheap reachability probe for `--check` style startup validation.
    pub fn health(&self) -> Result<()> {
        let url = self.auth_url("health")?;
        self.send(self.http.get(url).header("apikey", self.anon_key.as_str()), "health check")?;
        Ok(())
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<User> {
        let mut url = self.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self.send(
            self.http
                .post(url)
                .header("apikey", self.anon_key.as_str())
                .json(&SignInRequest { email, password }),
            "sign in",
        )?;
        let token: TokenResponse = response.json().context("decode sign-in response")?;
        let user = token.user.into_user();
        self.session = Some(Session {
            access_token: token.access_token,
            user: user.clone(),
        });
        Ok(user)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Ok(());
        }
        let url = self.auth_url("logout")?;
        self.send(self.auth_request(self.http.post(url)), "sign out")?;
        self.session = None;
        Ok(())
    }

    /// Returns the server's view of the signed-in user, or `None` when
    /// there is no session or the token is no longer accepted.
    pub fn current_user(&self) -> Result<Option<User>> {
        if self.session.is_none() {
            return Ok(None);
        }

        let url = self.auth_url("user")?;
        let response = self
            .auth_request(self.http.get(url))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let response = check_status(response, "load current user")?;
        let row: UserRow = response.json().context("decode current user")?;
        Ok(Some(row.into_user()))
    }

    pub fn update_email(&mut self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            bail!("email must not be empty");
        }
        let url = self.auth_url("user")?;
        let response = self.send(
            self.auth_request(self.http.put(url)).json(&UserUpdateRequest {
                email: Some(email),
                password: None,
            }),
            "update email",
        )?;
        let row: UserRow = response.json().context("decode updated user")?;
        if let Some(session) = &mut self.session {
            session.user = row.into_user();
        }
        Ok(())
    }

    pub fn update_password(&self, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            bail!("new password must not be empty");
        }
        let url = self.auth_url("user")?;
        self.send(
            self.auth_request(self.http.put(url)).json(&UserUpdateRequest {
                email: None,
                password: Some(new_password),
            }),
            "update password",
        )?;
        Ok(())
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let mut url = self.rows_url("companies")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "name.asc");

        let response = self.send(self.data_request(self.http.get(url)), "list companies")?;
        let rows: Vec<CompanyRow> = response.json().context("decode companies")?;
        rows.into_iter().map(CompanyRow::into_company).collect()
    }

    pub fn get_company(&self, company_id: &CompanyId) -> Result<Option<Company>> {
        let mut url = self.rows_url("companies")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{company_id}"))
            .append_pair("limit", "1");

        let response = self.send(self.data_request(self.http.get(url)), "load company")?;
        let mut rows: Vec<CompanyRow> = response.json().context("decode company")?;
        rows.pop().map(CompanyRow::into_company).transpose()
    }

    /// All estimates for one company, most recently created first. The
    /// ordering is applied by the store so the cached projection can be
    /// rendered as-is.
    pub fn list_estimates(&self, company_id: &CompanyId) -> Result<Vec<Estimate>> {
        let mut url = self.rows_url("estimates")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("company_id", &format!("eq.{company_id}"))
            .append_pair("order", "created_at.desc");

        let response = self.send(self.data_request(self.http.get(url)), "list estimates")?;
        let rows: Vec<EstimateRow> = response.json().context("decode estimates")?;
        rows.into_iter().map(EstimateRow::into_estimate).collect()
    }

    pub fn get_estimate(&self, estimate_id: &EstimateId) -> Result<Option<Estimate>> {
        let mut url = self.rows_url("estimates")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{estimate_id}"))
            .append_pair("limit", "1");

        let response = self.send(self.data_request(self.http.get(url)), "load estimate")?;
        let mut rows: Vec<EstimateRow> = response.json().context("decode estimate")?;
        rows.pop().map(EstimateRow::into_estimate).transpose()
    }

    /// Single atomic insert; the created row comes back in the same call,
    /// so either the whole estimate exists afterwards or nothing does.
    pub fn create_estimate(&self, new_estimate: &NewEstimate) -> Result<EstimateId> {
        let url = self.rows_url("estimates")?;
        let body = [EstimateInsertRow::from_new(new_estimate)];
        let response = self.send(
            self.data_request(self.http.post(url))
                .header("Prefer", "return=representation")
                .json(&body),
            "insert estimate",
        )?;
        let mut rows: Vec<EstimateRow> = response.json().context("decode inserted estimate")?;
        let row = rows
            .pop()
            .ok_or_else(|| anyhow!("insert returned no estimate row"))?;
        Ok(EstimateId::new(row.id))
    }

    pub fn update_estimate(&self, estimate_id: &EstimateId, update: &UpdateEstimate) -> Result<()> {
        let mut url = self.rows_url("estimates")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{estimate_id}"));

        let response = self.send(
            self.data_request(self.http.patch(url))
                .header("Prefer", "return=representation")
                .json(&EstimatePatchRow::from_update(update)),
            "update estimate",
        )?;
        let rows: Vec<serde_json::Value> = response.json().context("decode updated estimate")?;
        if rows.is_empty() {
            bail!("estimate {estimate_id} not found -- refresh the estimates list and retry");
        }
        Ok(())
    }

    pub fn delete_estimate(&self, estimate_id: &EstimateId) -> Result<()> {
        let mut url = self.rows_url("estimates")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{estimate_id}"));

        let response = self.send(
            self.data_request(self.http.delete(url))
                .header("Prefer", "return=representation"),
            "delete estimate",
        )?;
        let rows: Vec<serde_json::Value> = response.json().context("decode deleted estimate")?;
        if rows.is_empty() {
            bail!("estimate {estimate_id} not found -- refresh the estimates list and retry");
        }
        Ok(())
    }

    fn auth_url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/auth/v1/{path}", self.base_url))
            .with_context(|| format!("build auth url for {path}"))
    }

    fn rows_url(&self, table: &str) -> Result<Url> {
        Url::parse(&format!("{}/rest/v1/{table}", self.base_url))
            .with_context(|| format!("build data url for {table}"))
    }

    fn bearer(&self) -> &str {
        self.session
            .as_ref()
            .map_or(self.anon_key.as_str(), |session| {
                session.access_token.as_str()
            })
    }

    fn data_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(self.bearer())
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        self.data_request(request)
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        debug!("{what}");
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        check_status(response, what)
    }
}

pub fn validate_base_url(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        bail!("backend.base_url must not be empty");
    }
    let parsed = Url::parse(raw).with_context(|| format!("invalid backend.base_url {raw:?}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!(
            "backend.base_url {raw:?} must use http or https, got {:?}",
            parsed.scheme()
        );
    }
    Ok(())
}

fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        warn!("{what} failed with status {}", status.as_u16());
        return Err(clean_error_response(status, &body));
    }
    Ok(response)
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach {base_url} -- check [backend].base_url and your network ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        for message in [
            parsed.message,
            parsed.error_description,
            parsed.msg,
            parsed.error,
        ]
        .into_iter()
        .flatten()
        {
            if !message.is_empty() {
                return anyhow!("server error ({}): {}", status.as_u16(), message);
            }
        }
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("parse timestamp {raw:?}"))
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserRow,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: String,
    email: String,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: UserId::new(self.id),
            email: self.email,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserUpdateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompanyRow {
    id: String,
    name: String,
    address: String,
    phone: String,
    email: String,
    website: String,
    sales_tax_rate: f64,
    created_at: String,
}

impl CompanyRow {
    fn into_company(self) -> Result<Company> {
        Ok(Company {
            id: CompanyId::new(self.id),
            name: self.name,
            address: self.address,
            phone: self.phone,
            email: self.email,
            website: self.website,
            sales_tax_rate: self.sales_tax_rate,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LineItemRow {
    id: String,
    description: String,
    quantity: i64,
    unit_price_cents: i64,
    total_cents: i64,
}

impl LineItemRow {
    fn from_line_item(item: &LineItem) -> Self {
        Self {
            id: item.id.to_string(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            total_cents: item.total_cents,
        }
    }

    fn into_line_item(self) -> LineItem {
        LineItem {
            id: LineItemId::new(self.id),
            description: self.description,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            total_cents: self.total_cents,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EstimateRow {
    id: String,
    company_id: String,
    name: String,
    description: String,
    status: String,
    line_items: Vec<LineItemRow>,
    total_amount_cents: i64,
    created_at: String,
    updated_at: String,
}

impl EstimateRow {
    fn into_estimate(self) -> Result<Estimate> {
        let status = EstimateStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("unknown estimate status {:?} in row {}", self.status, self.id))?;
        Ok(Estimate {
            id: EstimateId::new(self.id),
            company_id: CompanyId::new(self.company_id),
            name: self.name,
            description: self.description,
            status,
            line_items: self
                .line_items
                .into_iter()
                .map(LineItemRow::into_line_item)
                .collect(),
            total_amount_cents: self.total_amount_cents,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct EstimateInsertRow<'a> {
    company_id: &'a str,
    name: &'a str,
    description: &'a str,
    status: &'a str,
    line_items: Vec<LineItemRow>,
    total_amount_cents: i64,
}

impl<'a> EstimateInsertRow<'a> {
    fn from_new(new_estimate: &'a NewEstimate) -> Self {
        Self {
            company_id: new_estimate.company_id.as_str(),
            name: &new_estimate.name,
            description: &new_estimate.description,
            status: new_estimate.status.as_str(),
            line_items: new_estimate
                .line_items
                .iter()
                .map(LineItemRow::from_line_item)
                .collect(),
            total_amount_cents: new_estimate.total_amount_cents,
        }
    }
}

#[derive(Debug, Serialize)]
struct EstimatePatchRow<'a> {
    name: &'a str,
    description: &'a str,
    status: &'a str,
    line_items: Vec<LineItemRow>,
    total_amount_cents: i64,
}

impl<'a> EstimatePatchRow<'a> {
    fn from_update(update: &'a UpdateEstimate) -> Self {
        Self {
            name: &update.name,
            description: &update.description,
            status: update.status.as_str(),
            line_items: update
                .line_items
                .iter()
                .map(LineItemRow::from_line_item)
                .collect(),
            total_amount_cents: update.total_amount_cents,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    message: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{
        Client, EstimateInsertRow, EstimatePatchRow, NewEstimate, UpdateEstimate,
        clean_error_response, parse_datetime, validate_base_url,
    };
    use obra_app::{CompanyId, EstimateStatus, LineItem, LineItemId};
    use reqwest::StatusCode;
    use std::time::Duration;

    fn line_item(quantity: i64, unit_price_cents: i64) -> LineItem {
        LineItem {
            id: LineItemId::new("li-1"),
            description: "Lumber".to_owned(),
            quantity,
            unit_price_cents,
            total_cents: quantity * unit_price_cents,
        }
    }

    #[test]
    fn client_rejects_blank_key_and_bad_urls() {
        assert!(Client::new("http://localhost:54321", "", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://localhost", "key", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", "key", Duration::from_secs(1)).is_err());
        assert!(Client::new("http://localhost:54321/", "key", Duration::from_secs(1)).is_ok());
        assert!(validate_base_url("https://project.example.co").is_ok());
    }

    #[test]
    fn insert_row_carries_company_ownership() {
        let new_estimate = NewEstimate {
            company_id: CompanyId::new("co-7"),
            name: "Fence".to_owned(),
            description: String::new(),
            status: EstimateStatus::Draft,
            line_items: vec![line_item(3, 1050)],
            total_amount_cents: 3150,
        };
        let encoded = serde_json::to_value(EstimateInsertRow::from_new(&new_estimate))
            .expect("serialize insert row");
        assert_eq!(encoded["company_id"], "co-7");
        assert_eq!(encoded["status"], "draft");
        assert_eq!(encoded["total_amount_cents"], 3150);
        assert_eq!(encoded["line_items"][0]["total_cents"], 3150);
    }

    #[test]
    fn patch_row_cannot_write_company_ownership() {
        let update = UpdateEstimate {
            name: "Fence".to_owned(),
            description: String::new(),
            status: EstimateStatus::Sent,
            line_items: vec![line_item(5, 1000)],
            total_amount_cents: 5000,
        };
        let encoded = serde_json::to_value(EstimatePatchRow::from_update(&update))
            .expect("serialize patch row");
        let keys: Vec<&String> = encoded
            .as_object()
            .expect("patch row is an object")
            .keys()
            .collect();
        assert!(!keys.iter().any(|key| key.contains("company")));
        assert_eq!(encoded["status"], "sent");
    }

    #[test]
    fn error_responses_surface_the_server_message() {
        let postgrest = clean_error_response(
            StatusCode::CONFLICT,
            r#"{"message":"duplicate key value violates unique constraint"}"#,
        );
        assert!(postgrest.to_string().contains("duplicate key"));

        let gotrue = clean_error_response(
            StatusCode::BAD_REQUEST,
            r#"{"error_description":"Invalid login credentials"}"#,
        );
        assert!(gotrue.to_string().contains("Invalid login credentials"));

        let plain = clean_error_response(StatusCode::BAD_GATEWAY, "upstream timed out");
        assert!(plain.to_string().contains("upstream timed out"));

        let opaque = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(opaque.to_string(), "server returned 500");
    }

    #[test]
    fn timestamps_parse_with_fractional_seconds_and_offsets() {
        assert!(parse_datetime("2026-03-01T09:30:00Z").is_ok());
        assert!(parse_datetime("2026-03-01T09:30:00.123456+00:00").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }
}
