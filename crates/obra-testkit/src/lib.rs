// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Test harness for code that talks to the hosted backend: a scripted
//! HTTP server that answers a fixed sequence of requests and records what
//! it was asked, plus JSON fixture builders for the backend's row shapes.

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub status: u16,
    pub body: String,
}

impl ScriptedResponse {
    pub fn ok(body: &Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn created(body: &Value) -> Self {
        Self {
            status: 201,
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// One request as the mock server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("request body is not JSON: {:?}", self.body))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A mock backend that serves a fixed script of responses, one per
/// incoming request, then shuts down. `join` blocks until every scripted
/// response has been served and hands back the recorded requests for
/// assertions on methods, query strings, and bodies.
pub struct MockBackend {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn serve(script: Vec<ScriptedResponse>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock backend: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for scripted in script {
                let Ok(mut request) = server.recv() else {
                    return;
                };

                let headers = request
                    .headers()
                    .iter()
                    .map(|header| (header.field.to_string(), header.value.to_string()))
                    .collect();
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                if let Ok(mut log) = recorded.lock() {
                    log.push(RecordedRequest {
                        method: request.method().to_string(),
                        url: request.url().to_owned(),
                        headers,
                        body,
                    });
                }

                let content_type = Header::from_bytes("Content-Type", "application/json")
                    .expect("valid content type header");
                let response = Response::from_string(scripted.body)
                    .with_status_code(scripted.status)
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });

        Ok(Self {
            base_url,
            requests,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for the whole script to be consumed and returns the recorded
    /// requests in arrival order.
    pub fn join(mut self) -> Result<Vec<RecordedRequest>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("mock backend thread panicked"))?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|_| anyhow!("request log poisoned"))?;
        Ok(requests.clone())
    }
}

pub fn token_response_json(access_token: &str, user_id: &str, email: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "user": user_row_json(user_id, email),
    })
}

pub fn user_row_json(user_id: &str, email: &str) -> Value {
    json!({ "id": user_id, "email": email })
}

pub fn company_row_json(company_id: &str, name: &str) -> Value {
    json!({
        "id": company_id,
        "name": name,
        "address": "100 Jobsite Rd",
        "phone": "555-0100",
        "email": "office@example.com",
        "website": "https://example.com",
        "sales_tax_rate": 0.0825,
        "created_at": "2026-01-05T08:00:00Z",
    })
}

pub fn line_item_row_json(
    item_id: &str,
    description: &str,
    quantity: i64,
    unit_price_cents: i64,
) -> Value {
    json!({
        "id": item_id,
        "description": description,
        "quantity": quantity,
        "unit_price_cents": unit_price_cents,
        "total_cents": quantity * unit_price_cents,
    })
}

pub fn estimate_row_json(
    estimate_id: &str,
    company_id: &str,
    name: &str,
    status: &str,
    line_items: Value,
    total_amount_cents: i64,
    created_at: &str,
) -> Value {
    json!({
        "id": estimate_id,
        "company_id": company_id,
        "name": name,
        "description": "",
        "status": status,
        "line_items": line_items,
        "total_amount_cents": total_amount_cents,
        "created_at": created_at,
        "updated_at": created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::{estimate_row_json, line_item_row_json};
    use serde_json::json;

    #[test]
    fn estimate_fixture_carries_consistent_totals() {
        let row = estimate_row_json(
            "est-1",
            "co-1",
            "Fence",
            "draft",
            json!([line_item_row_json("li-1", "Posts", 3, 1050)]),
            3150,
            "2026-02-01T12:00:00Z",
        );
        assert_eq!(row["line_items"][0]["total_cents"], 3150);
        assert_eq!(row["total_amount_cents"], 3150);
    }
}
