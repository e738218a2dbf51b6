// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use obra_app::{CompanyId, EstimateId, EstimateStatus, LineItem, LineItemId};
use obra_client::{Client, NewEstimate, UpdateEstimate};
use obra_testkit::{
    MockBackend, ScriptedResponse, company_row_json, estimate_row_json, line_item_row_json,
    token_response_json,
};
use serde_json::json;
use std::time::Duration;

fn client_for(backend: &MockBackend) -> Result<Client> {
    Ok(Client::new(
        backend.base_url(),
        "anon-key",
        Duration::from_secs(1),
    )?)
}

fn line_item(id: &str, quantity: i64, unit_price_cents: i64) -> LineItem {
    LineItem {
        id: LineItemId::new(id),
        description: format!("item {id}"),
        quantity,
        unit_price_cents,
        total_cents: quantity * unit_price_cents,
    }
}

#[test]
fn connection_error_is_actionable() {
    let client = Client::new("http://127.0.0.1:1", "anon-key", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .list_companies()
        .expect_err("unreachable backend should fail");
    assert!(error.to_string().contains("cannot reach"));
}

#[test]
fn sign_in_switches_requests_to_the_session_token() -> Result<()> {
    let backend = MockBackend::serve(vec![
        ScriptedResponse::ok(&token_response_json("session-token", "user-1", "a@b.co")),
        ScriptedResponse::ok(&json!([])),
    ])?;

    let mut client = client_for(&backend)?;
    let user = client.sign_in("a@b.co", "hunter2")?;
    assert_eq!(user.email, "a@b.co");
    assert!(client.signed_in());

    client.list_estimates(&CompanyId::new("co-1"))?;

    let requests = backend.join()?;
    assert!(requests[0].url.contains("/auth/v1/token"));
    assert!(requests[0].url.contains("grant_type=password"));
    assert_eq!(requests[0].header("apikey"), Some("anon-key"));

    assert_eq!(
        requests[1].header("authorization"),
        Some("Bearer session-token")
    );
    assert_eq!(requests[1].header("apikey"), Some("anon-key"));
    Ok(())
}

#[test]
fn list_estimates_scopes_by_company_and_orders_newest_first() -> Result<()> {
    let rows = json!([
        estimate_row_json(
            "est-2",
            "co-1",
            "Fence",
            "sent",
            json!([line_item_row_json("li-1", "Posts", 3, 1050)]),
            3150,
            "2026-02-02T12:00:00Z",
        ),
        estimate_row_json("est-1", "co-1", "Deck", "draft", json!([]), 0, "2026-02-01T12:00:00Z"),
    ]);
    let backend = MockBackend::serve(vec![ScriptedResponse::ok(&rows)])?;
    let client = client_for(&backend)?;

    let estimates = client.list_estimates(&CompanyId::new("co-1"))?;
    assert_eq!(estimates.len(), 2);
    assert_eq!(estimates[0].name, "Fence");
    assert_eq!(estimates[0].status, EstimateStatus::Sent);
    assert_eq!(estimates[0].total_amount_cents, 3150);
    assert_eq!(estimates[0].line_items[0].quantity, 3);

    let requests = backend.join()?;
    assert_eq!(requests[0].method, "GET");
    assert!(requests[0].url.contains("company_id=eq.co-1"));
    assert!(requests[0].url.contains("order=created_at.desc"));
    Ok(())
}

#[test]
fn create_estimate_is_one_insert_with_the_precomputed_total() -> Result<()> {
    let created = json!([estimate_row_json(
        "est-9",
        "co-1",
        "Fence",
        "draft",
        json!([line_item_row_json("li-1", "Posts", 3, 1050)]),
        3150,
        "2026-02-03T09:00:00Z",
    )]);
    let backend = MockBackend::serve(vec![ScriptedResponse::created(&created)])?;
    let client = client_for(&backend)?;

    let estimate_id = client.create_estimate(&NewEstimate {
        company_id: CompanyId::new("co-1"),
        name: "Fence".to_owned(),
        description: String::new(),
        status: EstimateStatus::Draft,
        line_items: vec![line_item("li-1", 3, 1050)],
        total_amount_cents: 3150,
    })?;
    assert_eq!(estimate_id, EstimateId::new("est-9"));

    let requests = backend.join()?;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].header("prefer"), Some("return=representation"));
    let body = requests[0].json()?;
    assert_eq!(body[0]["company_id"], "co-1");
    assert_eq!(body[0]["total_amount_cents"], 3150);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn update_estimate_replaces_fields_but_never_ownership() -> Result<()> {
    let updated = json!([estimate_row_json(
        "est-9",
        "co-1",
        "Fence",
        "sent",
        json!([line_item_row_json("li-1", "Posts", 5, 1000)]),
        5000,
        "2026-02-03T09:00:00Z",
    )]);
    let backend = MockBackend::serve(vec![ScriptedResponse::ok(&updated)])?;
    let client = client_for(&backend)?;

    client.update_estimate(
        &EstimateId::new("est-9"),
        &UpdateEstimate {
            name: "Fence".to_owned(),
            description: String::new(),
            status: EstimateStatus::Sent,
            line_items: vec![line_item("li-1", 5, 1000)],
            total_amount_cents: 5000,
        },
    )?;

    let requests = backend.join()?;
    assert_eq!(requests[0].method, "PATCH");
    assert!(requests[0].url.contains("id=eq.est-9"));
    let body = requests[0].json()?;
    assert!(body.get("company_id").is_none());
    assert_eq!(body["total_amount_cents"], 5000);
    Ok(())
}

#[test]
fn update_of_a_missing_estimate_fails_loudly() -> Result<()> {
    let backend = MockBackend::serve(vec![ScriptedResponse::ok(&json!([]))])?;
    let client = client_for(&backend)?;

    let error = client
        .update_estimate(
            &EstimateId::new("est-404"),
            &UpdateEstimate {
                name: "Gone".to_owned(),
                description: String::new(),
                status: EstimateStatus::Draft,
                line_items: Vec::new(),
                total_amount_cents: 0,
            },
        )
        .expect_err("update of missing row should fail");
    assert!(error.to_string().contains("not found"));

    backend.join()?;
    Ok(())
}

#[test]
fn delete_estimate_issues_one_delete_for_the_row() -> Result<()> {
    let deleted = json!([estimate_row_json(
        "est-9",
        "co-1",
        "Fence",
        "draft",
        json!([]),
        0,
        "2026-02-03T09:00:00Z",
    )]);
    let backend = MockBackend::serve(vec![ScriptedResponse::ok(&deleted)])?;
    let client = client_for(&backend)?;

    client.delete_estimate(&EstimateId::new("est-9"))?;

    let requests = backend.join()?;
    assert_eq!(requests[0].method, "DELETE");
    assert!(requests[0].url.contains("id=eq.est-9"));
    Ok(())
}

#[test]
fn single_record_getters_return_none_when_absent() -> Result<()> {
    let backend = MockBackend::serve(vec![
        ScriptedResponse::ok(&json!([])),
        ScriptedResponse::ok(&json!([])),
    ])?;
    let client = client_for(&backend)?;

    assert!(client.get_estimate(&EstimateId::new("est-404"))?.is_none());
    assert!(client.get_company(&CompanyId::new("co-404"))?.is_none());

    backend.join()?;
    Ok(())
}

#[test]
fn get_company_round_trips_the_row() -> Result<()> {
    let backend = MockBackend::serve(vec![ScriptedResponse::ok(&json!([company_row_json(
        "co-1",
        "Cloud Construction",
    )]))])?;
    let client = client_for(&backend)?;

    let company = client
        .get_company(&CompanyId::new("co-1"))?
        .expect("company exists");
    assert_eq!(company.name, "Cloud Construction");
    assert!((company.sales_tax_rate - 0.0825).abs() < f64::EPSILON);

    let requests = backend.join()?;
    assert!(requests[0].url.contains("id=eq.co-1"));
    Ok(())
}

#[test]
fn server_errors_carry_the_backend_message() -> Result<()> {
    let backend = MockBackend::serve(vec![ScriptedResponse::error(
        409,
        &json!({"message": "duplicate key value violates unique constraint"}),
    )])?;
    let client = client_for(&backend)?;

    let error = client
        .list_estimates(&CompanyId::new("co-1"))
        .expect_err("conflict should fail");
    assert!(error.to_string().contains("duplicate key"));

    backend.join()?;
    Ok(())
}

#[test]
fn expired_session_reads_as_signed_out() -> Result<()> {
    let backend = MockBackend::serve(vec![
        ScriptedResponse::ok(&token_response_json("session-token", "user-1", "a@b.co")),
        ScriptedResponse::error(401, &json!({"msg": "JWT expired"})),
    ])?;
    let mut client = client_for(&backend)?;

    client.sign_in("a@b.co", "hunter2")?;
    assert!(client.current_user()?.is_none());

    backend.join()?;
    Ok(())
}

#[test]
fn rows_with_unknown_status_are_rejected() -> Result<()> {
    let rows = json!([estimate_row_json(
        "est-1",
        "co-1",
        "Deck",
        "archived",
        json!([]),
        0,
        "2026-02-01T12:00:00Z",
    )]);
    let backend = MockBackend::serve(vec![ScriptedResponse::ok(&rows)])?;
    let client = client_for(&backend)?;

    let error = client
        .list_estimates(&CompanyId::new("co-1"))
        .expect_err("unknown status should fail decoding");
    assert!(error.to_string().contains("unknown estimate status"));

    backend.join()?;
    Ok(())
}
