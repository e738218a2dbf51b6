// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use log::debug;
use obra_app::{Company, CompanyId, Estimate, EstimateId, EstimatePayload, User};
use obra_client::{Client, NewEstimate, UpdateEstimate};
use obra_tui::AppRuntime;
use std::collections::BTreeMap;

/// Orchestrates the estimate views over the injected backend client.
///
/// Two responsibilities live here and nowhere else: the aggregate
/// `total_amount_cents` is computed from the submitted line items right
/// before every persist, and the per-company listing cache is invalidated
/// after every mutation so the next read re-fetches. Entries are last
/// writer wins per company key.
pub struct BackendRuntime {
    client: Client,
    listings: BTreeMap<CompanyId, Vec<Estimate>>,
}

impl BackendRuntime {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            listings: BTreeMap::new(),
        }
    }
}

impl AppRuntime for BackendRuntime {
    fn current_user(&mut self) -> Result<Option<User>> {
        self.client.current_user()
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<User> {
        self.client.sign_in(email, password)
    }

    fn sign_out(&mut self) -> Result<()> {
        self.client.sign_out()?;
        self.listings.clear();
        Ok(())
    }

    fn update_email(&mut self, email: &str) -> Result<()> {
        self.client.update_email(email)
    }

    fn update_password(&mut self, new_password: &str) -> Result<()> {
        self.client.update_password(new_password)
    }

    fn list_companies(&mut self) -> Result<Vec<Company>> {
        self.client.list_companies()
    }

    fn load_company(&mut self, company_id: &CompanyId) -> Result<Option<Company>> {
        self.client.get_company(company_id)
    }

    fn estimates_for(&mut self, company_id: &CompanyId) -> Result<Vec<Estimate>> {
        if let Some(rows) = self.listings.get(company_id) {
            return Ok(rows.clone());
        }
        debug!("estimates cache miss for company {company_id}");
        let rows = self.client.list_estimates(company_id)?;
        self.listings.insert(company_id.clone(), rows.clone());
        Ok(rows)
    }

    fn invalidate_estimates(&mut self, company_id: &CompanyId) {
        self.listings.remove(company_id);
    }

    /// Edits start from a fresh single-record read, never from a cached
    /// list row.
    fn fetch_estimate(&mut self, estimate_id: &EstimateId) -> Result<Option<Estimate>> {
        self.client.get_estimate(estimate_id)
    }

    fn create_estimate(
        &mut self,
        company_id: &CompanyId,
        payload: &EstimatePayload,
    ) -> Result<EstimateId> {
        let estimate_id = self.client.create_estimate(&NewEstimate {
            company_id: company_id.clone(),
            name: payload.name.clone(),
            description: payload.description.clone(),
            status: payload.status,
            line_items: payload.line_items.clone(),
            total_amount_cents: payload.total_amount_cents(),
        })?;
        self.invalidate_estimates(company_id);
        Ok(estimate_id)
    }

    fn update_estimate(
        &mut self,
        company_id: &CompanyId,
        estimate_id: &EstimateId,
        payload: &EstimatePayload,
    ) -> Result<()> {
        self.client.update_estimate(
            estimate_id,
            &UpdateEstimate {
                name: payload.name.clone(),
                description: payload.description.clone(),
                status: payload.status,
                line_items: payload.line_items.clone(),
                total_amount_cents: payload.total_amount_cents(),
            },
        )?;
        self.invalidate_estimates(company_id);
        Ok(())
    }

    fn delete_estimate(&mut self, company_id: &CompanyId, estimate_id: &EstimateId) -> Result<()> {
        self.client.delete_estimate(estimate_id)?;
        self.invalidate_estimates(company_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BackendRuntime;
    use anyhow::Result;
    use obra_app::{CompanyId, EstimateForm, EstimateId, EstimatePayload, LineItemEdit};
    use obra_client::Client;
    use obra_testkit::{MockBackend, ScriptedResponse, estimate_row_json, line_item_row_json};
    use obra_tui::AppRuntime;
    use serde_json::json;
    use std::time::Duration;

    fn runtime_for(backend: &MockBackend) -> Result<BackendRuntime> {
        let client = Client::new(backend.base_url(), "anon-key", Duration::from_secs(1))?;
        Ok(BackendRuntime::new(client))
    }

    fn payload_from_worked_example() -> EstimatePayload {
        let mut form = EstimateForm::blank();
        form.name = "Fence".to_owned();
        let first = form.add_line_item();
        form.update_line_item(&first, LineItemEdit::Description("Posts".to_owned()));
        form.update_line_item(&first, LineItemEdit::Quantity(3));
        form.update_line_item(&first, LineItemEdit::UnitPriceCents(1050));
        let second = form.add_line_item();
        form.update_line_item(&second, LineItemEdit::Description("Gate latch".to_owned()));
        form.update_line_item(&second, LineItemEdit::UnitPriceCents(500));
        form.submit().expect("valid draft")
    }

    fn listing_json(company_id: &str, names: &[&str]) -> serde_json::Value {
        let rows: Vec<_> = names
            .iter()
            .map(|name| {
                estimate_row_json(
                    &format!("est-{name}"),
                    company_id,
                    name,
                    "draft",
                    json!([]),
                    0,
                    "2026-02-01T12:00:00Z",
                )
            })
            .collect();
        json!(rows)
    }

    #[test]
    fn create_persists_the_sum_of_line_item_totals() -> Result<()> {
        let backend = MockBackend::serve(vec![ScriptedResponse::created(&json!([
            estimate_row_json(
                "est-1",
                "co-1",
                "Fence",
                "draft",
                json!([line_item_row_json("li-1", "Posts", 3, 1050)]),
                3650,
                "2026-02-03T09:00:00Z",
            )
        ]))])?;
        let mut runtime = runtime_for(&backend)?;

        let payload = payload_from_worked_example();
        assert_eq!(payload.total_amount_cents(), 3650);
        runtime.create_estimate(&CompanyId::new("co-1"), &payload)?;

        let requests = backend.join()?;
        let body = requests[0].json()?;
        assert_eq!(body[0]["total_amount_cents"], 3650);
        assert_eq!(body[0]["company_id"], "co-1");
        Ok(())
    }

    #[test]
    fn listing_is_cached_until_a_mutation_invalidates_it() -> Result<()> {
        // One listing response only; the second read must come from cache.
        let backend = MockBackend::serve(vec![ScriptedResponse::ok(&listing_json(
            "co-1",
            &["Deck"],
        ))])?;
        let mut runtime = runtime_for(&backend)?;
        let company = CompanyId::new("co-1");

        let first = runtime.estimates_for(&company)?;
        let second = runtime.estimates_for(&company)?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);

        assert_eq!(backend.join()?.len(), 1);
        Ok(())
    }

    #[test]
    fn update_invalidates_only_the_mutated_company() -> Result<()> {
        let backend = MockBackend::serve(vec![
            ScriptedResponse::ok(&listing_json("co-1", &["Deck"])),
            ScriptedResponse::ok(&listing_json("co-2", &["Roof"])),
            ScriptedResponse::ok(&json!([estimate_row_json(
                "est-Deck",
                "co-1",
                "Deck",
                "sent",
                json!([line_item_row_json("li-1", "Planks", 5, 1000)]),
                5000,
                "2026-02-01T12:00:00Z",
            )])),
            ScriptedResponse::ok(&listing_json("co-1", &["Deck"])),
        ])?;
        let mut runtime = runtime_for(&backend)?;
        let first_company = CompanyId::new("co-1");
        let second_company = CompanyId::new("co-2");

        runtime.estimates_for(&first_company)?;
        runtime.estimates_for(&second_company)?;

        let mut form = EstimateForm::blank();
        form.name = "Deck".to_owned();
        let item = form.add_line_item();
        form.update_line_item(&item, LineItemEdit::Description("Planks".to_owned()));
        form.update_line_item(&item, LineItemEdit::Quantity(5));
        form.update_line_item(&item, LineItemEdit::UnitPriceCents(1000));
        let payload = form.submit()?;

        runtime.update_estimate(&first_company, &EstimateId::new("est-Deck"), &payload)?;

        // co-2 is still cached; co-1 re-fetches.
        runtime.estimates_for(&second_company)?;
        runtime.estimates_for(&first_company)?;

        let requests = backend.join()?;
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[2].method, "PATCH");
        let patch_body = requests[2].json()?;
        assert!(patch_body.get("company_id").is_none());
        assert_eq!(patch_body["total_amount_cents"], 5000);
        Ok(())
    }

    #[test]
    fn delete_invalidates_and_the_next_fetch_lacks_the_row() -> Result<()> {
        let backend = MockBackend::serve(vec![
            ScriptedResponse::ok(&listing_json("co-1", &["Deck", "Fence"])),
            ScriptedResponse::ok(&json!([estimate_row_json(
                "est-Deck",
                "co-1",
                "Deck",
                "draft",
                json!([]),
                0,
                "2026-02-01T12:00:00Z",
            )])),
            ScriptedResponse::ok(&listing_json("co-1", &["Fence"])),
        ])?;
        let mut runtime = runtime_for(&backend)?;
        let company = CompanyId::new("co-1");

        assert_eq!(runtime.estimates_for(&company)?.len(), 2);
        runtime.delete_estimate(&company, &EstimateId::new("est-Deck"))?;

        let remaining = runtime.estimates_for(&company)?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Fence");

        let requests = backend.join()?;
        assert_eq!(requests[1].method, "DELETE");
        Ok(())
    }

    #[test]
    fn edit_reads_bypass_the_listing_cache() -> Result<()> {
        let backend = MockBackend::serve(vec![
            ScriptedResponse::ok(&listing_json("co-1", &["Deck"])),
            ScriptedResponse::ok(&json!([estimate_row_json(
                "est-Deck",
                "co-1",
                "Deck",
                "draft",
                json!([]),
                0,
                "2026-02-01T12:00:00Z",
            )])),
        ])?;
        let mut runtime = runtime_for(&backend)?;

        runtime.estimates_for(&CompanyId::new("co-1"))?;
        let fetched = runtime.fetch_estimate(&EstimateId::new("est-Deck"))?;
        assert!(fetched.is_some());

        let requests = backend.join()?;
        assert_eq!(requests.len(), 2);
        assert!(requests[1].url.contains("id=eq.est-Deck"));
        Ok(())
    }

    #[test]
    fn failed_create_leaves_the_cache_intact() -> Result<()> {
        let backend = MockBackend::serve(vec![
            ScriptedResponse::ok(&listing_json("co-1", &["Deck"])),
            ScriptedResponse::error(500, &json!({"message": "insert failed"})),
        ])?;
        let mut runtime = runtime_for(&backend)?;
        let company = CompanyId::new("co-1");

        runtime.estimates_for(&company)?;
        let error = runtime
            .create_estimate(&company, &payload_from_worked_example())
            .expect_err("insert should fail");
        assert!(error.to_string().contains("insert failed"));

        // Still served from cache: the script has no third response.
        assert_eq!(runtime.estimates_for(&company)?.len(), 1);

        assert_eq!(backend.join()?.len(), 2);
        Ok(())
    }
}
