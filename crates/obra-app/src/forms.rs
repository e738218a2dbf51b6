// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::{Estimate, EstimateStatus, LineItem, LineItemId};

/// One editable line-item row inside an estimate draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemInput {
    pub id: LineItemId,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl LineItemInput {
    fn blank() -> Self {
        Self {
            id: LineItemId::generate(),
            description: String::new(),
            quantity: 1,
            unit_price_cents: 0,
            total_cents: 0,
        }
    }

    fn from_line_item(item: &LineItem) -> Self {
        Self {
            id: item.id.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            total_cents: item.total_cents,
        }
    }
}

/// A single-field edit to a line item. Quantity and unit-price edits carry
/// their recomputation of the derived total with them, so the draft never
/// exposes a stale total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemEdit {
    Description(String),
    Quantity(i64),
    UnitPriceCents(i64),
}

/// In-memory estimate draft. Nothing here touches the store; `submit`
/// produces the payload the orchestrator persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateForm {
    pub name: String,
    pub description: String,
    status: EstimateStatus,
    line_items: Vec<LineItemInput>,
}

impl EstimateForm {
    pub fn blank() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            status: EstimateStatus::Draft,
            line_items: Vec::new(),
        }
    }

    /// Seeds the draft from a server-confirmed record; the prior status is
    /// carried through to submit unchanged.
    pub fn from_estimate(estimate: &Estimate) -> Self {
        Self {
            name: estimate.name.clone(),
            description: estimate.description.clone(),
            status: estimate.status,
            line_items: estimate
                .line_items
                .iter()
                .map(LineItemInput::from_line_item)
                .collect(),
        }
    }

    pub const fn status(&self) -> EstimateStatus {
        self.status
    }

    pub fn line_items(&self) -> &[LineItemInput] {
        &self.line_items
    }

    /// Appends a fresh row (quantity 1, price 0, total 0) and returns its id.
    pub fn add_line_item(&mut self) -> LineItemId {
        let item = LineItemInput::blank();
        let id = item.id.clone();
        self.line_items.push(item);
        id
    }

    /// Applies one field edit to the matching row. An unknown id is a no-op:
    /// nothing is added, removed, or recomputed.
    pub fn update_line_item(&mut self, id: &LineItemId, edit: LineItemEdit) {
        let Some(item) = self.line_items.iter_mut().find(|item| &item.id == id) else {
            return;
        };

        match edit {
            LineItemEdit::Description(description) => item.description = description,
            LineItemEdit::Quantity(quantity) => {
                item.quantity = quantity;
                item.total_cents = item.quantity * item.unit_price_cents;
            }
            LineItemEdit::UnitPriceCents(unit_price_cents) => {
                item.unit_price_cents = unit_price_cents;
                item.total_cents = item.quantity * item.unit_price_cents;
            }
        }
    }

    /// Removes the matching row, preserving the order of the rest. An
    /// unknown id is a no-op.
    pub fn remove_line_item(&mut self, id: &LineItemId) {
        self.line_items.retain(|item| &item.id != id);
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("estimate name is required -- enter a name and retry");
        }
        for (index, item) in self.line_items.iter().enumerate() {
            let row = index + 1;
            if item.description.trim().is_empty() {
                bail!("line item {row} needs a description -- fill it in and retry");
            }
            if item.quantity < 1 {
                bail!("line item {row} quantity must be at least 1");
            }
            if item.unit_price_cents < 0 {
                bail!("line item {row} unit price cannot be negative");
            }
        }
        Ok(())
    }

    /// Validates the draft and emits the submit payload. The aggregate
    /// total is not computed here; that belongs to the orchestrator.
    pub fn submit(&self) -> Result<EstimatePayload> {
        self.validate()?;
        Ok(EstimatePayload {
            name: self.name.trim().to_owned(),
            description: self.description.clone(),
            status: self.status,
            line_items: self
                .line_items
                .iter()
                .map(|item| LineItem {
                    id: item.id.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    total_cents: item.total_cents,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatePayload {
    pub name: String,
    pub description: String,
    pub status: EstimateStatus,
    pub line_items: Vec<LineItem>,
}

impl EstimatePayload {
    pub fn total_amount_cents(&self) -> i64 {
        self.line_items.iter().map(|item| item.total_cents).sum()
    }
}
