// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl EstimateStatus {
    pub const ALL: [Self; 4] = [Self::Draft, Self::Sent, Self::Accepted, Self::Rejected];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn badge(self) -> BadgeVariant {
        match self {
            Self::Draft => BadgeVariant::Secondary,
            Self::Sent => BadgeVariant::Default,
            Self::Accepted => BadgeVariant::Success,
            Self::Rejected => BadgeVariant::Destructive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeVariant {
    Secondary,
    Default,
    Success,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub sales_tax_rate: f64,
    pub created_at: OffsetDateTime,
}

/// One priced row of an estimate. `total_cents` is derived and recomputed
/// whenever quantity or unit price changes; it is never entered directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub id: EstimateId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    pub status: EstimateStatus,
    pub line_items: Vec<LineItem>,
    pub total_amount_cents: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabGroup {
    Dashboard,
    Main,
    Data,
    Account,
}

impl TabGroup {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Main => "main",
            Self::Data => "data",
            Self::Account => "account",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Overview,
    Customers,
    Calendar,
    Map,
    Files,
    Settings,
    Leads,
    SalesCalls,
    Estimates,
    ActiveProjects,
    CompletedProjects,
    Presets,
    Materials,
    MoneyIn,
    MoneyOut,
    Account,
}

impl TabKind {
    pub const ALL: [Self; 16] = [
        Self::Overview,
        Self::Customers,
        Self::Calendar,
        Self::Map,
        Self::Files,
        Self::Settings,
        Self::Leads,
        Self::SalesCalls,
        Self::Estimates,
        Self::ActiveProjects,
        Self::CompletedProjects,
        Self::Presets,
        Self::Materials,
        Self::MoneyIn,
        Self::MoneyOut,
        Self::Account,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Customers => "customers",
            Self::Calendar => "calendar",
            Self::Map => "map",
            Self::Files => "files",
            Self::Settings => "settings",
            Self::Leads => "leads",
            Self::SalesCalls => "sales calls",
            Self::Estimates => "estimates",
            Self::ActiveProjects => "active projects",
            Self::CompletedProjects => "completed projects",
            Self::Presets => "presets",
            Self::Materials => "materials",
            Self::MoneyIn => "money in",
            Self::MoneyOut => "money out",
            Self::Account => "account",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let needle = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|tab| tab.label() == needle)
    }

    pub const fn group(self) -> TabGroup {
        match self {
            Self::Overview
            | Self::Customers
            | Self::Calendar
            | Self::Map
            | Self::Files
            | Self::Settings => TabGroup::Dashboard,
            Self::Leads
            | Self::SalesCalls
            | Self::Estimates
            | Self::ActiveProjects
            | Self::CompletedProjects => TabGroup::Main,
            Self::Presets | Self::Materials | Self::MoneyIn | Self::MoneyOut => TabGroup::Data,
            Self::Account => TabGroup::Account,
        }
    }
}

/// Renders cents as dollars with two decimal places, e.g. `$36.50`.
pub fn format_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

/// A coarse "time since creation" label for list rows.
pub fn relative_age(created_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed = now - created_at;
    let seconds = elapsed.whole_seconds();
    if seconds < 60 {
        return "just now".to_owned();
    }

    let minutes = elapsed.whole_minutes();
    let hours = elapsed.whole_hours();
    let days = elapsed.whole_days();
    let (count, unit) = if minutes < 60 {
        (minutes, "minute")
    } else if hours < 24 {
        (hours, "hour")
    } else if days < 30 {
        (days, "day")
    } else if days < 365 {
        (days / 30, "month")
    } else {
        (days / 365, "year")
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural} ago")
}
