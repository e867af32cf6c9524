//! Built-in price table plus a running cost ledger derived from usage rows.
//!
//! Grounded on `original_source/src/aurarouter/savings/` (pricing catalog and
//! cost engine were kept at the module-export level in `savings/__init__.py`
//! but their implementation files were filtered from the retrieval pack).
//! The built-in-table-via-`once_cell::sync::Lazy` shape follows how the other
//! example repos in the pack hold static reference data.

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use sa_domain::config::PricingEntry;
use sa_usage_store::{UsageRecord, UsageStore};
use std::collections::HashMap;

/// Price per million tokens, input and output, in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Price {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub const ZERO: Price = Price::new(0.0, 0.0);

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

static BUILTIN_PRICES: Lazy<HashMap<&'static str, Price>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("claude-sonnet-4-5-20250929", Price::new(3.00, 15.00));
    m.insert("claude-haiku-4-5-20251001", Price::new(0.80, 4.00));
    m.insert("gemini-2.0-flash", Price::new(0.10, 0.40));
    m.insert("gemini-2.0-pro", Price::new(1.25, 10.00));
    // Provider catch-alls (local = free).
    m.insert("ollama:*", Price::ZERO);
    m.insert("llamacpp:*", Price::ZERO);
    m.insert("llamacpp-server:*", Price::ZERO);
    m
});

/// `is_cloud_provider(provider) ≜ provider ∈ {google, claude}`.
pub fn is_cloud_provider(provider: &str) -> bool {
    matches!(provider, "google" | "claude")
}

/// Resolution order: exact `model_name` in overrides → exact `model_name`
/// in built-ins → `provider:*` catch-all → `(0,0)`.
pub struct PricingCatalog {
    overrides: HashMap<String, Price>,
}

impl PricingCatalog {
    pub fn new(overrides: &HashMap<String, PricingEntry>) -> Self {
        let overrides = overrides
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    Price::new(v.input_per_million, v.output_per_million),
                )
            })
            .collect();
        Self { overrides }
    }

    pub fn get_price(&self, model_name: &str, provider: &str) -> Price {
        if let Some(p) = self.overrides.get(model_name) {
            return *p;
        }
        if let Some(p) = BUILTIN_PRICES.get(model_name) {
            return *p;
        }
        if let Some(p) = BUILTIN_PRICES.get(format!("{provider}:*").as_str()) {
            return *p;
        }
        Price::ZERO
    }

    pub fn is_cloud_provider(provider: &str) -> bool {
        is_cloud_provider(provider)
    }
}

impl Default for PricingCatalog {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpendByProvider {
    pub totals: HashMap<String, f64>,
}

/// `{spent_so_far, projected_monthly, days_elapsed, days_in_month}`.
#[derive(Debug, Clone, Copy)]
pub struct MonthlyProjection {
    pub spent_so_far: f64,
    pub projected_monthly: f64,
    pub days_elapsed: i64,
    pub days_in_month: u32,
}

/// `{monthly_cloud_spend, payback_months, annual_savings}`.
#[derive(Debug, Clone, Copy)]
pub struct RoiEstimate {
    pub monthly_cloud_spend: f64,
    pub payback_months: f64,
    pub annual_savings: f64,
}

/// `{actual_cost, shadow_cost, savings}`. Reporting-only: never affects
/// budget enforcement or routing.
#[derive(Debug, Clone, Copy)]
pub struct ShadowCost {
    pub actual_cost: f64,
    pub shadow_cost: f64,
    pub savings: f64,
}

/// Turns usage rows into dollar figures. Never mutates the store; purely
/// a read-side projection.
pub struct CostEngine {
    catalog: PricingCatalog,
}

impl CostEngine {
    pub fn new(catalog: PricingCatalog) -> Self {
        Self { catalog }
    }

    pub fn calculate_cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        model_name: &str,
        provider: &str,
    ) -> f64 {
        self.catalog.get_price(model_name, provider).cost(input_tokens, output_tokens)
    }

    fn cost_of(&self, record: &UsageRecord) -> f64 {
        self.calculate_cost(record.input_tokens, record.output_tokens, &record.model_id, &record.provider)
    }

    pub fn total_spend(
        &self,
        store: &UsageStore,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> f64 {
        store
            .query(start, end, None, None, None)
            .iter()
            .map(|r| self.cost_of(r))
            .sum()
    }

    pub fn spend_by_provider(
        &self,
        store: &UsageStore,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> SpendByProvider {
        let mut totals = HashMap::new();
        for row in store.query(start, end, None, None, None) {
            let cost = self.cost_of(&row);
            *totals.entry(row.provider.clone()).or_insert(0.0) += cost;
        }
        SpendByProvider { totals }
    }

    /// Projects the current month's spend to a full-month figure:
    /// `spent / days_elapsed * days_in_month`.
    pub fn monthly_projection(&self, store: &UsageStore, now: DateTime<Utc>) -> MonthlyProjection {
        let month_start = now
            .date_naive()
            .with_day(1)
            .expect("day 1 always valid")
            .and_hms_opt(0, 0, 0)
            .expect("midnight always valid")
            .and_utc();
        let spent_so_far = self.total_spend(store, Some(month_start), Some(now));
        let days_elapsed = (now.date_naive() - month_start.date_naive()).num_days() + 1;
        let days_in_month = days_in_month(now.year(), now.month());
        let projected_monthly = if days_elapsed > 0 {
            spent_so_far / days_elapsed as f64 * days_in_month as f64
        } else {
            0.0
        };
        MonthlyProjection {
            spent_so_far,
            projected_monthly,
            days_elapsed,
            days_in_month,
        }
    }

    /// GPU payback estimate. `monthly_cloud_spend` defaults to the current
    /// month's projection when not supplied. `payback_months` is `+∞` when
    /// spend is zero.
    pub fn roi_estimate(
        &self,
        store: &UsageStore,
        now: DateTime<Utc>,
        hardware_cost: f64,
        monthly_cloud_spend: Option<f64>,
    ) -> RoiEstimate {
        let monthly_cloud_spend =
            monthly_cloud_spend.unwrap_or_else(|| self.monthly_projection(store, now).projected_monthly);
        let payback_months = if monthly_cloud_spend > 0.0 {
            hardware_cost / monthly_cloud_spend
        } else {
            f64::INFINITY
        };
        RoiEstimate {
            monthly_cloud_spend,
            payback_months,
            annual_savings: monthly_cloud_spend * 12.0,
        }
    }

    /// What a request *would* have cost on a different model/provider,
    /// regardless of which provider actually served it. Never affects
    /// budget enforcement or routing.
    pub fn shadow_cost(
        &self,
        record: &UsageRecord,
        shadow_model: &str,
        shadow_provider: &str,
    ) -> ShadowCost {
        let actual_cost = self.cost_of(record);
        let shadow_cost = self.calculate_cost(
            record.input_tokens,
            record.output_tokens,
            shadow_model,
            shadow_provider,
        );
        ShadowCost {
            actual_cost,
            shadow_cost,
            savings: shadow_cost - actual_cost,
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month = if month == 12 {
        chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        chrono::NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid next-month date");
    let this_month_start =
        chrono::NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
    (next_month - this_month_start).num_days() as u32
}
