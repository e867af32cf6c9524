//! Pre-flight spend gate for cloud-tier model calls.
//!
//! Grounded on the five-rule `check_budget` procedure and the cache
//! discipline described for the budget manager: the spend-lookup critical
//! section never holds the lock while querying the cost engine. Mirrors the
//! lock-release-requery pattern used elsewhere in this codebase around
//! cached lookups (`crates/domain/src/config/mod.rs`'s `RwLock`-guarded
//! reads).

use chrono::{DateTime, Datelike, Utc};
use parking_lot::Mutex;
use sa_domain::config::BudgetConfig;
use sa_pricing::CostEngine;
use sa_usage_store::UsageStore;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Period {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy)]
struct CachedSpend {
    value: f64,
    fetched_at: Instant,
}

#[derive(Debug, Clone)]
pub struct BudgetDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub daily_spend: f64,
    pub monthly_spend: f64,
    pub daily_limit: Option<f64>,
    pub monthly_limit: Option<f64>,
}

pub struct BudgetManager {
    cost_engine: CostEngine,
    config: Mutex<BudgetConfig>,
    daily_cache: Mutex<Option<CachedSpend>>,
    monthly_cache: Mutex<Option<CachedSpend>>,
}

impl BudgetManager {
    pub fn new(cost_engine: CostEngine, config: BudgetConfig) -> Self {
        Self {
            cost_engine,
            config: Mutex::new(config),
            daily_cache: Mutex::new(None),
            monthly_cache: Mutex::new(None),
        }
    }

    pub fn update_config(&self, config: BudgetConfig) {
        *self.config.lock() = config;
        *self.daily_cache.lock() = None;
        *self.monthly_cache.lock() = None;
    }

    fn period_start(period: Period, now: DateTime<Utc>) -> DateTime<Utc> {
        match period {
            Period::Daily => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight always valid")
                .and_utc(),
            Period::Monthly => now
                .date_naive()
                .with_day(1)
                .expect("day 1 always valid")
                .and_hms_opt(0, 0, 0)
                .expect("midnight always valid")
                .and_utc(),
        }
    }

    /// Cached spend lookup: check cache under lock; on miss, release the
    /// lock, query the cost engine, then re-acquire to store the result.
    fn cached_spend(&self, period: Period, store: &UsageStore, now: DateTime<Utc>) -> f64 {
        let cache = match period {
            Period::Daily => &self.daily_cache,
            Period::Monthly => &self.monthly_cache,
        };
        {
            let guard = cache.lock();
            if let Some(cached) = *guard {
                if cached.fetched_at.elapsed() < CACHE_TTL {
                    return cached.value;
                }
            }
        }
        let start = Self::period_start(period, now);
        let spend = self.cost_engine.total_spend(store, Some(start), Some(now));
        let mut guard = cache.lock();
        *guard = Some(CachedSpend {
            value: spend,
            fetched_at: Instant::now(),
        });
        spend
    }

    pub fn check_budget(
        &self,
        provider: &str,
        store: &UsageStore,
        now: DateTime<Utc>,
    ) -> BudgetDecision {
        let config = self.config.lock().clone();

        if !config.enabled {
            return BudgetDecision {
                allowed: true,
                reason: None,
                daily_spend: 0.0,
                monthly_spend: 0.0,
                daily_limit: None,
                monthly_limit: None,
            };
        }

        let daily_spend = self.cached_spend(Period::Daily, store, now);
        let monthly_spend = self.cached_spend(Period::Monthly, store, now);

        if !sa_pricing::PricingCatalog::is_cloud_provider(provider) {
            return BudgetDecision {
                allowed: true,
                reason: None,
                daily_spend,
                monthly_spend,
                daily_limit: config.daily_limit,
                monthly_limit: config.monthly_limit,
            };
        }

        if let Some(limit) = config.daily_limit {
            if daily_spend >= limit {
                return BudgetDecision {
                    allowed: false,
                    reason: Some(format!(
                        "Daily budget exceeded (${daily_spend:.2}/${limit:.2})"
                    )),
                    daily_spend,
                    monthly_spend,
                    daily_limit: config.daily_limit,
                    monthly_limit: config.monthly_limit,
                };
            }
        }

        if let Some(limit) = config.monthly_limit {
            if monthly_spend >= limit {
                return BudgetDecision {
                    allowed: false,
                    reason: Some(format!(
                        "Monthly budget exceeded (${monthly_spend:.2}/${limit:.2})"
                    )),
                    daily_spend,
                    monthly_spend,
                    daily_limit: config.daily_limit,
                    monthly_limit: config.monthly_limit,
                };
            }
        }

        BudgetDecision {
            allowed: true,
            reason: None,
            daily_spend,
            monthly_spend,
            daily_limit: config.daily_limit,
            monthly_limit: config.monthly_limit,
        }
    }
}
