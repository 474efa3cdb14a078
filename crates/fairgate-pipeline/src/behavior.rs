//! Per-user behaviour analytics: query-scraping and mass-export detection.

use fairgate_core::{SecurityKind, TenantId};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Thresholds for the behaviour detectors.
#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    /// Number of recent queries considered for scraping detection.
    pub window: usize,
    /// Repeat fraction within the window that flags scraping.
    pub repeat_threshold: f64,
    /// Documents exported per day before the mass-export flag.
    pub mass_export_threshold: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            window: 10,
            repeat_threshold: 0.90,
            mass_export_threshold: 1000,
        }
    }
}

/// A behaviour detector fired for a `(tenant, user)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorFlag {
    /// Nearly identical queries repeated across the recent window.
    QueryScraping { repeat_fraction: f64 },
    /// Cumulative daily document exports past the threshold.
    MassExport { exported_today: u64 },
}

impl BehaviorFlag {
    pub fn security_kind(&self) -> SecurityKind {
        match self {
            BehaviorFlag::QueryScraping { .. } => SecurityKind::QueryScraping,
            BehaviorFlag::MassExport { .. } => SecurityKind::MassExport,
        }
    }

    /// Anomaly score in `[0, 100]`.
    pub fn anomaly_score(&self, config: &BehaviorConfig) -> f64 {
        match self {
            BehaviorFlag::QueryScraping { repeat_fraction } => (repeat_fraction * 100.0).min(100.0),
            BehaviorFlag::MassExport { exported_today } => {
                let ratio = *exported_today as f64 / config.mass_export_threshold.max(1) as f64;
                (ratio * 50.0).min(100.0)
            }
        }
    }

    pub fn detail(&self) -> String {
        match self {
            BehaviorFlag::QueryScraping { repeat_fraction } => {
                format!(
                    "{:.0}% of recent queries are near-identical",
                    repeat_fraction * 100.0
                )
            }
            BehaviorFlag::MassExport { exported_today } => {
                format!("{exported_today} documents exported today")
            }
        }
    }
}

#[derive(Default)]
struct UserWindow {
    recent: VecDeque<u64>,
}

/// Rolling per-user counters feeding the behaviour flags. State is
/// instance-local; scores ride on the audit sink for fleet-wide
/// aggregation.
pub struct BehaviorTracker {
    config: BehaviorConfig,
    windows: Mutex<HashMap<(TenantId, String), UserWindow>>,
    exports: Mutex<HashMap<(TenantId, String), (String, u64)>>,
}

impl BehaviorTracker {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            exports: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Records one query; flags scraping when the window is full and
    /// dominated by one repeated query hash.
    pub fn observe_query(
        &self,
        tenant_id: &TenantId,
        user_id: &str,
        query: &str,
    ) -> Option<BehaviorFlag> {
        let hash = query_hash(query);
        let mut windows = self.windows.lock().unwrap();
        let window = windows
            .entry((tenant_id.clone(), user_id.to_string()))
            .or_default();

        window.recent.push_back(hash);
        if window.recent.len() > self.config.window {
            window.recent.pop_front();
        }
        if window.recent.len() < self.config.window {
            return None;
        }

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for h in &window.recent {
            *counts.entry(*h).or_insert(0) += 1;
        }
        let dominant = counts.values().copied().max().unwrap_or(0);
        let repeat_fraction = dominant as f64 / window.recent.len() as f64;

        if repeat_fraction >= self.config.repeat_threshold {
            Some(BehaviorFlag::QueryScraping { repeat_fraction })
        } else {
            None
        }
    }

    /// Accumulates documents returned to a user for `day` (a `YYYYMMDD`
    /// stamp); flags once the daily total passes the threshold.
    pub fn observe_export(
        &self,
        tenant_id: &TenantId,
        user_id: &str,
        documents: usize,
        day: &str,
    ) -> Option<BehaviorFlag> {
        let mut exports = self.exports.lock().unwrap();
        let entry = exports
            .entry((tenant_id.clone(), user_id.to_string()))
            .or_insert_with(|| (day.to_string(), 0));
        if entry.0 != day {
            *entry = (day.to_string(), 0);
        }
        entry.1 += documents as u64;

        if entry.1 > self.config.mass_export_threshold {
            Some(BehaviorFlag::MassExport {
                exported_today: entry.1,
            })
        } else {
            None
        }
    }
}

fn query_hash(query: &str) -> u64 {
    let digest = blake3::hash(query.trim().to_lowercase().as_bytes());
    let b = digest.as_bytes();
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}
