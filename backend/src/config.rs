//! Engine configuration.
//!
//! Defaults match the production deployment; every knob can be overridden
//! from `ASSIGNER_*` environment variables (a `.env` file is honoured).

use chrono::{NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Bonuses granted by the eligibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub preferred: i32,
    pub possible: i32,
    pub language: i32,
    pub availability: i32,
    pub role_requested: i32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            preferred: 30,
            possible: 10,
            language: 10,
            availability: 20,
            role_requested: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub auto_approve_pending: bool,
    pub use_fairness: bool,
    pub fairness_window_weeks: i64,
    pub max_assign_per_run: i64,
    pub weights: ScoringWeights,
    pub penalty_per_recent_shift: i32,
    pub language_mismatch_is_hard_reject: bool,
    pub trace_dir: PathBuf,
    pub timezone: Tz,
    pub batch_days_ahead: i64,
    pub notification_channel: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_approve_pending: true,
            use_fairness: true,
            fairness_window_weeks: 4,
            max_assign_per_run: 200,
            weights: ScoringWeights::default(),
            penalty_per_recent_shift: 1,
            language_mismatch_is_hard_reject: false,
            trace_dir: PathBuf::from("tmp"),
            timezone: chrono_tz::America::Argentina::Buenos_Aires,
            batch_days_ahead: 14,
            notification_channel: "both".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build a config from defaults plus `ASSIGNER_*` overrides.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        override_from_env("ASSIGNER_AUTO_APPROVE_PENDING", &mut config.auto_approve_pending);
        override_from_env("ASSIGNER_USE_FAIRNESS", &mut config.use_fairness);
        override_from_env("ASSIGNER_FAIRNESS_WINDOW_WEEKS", &mut config.fairness_window_weeks);
        override_from_env("ASSIGNER_MAX_ASSIGN_PER_RUN", &mut config.max_assign_per_run);
        override_from_env("ASSIGNER_WEIGHT_PREFERRED", &mut config.weights.preferred);
        override_from_env("ASSIGNER_WEIGHT_POSSIBLE", &mut config.weights.possible);
        override_from_env("ASSIGNER_WEIGHT_LANGUAGE", &mut config.weights.language);
        override_from_env("ASSIGNER_WEIGHT_AVAILABILITY", &mut config.weights.availability);
        override_from_env("ASSIGNER_WEIGHT_ROLE_REQUESTED", &mut config.weights.role_requested);
        override_from_env(
            "ASSIGNER_PENALTY_PER_RECENT_SHIFT",
            &mut config.penalty_per_recent_shift,
        );
        override_from_env(
            "ASSIGNER_LANGUAGE_MISMATCH_IS_HARD_REJECT",
            &mut config.language_mismatch_is_hard_reject,
        );
        override_from_env("ASSIGNER_TRACE_DIR", &mut config.trace_dir);
        override_from_env("ASSIGNER_TIMEZONE", &mut config.timezone);
        override_from_env("ASSIGNER_BATCH_DAYS_AHEAD", &mut config.batch_days_ahead);
        override_from_env("ASSIGNER_NOTIFICATION_CHANNEL", &mut config.notification_channel);
        config
    }

    /// Wall-clock time in the configured timezone, without offset.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }

    /// Local calendar date, the start of the batch horizon.
    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = env::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => log::warn!("Ignoring invalid value for {}: {:?}", key, raw),
    }
}
