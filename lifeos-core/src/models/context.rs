use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value used for an indicator no sensor has reported yet.
pub const UNKNOWN: &str = "unknown";

/// Coarse indicators describing the user's current state. Built per status
/// request and embedded in the upstream prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub health: HealthSignals,
    pub finance: FinanceSignals,
    pub schedule: ScheduleSignals,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    /// Time of the newest sensor reading; absent for the simulated context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSignals {
    pub hrv: String,
    pub sleep: String,
    pub steps: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanceSignals {
    pub balance: String,
    pub recent_spend: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSignals {
    pub next_event: String,
    pub focus_level: String,
}

impl UserContext {
    /// Static demo context used until a sensor feed has reported anything.
    pub fn simulated() -> Self {
        Self {
            health: HealthSignals {
                hrv: "38ms".to_string(),
                sleep: "7h".to_string(),
                steps: "6200".to_string(),
            },
            finance: FinanceSignals {
                balance: "$4,000".to_string(),
                recent_spend: "$310 this week, mostly dining".to_string(),
            },
            schedule: ScheduleSignals {
                next_event: "Deep work block at 14:00".to_string(),
                focus_level: "High".to_string(),
            },
            extra: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Build a context from raw sensor readings. Known keys fill the fixed
    /// fields; everything else lands in `extra`.
    pub fn from_readings<'a, I>(readings: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = Self::unknown();
        for (key, value) in readings {
            let value = value.to_string();
            match key {
                "hrv" => ctx.health.hrv = value,
                "sleep" => ctx.health.sleep = value,
                "steps" => ctx.health.steps = value,
                "bank_balance" | "balance" => ctx.finance.balance = value,
                "recent_spend" => ctx.finance.recent_spend = value,
                "next_event" => ctx.schedule.next_event = value,
                "focus_level" | "focus" => ctx.schedule.focus_level = value,
                other => {
                    ctx.extra.insert(other.to_string(), value);
                }
            }
        }
        ctx
    }

    fn unknown() -> Self {
        Self {
            health: HealthSignals {
                hrv: UNKNOWN.to_string(),
                sleep: UNKNOWN.to_string(),
                steps: UNKNOWN.to_string(),
            },
            finance: FinanceSignals {
                balance: UNKNOWN.to_string(),
                recent_spend: UNKNOWN.to_string(),
            },
            schedule: ScheduleSignals {
                next_event: UNKNOWN.to_string(),
                focus_level: UNKNOWN.to_string(),
            },
            extra: BTreeMap::new(),
            updated_at: None,
        }
    }
}
