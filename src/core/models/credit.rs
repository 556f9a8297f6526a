use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-in-time reading of the account's prepaid credit, in dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditInfo {
    /// Total usage reported by the API
    pub spent: f64,
    /// `limit - spent`; negative when the account is overdrawn
    pub remaining: f64,
    /// Total credits purchased
    pub limit: f64,
    /// When the fetch that produced this snapshot completed
    pub last_updated: DateTime<Utc>,
}

impl CreditInfo {
    /// Build a snapshot from the two totals of a single credits response.
    pub fn from_totals(total_usage: f64, total_credits: f64, at: DateTime<Utc>) -> Self {
        Self {
            spent: total_usage,
            remaining: total_credits - total_usage,
            limit: total_credits,
            last_updated: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_is_limit_minus_spent() {
        let info = CreditInfo::from_totals(12.5, 20.0, Utc::now());
        assert!((info.spent - 12.5).abs() < 1e-10);
        assert!((info.limit - 20.0).abs() < 1e-10);
        assert!((info.remaining - 7.5).abs() < 1e-10);
    }

    #[test]
    fn overdraft_is_not_clamped() {
        let info = CreditInfo::from_totals(15.0, 10.0, Utc::now());
        assert!((info.remaining - -5.0).abs() < 1e-10);
    }

    #[test]
    fn serializes_with_snake_case_timestamp() {
        let info = CreditInfo::from_totals(1.0, 2.0, Utc::now());
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("last_updated").is_some());
        assert_eq!(json["remaining"], 1.0);
    }
}
