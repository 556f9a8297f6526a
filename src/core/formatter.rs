use chrono::{DateTime, Local, Utc};

use crate::core::fetcher::FetchError;
use crate::core::refresh::{Phase, RefreshState};

/// Returns "$7.50", or "-$5.00" for an overdrawn balance.
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${:.2}", amount)
    }
}

/// Returns "$123.45 remaining".
pub fn format_credits(remaining: f64) -> String {
    format!("{} remaining", format_amount(remaining))
}

/// Compact status-bar text for the current refresh state.
///
/// A stale snapshot is still shown after a failed refresh; only a missing
/// key replaces it.
pub fn format_status_title(state: &RefreshState) -> String {
    if state.last_error == Some(FetchError::NoCredential) {
        return "No Key".to_string();
    }
    if let Some(info) = &state.snapshot {
        return format_amount(info.remaining);
    }
    if state.last_error.is_some() {
        return "Error".to_string();
    }
    match state.phase {
        Phase::Fetching => "...".to_string(),
        Phase::Idle => "--".to_string(),
    }
}

/// Short local date and time, e.g. "2026-10-19 14:05".
pub fn format_last_updated(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Share of the credit limit already spent, 0.0 - 100.0.
/// Zero when there is no limit.
pub fn spent_percent(spent: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 0.0;
    }
    (spent / limit * 100.0).clamp(0.0, 100.0)
}

/// Returns "[████████░░░░]" where █ = remaining portion, ░ = used portion.
pub fn format_usage_bar(used_percent: f64, width: usize) -> String {
    let used_percent = used_percent.clamp(0.0, 100.0);
    let used_blocks = ((used_percent / 100.0) * width as f64).round() as usize;
    let remaining_blocks = width.saturating_sub(used_blocks);

    let filled: String = "█".repeat(remaining_blocks);
    let empty: String = "░".repeat(used_blocks);

    format!("[{}{}]", filled, empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::credit::CreditInfo;

    fn state_with(
        snapshot: Option<CreditInfo>,
        last_error: Option<FetchError>,
        phase: Phase,
    ) -> RefreshState {
        RefreshState {
            snapshot,
            last_error,
            phase,
            completed: 0,
        }
    }

    #[test]
    fn format_amount_two_decimals() {
        assert_eq!(format_amount(7.5), "$7.50");
        assert_eq!(format_amount(0.0), "$0.00");
        assert_eq!(format_amount(-5.0), "-$5.00");
    }

    #[test]
    fn format_credits_two_decimals() {
        assert_eq!(format_credits(123.45), "$123.45 remaining");
        assert_eq!(format_credits(5.0), "$5.00 remaining");
    }

    #[test]
    fn status_title_before_first_fetch() {
        assert_eq!(format_status_title(&state_with(None, None, Phase::Fetching)), "...");
        assert_eq!(format_status_title(&state_with(None, None, Phase::Idle)), "--");
    }

    #[test]
    fn status_title_shows_remaining() {
        let info = CreditInfo::from_totals(12.5, 20.0, Utc::now());
        assert_eq!(
            format_status_title(&state_with(Some(info), None, Phase::Idle)),
            "$7.50"
        );
    }

    #[test]
    fn status_title_keeps_stale_amount_on_error() {
        let info = CreditInfo::from_totals(12.5, 20.0, Utc::now());
        let state = state_with(
            Some(info),
            Some(FetchError::Transport("timeout".into())),
            Phase::Idle,
        );
        assert_eq!(format_status_title(&state), "$7.50");
    }

    #[test]
    fn status_title_error_without_snapshot() {
        let state = state_with(None, Some(FetchError::Parse("bad".into())), Phase::Idle);
        assert_eq!(format_status_title(&state), "Error");
    }

    #[test]
    fn status_title_no_key() {
        let info = CreditInfo::from_totals(1.0, 2.0, Utc::now());
        let state = state_with(Some(info), Some(FetchError::NoCredential), Phase::Idle);
        assert_eq!(format_status_title(&state), "No Key");
    }

    #[test]
    fn spent_percent_handles_zero_limit() {
        assert_eq!(spent_percent(5.0, 0.0), 0.0);
        assert!((spent_percent(5.0, 20.0) - 25.0).abs() < 1e-10);
        assert_eq!(spent_percent(30.0, 20.0), 100.0);
    }

    #[test]
    fn format_usage_bar_width() {
        assert_eq!(format_usage_bar(0.0, 12), "[████████████]");
        assert_eq!(format_usage_bar(100.0, 12), "[░░░░░░░░░░░░]");
        assert_eq!(format_usage_bar(50.0, 12), "[██████░░░░░░]");
    }
}
