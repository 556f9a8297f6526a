use colored::{control, ColoredString, Colorize};

use crate::core::fetcher::FetchError;
use crate::core::formatter::{
    format_amount, format_credits, format_last_updated, format_usage_bar, spent_percent,
};
use crate::core::models::credit::CreditInfo;
use crate::core::refresh::RefreshState;

const BAR_WIDTH: usize = 12;

/// Render the detail panel for the current refresh state.
///
/// Layout:
/// ```text
///  OpenRouter Credits
///   Remaining  $7.50 remaining [████░░░░░░░░]
///   Spent      $12.50
///   Limit      $20.00
///   Updated    2026-10-19 14:05
/// ```
pub fn render_panel(state: &RefreshState, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" OpenRouter Credits".bold().to_string());

    if state.last_error == Some(FetchError::NoCredential) {
        lines.push(format!("  {}", "API key required".yellow()));
        lines.push(
            "  Run `creditbar key set` or export OPENROUTER_API_KEY."
                .dimmed()
                .to_string(),
        );
        return lines.join("\n");
    }

    if let Some(info) = &state.snapshot {
        render_credit_lines(&mut lines, info);
    }

    if let Some(err) = &state.last_error {
        if state.snapshot.is_some() {
            lines.push(String::new());
        }
        lines.push(format!("  {}", "Unable to load credit information".red()));
        lines.push(format!("  {}", err.to_string().dimmed()));
        lines.push(
            "  Please check your API key and internet connection."
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

fn render_credit_lines(lines: &mut Vec<String>, info: &CreditInfo) {
    let used = spent_percent(info.spent, info.limit);
    lines.push(format!(
        "  {}  {} {}",
        "Remaining".cyan(),
        color_by_remaining(info, &format_credits(info.remaining)),
        format_usage_bar(used, BAR_WIDTH).magenta()
    ));
    lines.push(format!("  {}      {}", "Spent".cyan(), format_amount(info.spent)));
    lines.push(format!("  {}      {}", "Limit".cyan(), format_amount(info.limit)));
    lines.push(format!(
        "  {}    {}",
        "Updated".cyan(),
        format_last_updated(&info.last_updated).dimmed()
    ));
}

/// Green above 25% of the limit left, yellow above 10%, red below.
fn color_by_remaining(info: &CreditInfo, text: &str) -> ColoredString {
    let remaining = 100.0 - spent_percent(info.spent, info.limit);
    if info.limit > 0.0 && remaining >= 25.0 {
        text.green()
    } else if info.limit > 0.0 && remaining >= 10.0 {
        text.yellow()
    } else {
        text.red()
    }
}
