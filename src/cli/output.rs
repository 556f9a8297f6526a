use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
}

/// Decide whether to emit ANSI colors from the config setting
/// (`auto|always|never`), the `--no-color` flag and NO_COLOR.
pub fn detect_color(setting: &str, no_color_flag: bool) -> bool {
    if no_color_flag || std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    match setting {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_name() {
        assert_eq!(OutputFormat::from_name("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_name("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::from_name("other"), OutputFormat::Text);
    }

    #[test]
    fn flag_disables_color() {
        assert!(!detect_color("always", true));
        assert!(!detect_color("never", false));
    }
}
