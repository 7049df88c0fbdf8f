//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success:   green   (created relationships, confirmations)
//!   - Warning:   yellow  (cancelled or rejected operations)
//!   - Reference: cyan    (requirement ids, tree roots)
//!   - Muted:     dimmed  (field labels, connectors, depths)
//!   - Emphasis:  bold    (section headers)

use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Color a requirement id.
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Arrow pointing up the hierarchy, with ASCII fallback.
pub(crate) fn up_arrow(config: &OutputConfig) -> &'static str {
    if config.use_ascii { "^" } else { "↑" }
}

/// Arrow pointing down the hierarchy, with ASCII fallback.
pub(crate) fn down_arrow(config: &OutputConfig) -> &'static str {
    if config.use_ascii { "v" } else { "↓" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_color_returns_plain_text() {
        let config = OutputConfig::new(80, false, false);
        assert_eq!(success("ok", &config), "ok");
        assert_eq!(warning("careful", &config), "careful");
        assert_eq!(colorize_id("REQ-1", &config), "REQ-1");
        assert_eq!(bold("Header", &config), "Header");
    }

    #[test]
    fn test_ascii_arrows() {
        let ascii = OutputConfig::new(80, true, false);
        let unicode = OutputConfig::new(80, false, false);
        assert_eq!(up_arrow(&ascii), "^");
        assert_eq!(down_arrow(&ascii), "v");
        assert_eq!(up_arrow(&unicode), "↑");
        assert_eq!(down_arrow(&unicode), "↓");
    }
}
