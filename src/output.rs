//! CLI output appearance: color and emoji handling.
//!
//! Respects `--color=never|always|auto`, the `NO_COLOR` convention
//! (<https://no-color.org/>), `CLICOLOR`/`CLICOLOR_FORCE`, and `TERM=dumb`.

use std::env;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and the `--color`
    /// CLI flag ("always", "never", or "auto").
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even empty) disables colors.
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }
}

/// Emoji for capable terminals, a plain tag otherwise.
pub fn emoji<'a>(config: &OutputConfig, symbol: &'a str, fallback: &'a str) -> &'a str {
    if config.use_color {
        symbol
    } else {
        fallback
    }
}
