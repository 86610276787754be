pub mod rate_limiter;
pub mod retry;

use alloy_primitives::U256;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::models::common::Config;

/// `10^decimals`, or `None` when it does not fit in 256 bits (more than 77 decimals).
pub fn unit_scale(decimals: u8) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(decimals))
}

/// Render a minor-unit amount with exactly `decimals` fractional digits.
pub fn format_units(raw: U256, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let Some(divisor) = unit_scale(decimals) else {
        return format!("{raw}e-{decimals}");
    };
    let fraction = (raw % divisor).to_string();
    let padding = "0".repeat(decimals as usize - fraction.len());
    format!("{}.{}{}", raw / divisor, padding, fraction)
}

pub fn load_config<P: AsRef<Path>>(file_name: P) -> Result<Config> {
    // Build the path to the config file
    let manifest_dir = env!("CARGO_MANIFEST_DIR").to_string();
    let config_path = Path::new(&manifest_dir).join(file_name);
    info!("Config path: {}", config_path.to_string_lossy());

    // File first, then HOLDERS__SECTION__KEY environment overrides
    let settings = config::Config::builder()
        .add_source(config::File::from(config_path.as_path()))
        .add_source(
            config::Environment::with_prefix("HOLDERS")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read config file")?;

    // Parse the YAML into our Config struct
    let config: Config = settings
        .try_deserialize()
        .context("failed to parse config YAML")?;

    config.validate().context("invalid config")?;

    Ok(config)
}

pub(crate) fn strip_html(error: &str) -> String {
    // If the error contains HTML tags, extract just the text content
    if error.contains("<!doctype html>") || error.contains("<html>") {
        // Remove all HTML tags and return the first non-empty line of text
        error
            .lines()
            .map(|line| line.trim())
            .find(|line| {
                !line.starts_with('<')
                    && !line.ends_with('>')
                    && !line.is_empty()
                    && *line != "html"
                    && *line != "body"
            })
            .unwrap_or(error)
            .to_string()
    } else {
        // Return original error if no HTML
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.500000");
        assert_eq!(format_units(U256::from(42u64), 6), "0.000042");
        assert_eq!(format_units(U256::from(120u64), 0), "120");
        assert_eq!(format_units(U256::ZERO, 2), "0.00");
    }

    #[test]
    fn test_unit_scale_limits() {
        assert_eq!(unit_scale(0), Some(U256::from(1u64)));
        assert!(unit_scale(77).is_some());
        assert_eq!(unit_scale(78), None);
        assert_eq!(unit_scale(u8::MAX), None);
        // No wrapped divisor past the limit
        assert_eq!(format_units(U256::from(5u64), 80), "5e-80");
        assert_eq!(format_units(U256::from(5u64), 77).len(), "0.".len() + 77);
    }

    #[test]
    fn test_strip_html() {
        let page = "<html>\n<body>\nToo Many Requests\n</body>\n</html>";
        assert_eq!(strip_html(page), "Too Many Requests");
        assert_eq!(strip_html("plain error"), "plain error");
    }
}
