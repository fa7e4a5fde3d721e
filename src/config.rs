use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::Pricing;

const DEFAULT_MODEL: &str = "gpt-5";
const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_FULL_ID_LENGTH: usize = 50;
const DEFAULT_PRICE_INPUT_PER_MILLION: f64 = 1.25;
const DEFAULT_PRICE_OUTPUT_PER_MILLION: f64 = 10.0;
const DEFAULT_PERSIST_FAILED_RESPONSES: bool = true;
const APP_DIR: &str = "quill";
const DOT_APP_DIR: &str = ".quill";

#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub model_base_url: String,
    pub model_timeout_secs: u64,
    pub api_key_file: PathBuf,
    pub history_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub full_id_len: usize,
    pub pricing: Pricing,
    pub persist_failed: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let model_timeout_secs = parse_positive_u64(
            get_var("MODEL_TIMEOUT_SECS").as_deref(),
            DEFAULT_MODEL_TIMEOUT_SECS,
        );
        let poll_interval_ms = parse_positive_u64(
            get_var("POLL_INTERVAL_MS").as_deref(),
            DEFAULT_POLL_INTERVAL_MS,
        );
        let full_id_len = parse_positive_u64(
            get_var("FULL_ID_LENGTH").as_deref(),
            DEFAULT_FULL_ID_LENGTH as u64,
        ) as usize;
        let pricing = Pricing {
            input_per_million: parse_rate(
                get_var("PRICE_INPUT_PER_MILLION").as_deref(),
                DEFAULT_PRICE_INPUT_PER_MILLION,
            ),
            output_per_million: parse_rate(
                get_var("PRICE_OUTPUT_PER_MILLION").as_deref(),
                DEFAULT_PRICE_OUTPUT_PER_MILLION,
            ),
        };
        let persist_failed = parse_bool(
            get_var("PERSIST_FAILED_RESPONSES").as_deref(),
            DEFAULT_PERSIST_FAILED_RESPONSES,
        );

        Self {
            model: non_empty(get_var("MODEL")).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_base_url: non_empty(get_var("MODEL_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string()),
            model_timeout_secs,
            api_key_file: parse_path(get_var("API_KEY_FILE").as_deref())
                .unwrap_or_else(default_api_key_file),
            history_dir: parse_path(get_var("HISTORY_DIR").as_deref())
                .unwrap_or_else(default_history_dir),
            poll_interval_ms,
            full_id_len,
            pricing,
            persist_failed,
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_api_key_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(DOT_APP_DIR))
        .join("api_key")
}

fn default_history_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DOT_APP_DIR))
        .unwrap_or_else(|| PathBuf::from(DOT_APP_DIR))
        .join("history")
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_path(raw: Option<&str>) -> Option<PathBuf> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_rate(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{
        Config, DEFAULT_FULL_ID_LENGTH, DEFAULT_MODEL, DEFAULT_MODEL_BASE_URL,
        DEFAULT_MODEL_TIMEOUT_SECS, DEFAULT_PERSIST_FAILED_RESPONSES, DEFAULT_POLL_INTERVAL_MS,
        DEFAULT_PRICE_INPUT_PER_MILLION, DEFAULT_PRICE_OUTPUT_PER_MILLION, parse_bool,
        parse_positive_u64, parse_rate,
    };

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::from_env_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn from_env_uses_defaults_when_vars_are_missing() {
        let cfg = config_from_pairs(&[]);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.model_base_url, DEFAULT_MODEL_BASE_URL);
        assert_eq!(cfg.model_timeout_secs, DEFAULT_MODEL_TIMEOUT_SECS);
        assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.full_id_len, DEFAULT_FULL_ID_LENGTH);
        assert_eq!(
            cfg.pricing.input_per_million,
            DEFAULT_PRICE_INPUT_PER_MILLION
        );
        assert_eq!(
            cfg.pricing.output_per_million,
            DEFAULT_PRICE_OUTPUT_PER_MILLION
        );
        assert_eq!(cfg.persist_failed, DEFAULT_PERSIST_FAILED_RESPONSES);
        assert!(cfg.history_dir.ends_with("history"));
        assert!(cfg.api_key_file.ends_with("api_key"));
    }

    #[test]
    fn from_env_reads_configured_values() {
        let cfg = config_from_pairs(&[
            ("MODEL", "gpt-5-mini"),
            ("MODEL_BASE_URL", "http://localhost:9999/v1"),
            ("MODEL_TIMEOUT_SECS", "15"),
            ("API_KEY_FILE", "/tmp/key"),
            ("HISTORY_DIR", " /tmp/history "),
            ("POLL_INTERVAL_MS", "250"),
            ("FULL_ID_LENGTH", "40"),
            ("PRICE_INPUT_PER_MILLION", "0.25"),
            ("PRICE_OUTPUT_PER_MILLION", "2"),
            ("PERSIST_FAILED_RESPONSES", "off"),
        ]);

        assert_eq!(cfg.model, "gpt-5-mini");
        assert_eq!(cfg.model_base_url, "http://localhost:9999/v1");
        assert_eq!(cfg.model_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.api_key_file, PathBuf::from("/tmp/key"));
        assert_eq!(cfg.history_dir, PathBuf::from("/tmp/history"));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.full_id_len, 40);
        assert_eq!(cfg.pricing.input_per_million, 0.25);
        assert_eq!(cfg.pricing.output_per_million, 2.0);
        assert!(!cfg.persist_failed);
    }

    #[test]
    fn from_env_uses_defaults_for_invalid_values() {
        let cfg = config_from_pairs(&[
            ("MODEL", "   "),
            ("MODEL_TIMEOUT_SECS", "0"),
            ("POLL_INTERVAL_MS", "soon"),
            ("FULL_ID_LENGTH", "-3"),
            ("PRICE_INPUT_PER_MILLION", "-1"),
            ("PRICE_OUTPUT_PER_MILLION", "NaN"),
            ("PERSIST_FAILED_RESPONSES", "perhaps"),
            ("HISTORY_DIR", ""),
        ]);

        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.model_timeout_secs, DEFAULT_MODEL_TIMEOUT_SECS);
        assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.full_id_len, DEFAULT_FULL_ID_LENGTH);
        assert_eq!(
            cfg.pricing.input_per_million,
            DEFAULT_PRICE_INPUT_PER_MILLION
        );
        assert_eq!(
            cfg.pricing.output_per_million,
            DEFAULT_PRICE_OUTPUT_PER_MILLION
        );
        assert_eq!(cfg.persist_failed, DEFAULT_PERSIST_FAILED_RESPONSES);
        assert!(cfg.history_dir.ends_with("history"));
    }

    #[test]
    fn parse_positive_u64_uses_default_for_missing_or_invalid_values() {
        assert_eq!(parse_positive_u64(None, 7), 7);
        assert_eq!(parse_positive_u64(Some(""), 7), 7);
        assert_eq!(parse_positive_u64(Some("not-a-number"), 7), 7);
        assert_eq!(parse_positive_u64(Some("0"), 7), 7);
    }

    #[test]
    fn parse_positive_u64_accepts_positive_integer() {
        assert_eq!(parse_positive_u64(Some("45"), 7), 45);
        assert_eq!(parse_positive_u64(Some("  90  "), 7), 90);
    }

    #[test]
    fn parse_rate_accepts_zero_and_fractions() {
        assert_eq!(parse_rate(Some("0"), 1.0), 0.0);
        assert_eq!(parse_rate(Some(" 0.4 "), 1.0), 0.4);
        assert_eq!(parse_rate(Some("inf"), 1.0), 1.0);
    }

    #[test]
    fn parse_bool_respects_truthy_and_falsy_values() {
        assert!(parse_bool(Some("true"), false));
        assert!(parse_bool(Some(" YES "), false));
        assert!(!parse_bool(Some("off"), true));
        assert!(!parse_bool(Some(" 0 "), true));
    }

    #[test]
    fn parse_bool_returns_default_for_unknown_values() {
        assert!(parse_bool(Some("maybe"), true));
        assert!(!parse_bool(Some("maybe"), false));
        assert!(!parse_bool(None, false));
    }
}
