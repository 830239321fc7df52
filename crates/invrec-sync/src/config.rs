use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use invrec_sheets::{Rgb, SheetsConfig};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub spreadsheet_id: Option<String>,
    pub worksheet: String,
    pub access_token: Option<String>,
    pub api_base: String,
    pub directory: PathBuf,
    pub file_pattern: String,
    pub continue_on_error: bool,
    pub profile: String,
    pub profiles_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub highlight_color: Rgb,
}

fn unquote(raw: String) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; values may be quoted.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(unquote).filter(|v| !v.is_empty());
        Self {
            spreadsheet_id: var("SPREADSHEET_ID"),
            worksheet: var("WORKSHEET_NAME").unwrap_or_else(|| "SIBER PD LABU - TEKNIS".to_string()),
            access_token: var("GOOGLE_ACCESS_TOKEN"),
            api_base: var("SHEETS_API_BASE")
                .unwrap_or_else(|| "https://sheets.googleapis.com".to_string()),
            directory: var("DIRECTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./sources")),
            file_pattern: var("FILE_PATTERN").unwrap_or_else(|| r"(?i)\.txt$".to_string()),
            continue_on_error: var("CONTINUE_ON_ERROR").map_or(true, |v| v != "false"),
            profile: var("INVREC_PROFILE").unwrap_or_else(|| "linux".to_string()),
            profiles_dir: var("INVREC_PROFILES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./profiles")),
            reports_dir: var("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./reports")),
            http_timeout_secs: var("INVREC_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            user_agent: var("INVREC_USER_AGENT").unwrap_or_else(|| "invrec/0.1".to_string()),
            highlight_color: var("HIGHLIGHT_COLOR")
                .and_then(|v| Rgb::parse_hex(&v))
                .unwrap_or_default(),
        }
    }

    /// Gateway settings; fails when the spreadsheet id or token is missing.
    pub fn sheets_config(&self) -> Result<SheetsConfig> {
        let Some(spreadsheet_id) = self.spreadsheet_id.clone() else {
            bail!("SPREADSHEET_ID is not set");
        };
        let access_token = self
            .access_token
            .clone()
            .context("GOOGLE_ACCESS_TOKEN is not set")?;
        let mut config = SheetsConfig::new(spreadsheet_id, self.worksheet.clone(), access_token);
        config.api_base = self.api_base.clone();
        config.timeout = Duration::from_secs(self.http_timeout_secs);
        config.user_agent = Some(self.user_agent.clone());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> SyncConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SyncConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.worksheet, "SIBER PD LABU - TEKNIS");
        assert_eq!(cfg.file_pattern, r"(?i)\.txt$");
        assert!(cfg.continue_on_error);
        assert_eq!(cfg.profile, "linux");
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.highlight_color, Rgb::default());
        assert!(cfg.sheets_config().is_err());
    }

    #[test]
    fn quoted_values_are_unwrapped() {
        let cfg = config(&[
            ("SPREADSHEET_ID", "\"abc123\""),
            ("GOOGLE_ACCESS_TOKEN", "'tok'"),
            ("CONTINUE_ON_ERROR", "false"),
            ("HIGHLIGHT_COLOR", "#00FF00"),
            ("INVREC_HTTP_TIMEOUT_SECS", "5"),
        ]);
        assert!(!cfg.continue_on_error);
        assert_eq!(cfg.highlight_color.to_string(), "#00FF00");
        let sheets = cfg.sheets_config().expect("sheets config");
        assert_eq!(sheets.spreadsheet_id, "abc123");
        assert_eq!(sheets.access_token, "tok");
        assert_eq!(sheets.timeout, Duration::from_secs(5));
    }
}
