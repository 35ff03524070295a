use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DashboardError, Result};
use crate::loader::{SheetLocation, published_csv_url};

const DEFAULT_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_BENEFITS_PATH: &str = "data/beneficios.csv";
const DEFAULT_CONSULTATIONS_PATH: &str = "data/consultas.csv";
const DEFAULT_USER: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin";
const DEFAULT_SESSION_HOURS: u64 = 8;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of one spreadsheet
///
/// The first of `url`, `id` (published Google sheet) or `path` that is set
/// wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub url: Option<String>,
    pub id: Option<String>,
    pub gid: u64,
    pub path: Option<PathBuf>,
}

impl SheetConfig {
    fn local(path: &str) -> Self {
        SheetConfig {
            path: Some(PathBuf::from(path)),
            ..SheetConfig::default()
        }
    }

    /// Resolve the configured source into a [`SheetLocation`]
    ///
    /// # Examples
    /// ```
    /// use benefits_dashboard::config::SheetConfig;
    /// use benefits_dashboard::loader::SheetLocation;
    ///
    /// let sheet = SheetConfig { id: Some("abc".into()), ..Default::default() };
    /// assert_eq!(
    ///     sheet.location().unwrap(),
    ///     SheetLocation::Url("https://docs.google.com/spreadsheets/d/abc/export?format=csv&gid=0".into())
    /// );
    /// ```
    pub fn location(&self) -> Option<SheetLocation> {
        let non_blank = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        if let Some(url) = non_blank(&self.url) {
            return Some(SheetLocation::Url(url));
        }
        if let Some(id) = non_blank(&self.id) {
            return Some(SheetLocation::Url(published_csv_url(&id, self.gid)));
        }
        self.path.clone().map(SheetLocation::File)
    }

    /// Stable cache key for this source.
    pub fn cache_key(&self) -> String {
        self.location()
            .map(|location| location.to_string())
            .unwrap_or_default()
    }
}

/// A login accepted by the dashboard, in plain text until hashed at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredUser {
    pub username: String,
    pub password: String,
}

/// Runtime configuration of the dashboard server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Socket address the server binds to
    pub bind_addr: String,

    /// Benefits sheet (costs per month, unit and benefit)
    pub benefits: SheetConfig,

    /// Consultations sheet; the efficiency tab is disabled without it
    pub consultations: Option<SheetConfig>,

    /// How long a fetched sheet is reused; `None` keeps it until refreshed
    pub cache_ttl_secs: Option<u64>,

    /// Fixed annual budget used for the consumption KPI
    pub annual_budget: Option<f64>,

    pub users: Vec<ConfiguredUser>,

    pub session_hours: u64,

    /// Timeout of a single sheet request
    pub request_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            bind_addr: DEFAULT_ADDR.to_string(),
            benefits: SheetConfig::local(DEFAULT_BENEFITS_PATH),
            consultations: Some(SheetConfig::local(DEFAULT_CONSULTATIONS_PATH)),
            cache_ttl_secs: None,
            annual_budget: None,
            users: vec![ConfiguredUser {
                username: DEFAULT_USER.to_string(),
                password: DEFAULT_PASSWORD.to_string(),
            }],
            session_hours: DEFAULT_SESSION_HOURS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl DashboardConfig {
    /// Read a JSON configuration file; absent keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| DashboardError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults, then the optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DASHBOARD_*`, `*_SHEET_*` and `CACHE_TTL_SECS` overrides
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, e.g. `std::env::var`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("DASHBOARD_ADDR") {
            self.bind_addr = addr;
        }

        if let Some(url) = lookup("BENEFITS_SHEET_URL") {
            self.benefits = SheetConfig {
                url: Some(url),
                ..SheetConfig::default()
            };
        } else if let Some(id) = lookup("BENEFITS_SHEET_ID") {
            self.benefits = SheetConfig {
                id: Some(id),
                ..SheetConfig::default()
            };
        }

        if let Some(url) = lookup("CONSULTATIONS_SHEET_URL") {
            self.consultations = Some(SheetConfig {
                url: Some(url),
                ..SheetConfig::default()
            });
        } else if let Some(id) = lookup("CONSULTATIONS_SHEET_ID") {
            self.consultations = Some(SheetConfig {
                id: Some(id),
                ..SheetConfig::default()
            });
        }

        let user = lookup("DASHBOARD_USER");
        let password = lookup("DASHBOARD_PASSWORD");
        if user.is_some() || password.is_some() {
            self.users = vec![ConfiguredUser {
                username: user.unwrap_or_else(|| DEFAULT_USER.to_string()),
                password: password.unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            }];
        }

        if let Some(ttl) = lookup("CACHE_TTL_SECS") {
            let secs: u64 = ttl
                .trim()
                .parse()
                .map_err(|_| DashboardError::Config(format!("CACHE_TTL_SECS is not a number: {}", ttl)))?;
            self.cache_ttl_secs = (secs > 0).then_some(secs);
        }

        Ok(())
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.benefits.location().is_none() {
            return Err(DashboardError::Config(
                "no source configured for the benefits sheet".to_string(),
            ));
        }
        if self.users.is_empty() {
            return Err(DashboardError::Config("at least one user is required".to_string()));
        }
        if self.users.iter().any(|u| u.username.trim().is_empty()) {
            return Err(DashboardError::Config("usernames cannot be blank".to_string()));
        }
        Ok(())
    }

    /// Consultations source, when one resolves to a location.
    pub fn consultations_location(&self) -> Option<&SheetConfig> {
        self.consultations
            .as_ref()
            .filter(|sheet| sheet.location().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_the_sample_data() {
        let config = DashboardConfig::default();

        assert_eq!(
            config.benefits.location(),
            Some(SheetLocation::File(PathBuf::from("data/beneficios.csv")))
        );
        assert!(config.consultations_location().is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_merge_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bind_addr": "127.0.0.1:9000", "benefits": {{"id": "sheet-1", "gid": 7}}, "annual_budget": 120000.0}}"#
        )
        .unwrap();

        let config = DashboardConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.annual_budget, Some(120000.0));
        assert_eq!(config.session_hours, DEFAULT_SESSION_HOURS);
        assert_eq!(
            config.benefits.location(),
            Some(SheetLocation::Url(published_csv_url("sheet-1", 7)))
        );
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(matches!(
            DashboardConfig::from_file(file.path()),
            Err(DashboardError::Config(_))
        ));
    }

    #[test]
    fn environment_overrides_take_precedence() {
        let mut config = DashboardConfig::default();
        config
            .apply_overrides(vars(&[
                ("BENEFITS_SHEET_URL", "https://example.com/b.csv"),
                ("CONSULTATIONS_SHEET_ID", "cons"),
                ("DASHBOARD_PASSWORD", "s3cret"),
                ("CACHE_TTL_SECS", "300"),
            ]))
            .unwrap();

        assert_eq!(
            config.benefits.location(),
            Some(SheetLocation::Url("https://example.com/b.csv".to_string()))
        );
        assert_eq!(config.consultations.as_ref().unwrap().id.as_deref(), Some("cons"));
        assert_eq!(config.users[0].username, "admin");
        assert_eq!(config.users[0].password, "s3cret");
        assert_eq!(config.cache_ttl_secs, Some(300));
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        let mut config = DashboardConfig::default();
        let result = config.apply_overrides(vars(&[("CACHE_TTL_SECS", "soon")]));
        assert!(matches!(result, Err(DashboardError::Config(_))));
    }

    #[test]
    fn url_wins_over_id_and_path() {
        let sheet = SheetConfig {
            url: Some("https://example.com/x.csv".to_string()),
            id: Some("abc".to_string()),
            gid: 0,
            path: Some(PathBuf::from("x.csv")),
        };
        assert_eq!(sheet.cache_key(), "https://example.com/x.csv");

        let blank = SheetConfig {
            url: Some("  ".to_string()),
            ..SheetConfig::default()
        };
        assert_eq!(blank.location(), None);
    }
}
