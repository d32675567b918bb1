use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use chrono::NaiveDate;
use serde::Deserialize;

pub const DATA_DIR_NAME: &str = "immich-slideshow";

/// Immich API key. Kept out of `Debug` output so the loaded configuration can be logged.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Base URL of the Immich server, e.g. `http://immich.local:2283`.
    pub server_url: String,
    /// Key sent in the `x-api-key` header.
    pub api_key: ApiKey,
    /// How long a normal slide stays on screen.
    #[serde(default = "Configuration::default_hold_time", with = "humantime_serde")]
    pub hold_time: Duration,
    /// Maximum number of groups shown per date; 0 shows every group.
    #[serde(default)]
    pub group_limit: usize,
    /// Show the capture date and time labels.
    #[serde(default = "default_true")]
    pub show_date: bool,
    /// Look up location and description tags for each slide.
    #[serde(default = "default_true")]
    pub show_tags: bool,
    /// Show now-playing music information.
    #[serde(default)]
    pub show_music: bool,
    /// Show a clock on every slide.
    #[serde(default)]
    pub show_clock: bool,
    /// Play burst clusters back at full speed instead of trimming them.
    #[serde(default = "default_true")]
    pub show_burst: bool,
    /// Precede each burst with a normally paced slide of its first photo.
    #[serde(default = "default_true")]
    pub burst_lead_in: bool,
    /// Slide brightness in percent.
    #[serde(default = "Configuration::default_dim_level")]
    pub dim_level: u8,
    /// Directory for downloaded `{id}.tmp` files.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(
        default = "Configuration::default_request_timeout",
        with = "humantime_serde"
    )]
    pub request_timeout: Duration,
    /// Always show this date instead of picking one at random.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

fn default_true() -> bool {
    true
}

impl Configuration {
    const fn default_hold_time() -> Duration {
        Duration::from_secs(10)
    }

    const fn default_dim_level() -> u8 {
        100
    }

    const fn default_request_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: ApiKey::new(api_key),
            hold_time: Self::default_hold_time(),
            group_limit: 0,
            show_date: true,
            show_tags: true,
            show_music: false,
            show_clock: false,
            show_burst: true,
            burst_lead_in: true,
            dim_level: Self::default_dim_level(),
            data_dir: None,
            request_timeout: Self::default_request_timeout(),
            date: None,
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        self.server_url = self.server_url.trim().trim_end_matches('/').to_string();
        ensure!(!self.server_url.is_empty(), "server-url must not be empty");
        ensure!(
            self.server_url.starts_with("http://") || self.server_url.starts_with("https://"),
            "server-url must start with http:// or https://"
        );
        ensure!(!self.api_key.is_empty(), "api-key must not be empty");
        ensure!(
            self.hold_time >= Duration::from_secs(1),
            "hold-time must be at least one second"
        );
        ensure!(self.dim_level <= 100, "dim-level must be between 0 and 100");
        ensure!(
            self.request_timeout > Duration::ZERO,
            "request-timeout must be positive"
        );
        if let Some(dir) = &self.data_dir {
            ensure!(
                !dir.as_os_str().is_empty(),
                "data-dir must not be empty when set"
            );
        }
        Ok(self)
    }

    /// Where downloaded images are kept while they are on screen.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(DATA_DIR_NAME)
    }
}
