//! Configuration management for crsacquire using the prefer crate.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default ledger database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "crs_scraper_database.db";

/// Default sink descriptor filename, looked up relative to the working directory.
pub const DEFAULT_SINK_FILENAME: &str = "dropbox_access_token.txt";

/// HTTP fetcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// User agent override. Unset means the built-in crsacquire agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Aggregate request budget.
    pub requests_per_minute: u32,
    /// Retries after a transient failure.
    pub retry_attempts: u32,
    /// Wait between retries in seconds.
    pub retry_wait_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout: 30,
            requests_per_minute: 20,
            retry_attempts: 2,
            retry_wait_secs: 10,
        }
    }
}

/// Paginated search listing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Search endpoint URL with a `{page}` placeholder.
    pub search_url_template: String,
    /// Prefix joined with each format's relative `Url`.
    pub file_base_url: String,
    /// Reports dated before this prefix (compared as strings) are skipped.
    pub cutoff: String,
    /// First page to request.
    pub start_page: u32,
    /// Pattern for embedded images in HTML files. Group 1 is the image path.
    pub image_pattern: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            search_url_template:
                "http://www.crs.gov/search/results?term=orderBy=Date&navids=4294952831&pageNumber={page}"
                    .to_string(),
            file_base_url: "http://crs.gov/".to_string(),
            cutoff: "201604".to_string(),
            start_page: 1,
            image_pattern: r#"<img[^>]*\ssrc="([^"]+)""#.to_string(),
        }
    }
}

impl ListingConfig {
    /// Search URL for a page number.
    pub fn page_url(&self, page: u32) -> String {
        self.search_url_template
            .replace("{page}", &page.to_string())
    }
}

/// Link-graph (Constitution Annotated) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkGraphConfig {
    /// Base URL that page paths are relative to.
    pub base_url: String,
    /// Path the traversal starts from.
    pub root_path: String,
    /// Link pattern. Group 1 is the page path relative to `base_url`.
    pub link_pattern: String,
    /// Sink directory for fetched pages.
    pub cache_dir: String,
    /// Suffix appended to the remote sink root for this crawler.
    pub remote_suffix: String,
}

impl Default for LinkGraphConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.crs.gov/conan/".to_string(),
            root_path: "constitutionannotated".to_string(),
            link_pattern: r#"href="/conan/((?:index|details)/.*?)">"#.to_string(),
            cache_dir: "conan".to_string(),
            remote_suffix: "-conan".to_string(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory. Local sinks write below it.
    pub data_dir: PathBuf,
    /// Ledger database filename.
    pub database_filename: String,
    /// Remote sink descriptor. Local storage is used when it does not exist.
    pub sink_file: PathBuf,
    /// HTTP fetcher settings.
    pub http: HttpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        // ~/Documents/crs, falling back to the home dir, then the current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crs");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            sink_file: PathBuf::from(DEFAULT_SINK_FILENAME),
            http: HttpSettings::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the ledger database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the ledger appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (relative paths resolve against the config file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Ledger database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Sink descriptor path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_file: Option<String>,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub link_graph: LinkGraphConfig,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers crsacquire config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("crsacquire").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e))),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// `~/` is expanded to the home directory.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let path = match path_str.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(path_str)),
            None => PathBuf::from(path_str),
        };

        if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref sink_file) = self.sink_file {
            settings.sink_file = self.resolve_path(sink_file, base_dir);
        }
        settings.http = self.http.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override (`--target`).
    pub data_dir: Option<PathBuf>,
    /// Sink descriptor override (`--sink-file`).
    pub sink_file: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> Result<(Settings, Config)> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);

    // Command-line and environment overrides take precedence
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = cwd.join(data_dir);
    }
    if let Some(sink_file) = options.sink_file {
        settings.sink_file = cwd.join(sink_file);
    }

    tracing::debug!(
        "Data dir: {}, sink descriptor: {}",
        settings.data_dir.display(),
        settings.sink_file.display()
    );
    Ok((settings, config))
}

/// Remote sink credentials, read from a `KEY=VALUE` descriptor file:
///
/// ```text
/// TOKEN=<access token>
/// PATH=/name
/// ```
///
/// For app-folder tokens the uploads land under the app's folder.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkDescriptor {
    pub token: String,
    pub path: String,
}

impl SinkDescriptor {
    /// Parse descriptor text. Blank lines are ignored; values may contain `=`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::Config(format!("Malformed sink descriptor line: {}", line))
            })?;
            values.insert(key, value);
        }

        let token = values
            .get("TOKEN")
            .ok_or_else(|| Error::Config("Sink descriptor has no TOKEN".to_string()))?;
        let path = values
            .get("PATH")
            .ok_or_else(|| Error::Config("Sink descriptor has no PATH".to_string()))?;

        Ok(Self {
            token: token.to_string(),
            path: path.to_string(),
        })
    }

    /// Read a descriptor file. A missing file means no remote sink.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Self::parse(&text).map(Some)
    }

    /// Remote root for a crawler, e.g. `/name-conan`.
    pub fn remote_root(&self, suffix: &str) -> String {
        format!("{}{}", self.path, suffix)
    }
}
