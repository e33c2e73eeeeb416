use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::location::Position;

const DEFAULT_API_ROOT: &str = "http://localhost:8000/api";
const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GEOCODER_TIMEOUT_SECS: u64 = 5;
const DEFAULT_COOKIE_SETTLE_MS: u64 = 100;
const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
const DEFAULT_CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_root: Url,
    pub request_timeout: Duration,
    pub csrf_cookie: String,
    pub csrf_header: String,
    /// Wait between the token-issuing round trip and the cookie read-back.
    pub cookie_settle: Duration,
    pub geocoder_url: Url,
    pub geocoder_timeout: Duration,
    /// Static coordinates standing in for an OS positioning service.
    /// `None` behaves like a denied location permission.
    pub position: Option<Position>,
}

impl ClientConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            api_root: cli_api_root,
            request_timeout_secs: cli_request_timeout,
            csrf_cookie: cli_csrf_cookie,
            csrf_header: cli_csrf_header,
            cookie_settle_ms: cli_cookie_settle,
            geocoder_url: cli_geocoder_url,
            geocoder_timeout_secs: cli_geocoder_timeout,
            latitude: cli_latitude,
            longitude: cli_longitude,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            api_root: file_api_root,
            request_timeout_secs: file_request_timeout,
            csrf_cookie: file_csrf_cookie,
            csrf_header: file_csrf_header,
            cookie_settle_ms: file_cookie_settle,
            geocoder_url: file_geocoder_url,
            geocoder_timeout_secs: file_geocoder_timeout,
            latitude: file_latitude,
            longitude: file_longitude,
        } = file_config;

        let api_root = match cli_api_root.or(file_api_root) {
            Some(url) => url,
            None => DEFAULT_API_ROOT.parse().expect("default API root valid"),
        };

        let geocoder_url = match cli_geocoder_url.or(file_geocoder_url) {
            Some(url) => url,
            None => DEFAULT_GEOCODER_URL
                .parse()
                .expect("default geocoder URL valid"),
        };

        let request_timeout = Duration::from_secs(
            cli_request_timeout
                .or(file_request_timeout)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        );
        let geocoder_timeout = Duration::from_secs(
            cli_geocoder_timeout
                .or(file_geocoder_timeout)
                .unwrap_or(DEFAULT_GEOCODER_TIMEOUT_SECS)
                .max(1),
        );
        let cookie_settle = Duration::from_millis(
            cli_cookie_settle
                .or(file_cookie_settle)
                .unwrap_or(DEFAULT_COOKIE_SETTLE_MS),
        );

        let latitude = cli_latitude.or(file_latitude);
        let longitude = cli_longitude.or(file_longitude);
        let position = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Position {
                latitude,
                longitude,
            }),
            (None, None) => None,
            _ => anyhow::bail!("latitude and longitude must be provided together"),
        };

        Ok(Self {
            api_root,
            request_timeout,
            csrf_cookie: cli_csrf_cookie
                .or(file_csrf_cookie)
                .unwrap_or_else(|| DEFAULT_CSRF_COOKIE.to_string()),
            csrf_header: cli_csrf_header
                .or(file_csrf_header)
                .unwrap_or_else(|| DEFAULT_CSRF_HEADER.to_string()),
            cookie_settle,
            geocoder_url,
            geocoder_timeout,
            position,
        })
    }

    pub fn ensure_valid(&self) -> Result<()> {
        anyhow::ensure!(
            matches!(self.api_root.scheme(), "http" | "https"),
            "API root {} must use http or https",
            self.api_root
        );
        anyhow::ensure!(
            matches!(self.geocoder_url.scheme(), "http" | "https"),
            "geocoder URL {} must use http or https",
            self.geocoder_url
        );
        anyhow::ensure!(
            !self.csrf_cookie.trim().is_empty(),
            "CSRF cookie name must not be empty"
        );
        anyhow::ensure!(
            !self.csrf_header.trim().is_empty(),
            "CSRF header name must not be empty"
        );
        anyhow::ensure!(
            self.cookie_settle < self.request_timeout,
            "cookie settle delay {:?} must be shorter than the request timeout {:?}",
            self.cookie_settle,
            self.request_timeout
        );
        if let Some(position) = &self.position {
            anyhow::ensure!(
                (-90.0..=90.0).contains(&position.latitude),
                "latitude {} out of range [-90, 90]",
                position.latitude
            );
            anyhow::ensure!(
                (-180.0..=180.0).contains(&position.longitude),
                "longitude {} out of range [-180, 180]",
                position.longitude
            );
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "orderdesk",
    about = "Terminal console for the storefront ordering API",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "ORDERDESK_API_ROOT",
        value_name = "URL",
        help = "Base URL of the ordering API"
    )]
    pub api_root: Option<Url>,

    #[arg(
        long,
        env = "ORDERDESK_REQUEST_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Overall HTTP request timeout in seconds"
    )]
    pub request_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "ORDERDESK_CSRF_COOKIE",
        value_name = "NAME",
        help = "Name of the anti-forgery token cookie"
    )]
    pub csrf_cookie: Option<String>,

    #[arg(
        long,
        env = "ORDERDESK_CSRF_HEADER",
        value_name = "NAME",
        help = "Name of the anti-forgery token request header"
    )]
    pub csrf_header: Option<String>,

    #[arg(
        long,
        env = "ORDERDESK_COOKIE_SETTLE_MS",
        value_name = "MS",
        help = "Delay before reading back a freshly issued token cookie"
    )]
    pub cookie_settle_ms: Option<u64>,

    #[arg(
        long,
        env = "ORDERDESK_GEOCODER_URL",
        value_name = "URL",
        help = "Base URL of the nominatim-compatible reverse geocoder"
    )]
    pub geocoder_url: Option<Url>,

    #[arg(
        long,
        env = "ORDERDESK_GEOCODER_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Bound on geolocation capture, in seconds"
    )]
    pub geocoder_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "ORDERDESK_LATITUDE",
        value_name = "DEG",
        allow_hyphen_values = true,
        help = "Latitude reported when staff checkout captures a location"
    )]
    pub latitude: Option<f64>,

    #[arg(
        long,
        env = "ORDERDESK_LONGITUDE",
        value_name = "DEG",
        allow_hyphen_values = true,
        help = "Longitude reported when staff checkout captures a location"
    )]
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    api_root: Option<Url>,
    request_timeout_secs: Option<u64>,
    csrf_cookie: Option<String>,
    csrf_header: Option<String>,
    cookie_settle_ms: Option<u64>,
    geocoder_url: Option<Url>,
    geocoder_timeout_secs: Option<u64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
