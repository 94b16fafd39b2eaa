use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

/// Configuration for the printdash dashboard, assembled once at process start.
///
/// Non-secret settings come from environment variables to support containerized
/// deployments. Credentials live in files under `SECRETS_DIR` so they can be
/// mounted into the container without passing through the environment; every
/// secret file is required and startup aborts if one is missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on.
    ///
    /// Environment variable: `LISTEN_ADDR` (default "0.0.0.0:5000")
    pub listen_addr: String,

    /// How often each monitor loop polls its printer's job endpoint.
    ///
    /// Environment variable: `POLL_INTERVAL_SECS` (default "5")
    pub poll_interval: Duration,

    /// Base URL of the printer API host. Per-printer endpoints are formed as
    /// `{base}/{printer}/api/job` and `{base}/{printer}/webcam/?action=stream`.
    ///
    /// Environment variable: `PRINTER_BASE_URL` (required)
    pub printer_base_url: String,

    /// Base URL of the smart plug controlling the workshop lights, without the
    /// `/cm` command path.
    ///
    /// Environment variable: `PLUG_URL` (required)
    pub plug_url: String,

    /// Username half of the HTTP basic-auth credential pair.
    ///
    /// Environment variable: `AUTH_USERNAME` (required)
    pub auth_username: String,

    /// Password half of the basic-auth pair, from `http-password.txt`.
    pub auth_password: String,

    /// The printers being monitored and served.
    ///
    /// Environment variable: `PRINTERS` (required, comma-separated names);
    /// each printer's API key is read from `{name}-api-key.txt`.
    pub printers: Vec<PrinterConfig>,

    /// Matrix notification settings.
    pub matrix: MatrixConfig,
}

/// One configured printer.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub name: String,
    pub api_key: String,
}

/// Settings for the Matrix chat notifier.
///
/// The homeserver comes from `MATRIX_HOMESERVER` (default "https://matrix.org");
/// the login credentials and target room come from secret files.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub homeserver: String,
    pub username: String,
    pub password: String,
    pub room_id: String,
}

impl Config {
    /// Load configuration from environment variables and secret files.
    ///
    /// # Errors
    ///
    /// Returns an error if a required environment variable is not set, a value
    /// cannot be parsed, or any secret file is missing or unreadable:
    /// - `PRINTERS`: comma-separated printer names (required)
    /// - `PRINTER_BASE_URL`: printer API base URL (required)
    /// - `PLUG_URL`: smart plug base URL (required)
    /// - `AUTH_USERNAME`: basic-auth username (required)
    /// - `LISTEN_ADDR`: listen address (default "0.0.0.0:5000")
    /// - `POLL_INTERVAL_SECS`: monitor poll interval (default "5")
    /// - `MATRIX_HOMESERVER`: Matrix homeserver URL (default "https://matrix.org")
    /// - `SECRETS_DIR`: directory holding the secret files (default "./secrets")
    pub fn load() -> Result<Self> {
        let secrets_dir = PathBuf::from(
            env::var("SECRETS_DIR").unwrap_or_else(|_| constants::DEFAULT_SECRETS_DIR.to_string()),
        );

        let listen_addr =
            env::var("LISTEN_ADDR").unwrap_or_else(|_| constants::DEFAULT_LISTEN_ADDR.to_string());

        let poll_interval_secs = env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| constants::DEFAULT_POLL_INTERVAL_SECS.to_string())
            .parse::<u64>()
            .map_err(|e| anyhow!("Invalid POLL_INTERVAL_SECS: {}", e))?;

        let printer_base_url = env::var("PRINTER_BASE_URL")
            .map_err(|_| anyhow!("PRINTER_BASE_URL environment variable is required"))?;

        let plug_url = env::var("PLUG_URL")
            .map_err(|_| anyhow!("PLUG_URL environment variable is required"))?;

        let auth_username = env::var("AUTH_USERNAME")
            .map_err(|_| anyhow!("AUTH_USERNAME environment variable is required"))?;

        let printer_names = env::var("PRINTERS")
            .map_err(|_| anyhow!("PRINTERS environment variable is required"))?;
        let printers = printer_names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                Ok(PrinterConfig {
                    name: name.to_string(),
                    api_key: read_secret(&secrets_dir, &format!("{}-api-key.txt", name))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if printers.is_empty() {
            return Err(anyhow!("PRINTERS must name at least one printer"));
        }

        let auth_password = read_secret(&secrets_dir, "http-password.txt")?;

        let matrix = MatrixConfig {
            homeserver: env::var("MATRIX_HOMESERVER")
                .unwrap_or_else(|_| constants::DEFAULT_MATRIX_HOMESERVER.to_string()),
            username: read_secret(&secrets_dir, "matrix-username.txt")?,
            password: read_secret(&secrets_dir, "matrix-password.txt")?,
            room_id: read_secret(&secrets_dir, "matrix-room-id.txt")?,
        };

        Ok(Config {
            listen_addr,
            poll_interval: Duration::from_secs(poll_interval_secs),
            printer_base_url,
            plug_url,
            auth_username,
            auth_password,
            printers,
            matrix,
        })
    }

    /// Look up a configured printer by name.
    pub fn printer(&self, name: &str) -> Option<&PrinterConfig> {
        self.printers.iter().find(|p| p.name == name)
    }
}

/// Read one secret file and trim surrounding whitespace.
fn read_secret(dir: &Path, file: &str) -> Result<String> {
    let path = dir.join(file);
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read secret file '{}'", path.display()))?;
    Ok(contents.trim().to_string())
}

/// Application constants used throughout the system.
pub mod constants {
    /// Default address the HTTP server binds to.
    pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

    /// Default monitor poll interval in seconds.
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

    /// Default Matrix homeserver.
    pub const DEFAULT_MATRIX_HOMESERVER: &str = "https://matrix.org";

    /// Default directory holding the secret files.
    pub const DEFAULT_SECRETS_DIR: &str = "./secrets";
}
