use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PopauthSettings {
    pub application: ApplicationSettings,
    pub popup: PopupSettings,
    pub backend: BackendSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub providers: ProvidersSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Redirect URI registered with every identity provider
    pub redirect_url: String,
    /// Substring identifying that the popup is back on our origin.
    /// Falls back to `redirect_url` when unset.
    pub redirect_marker: Option<String>,
    /// Navigation target once a login completes
    pub home_path: String,
    pub loopback_host: String,
    pub loopback_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupSettings {
    pub width: u32,
    pub height: u32,
    pub window_name: String,
    pub poll_interval_ms: u64,
    /// Pause between a confirmed backend login and navigation
    pub completion_delay_ms: u64,
    /// End the handshake as soon as the redirect carries an `error` parameter
    /// instead of waiting for the user to close the popup.
    pub report_denied_consent: bool,
    /// Screen geometry for hosts that cannot query a real display
    pub screen_width: u32,
    pub screen_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub federated_login_path: String,
    pub login_path: String,
    pub register_path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersSettings {
    pub google: ProviderSettings,
    pub facebook: ProviderSettings,
}

/// Per-provider overrides. Anything left unset falls back to the
/// provider's built-in endpoints and scopes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderSettings {
    pub authorization_endpoint: Option<String>,
    pub userinfo_endpoint: Option<String>,
    pub scopes: Option<Vec<String>>,

    // Direct value (can be overridden by environment variable)
    pub client_id: Option<String>,

    // Environment variable name for override
    pub client_id_env: Option<String>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            redirect_url: "http://127.0.0.1:8765/auth/popup/callback".to_string(),
            redirect_marker: None,
            home_path: "/".to_string(),
            loopback_host: "127.0.0.1".to_string(),
            loopback_port: 8765,
        }
    }
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            width: 500,
            height: 600,
            window_name: "_blank".to_string(),
            poll_interval_ms: 1000,
            completion_delay_ms: 2000,
            report_denied_consent: false,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            federated_login_path: "/auth/google".to_string(),
            login_path: "/auth/login".to_string(),
            register_path: "/auth/register".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: ".popauth".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PopauthSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        Self::initialize_logging(&settings.logging)?;

        Ok(settings)
    }

    /// Initialize `env_logger`, `RUST_LOG` wins over the configured level
    ///
    /// # Errors
    ///
    /// Returns an error if a global logger is already installed
    fn initialize_logging(logging: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&logging.level))
            .try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `POPAUTH_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_file(&default_config_path)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("POPAUTH_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ POPAUTH_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_popup_env_overrides(&mut settings.popup);
        Self::apply_backend_env_overrides(&mut settings.backend);
        Self::apply_storage_env_overrides(&mut settings.storage);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(redirect_url) = std::env::var("REDIRECT_URL") {
            app_settings.redirect_url = redirect_url;
        }
        if let Ok(marker) = std::env::var("REDIRECT_MARKER") {
            app_settings.redirect_marker = Some(marker);
        }
        if let Ok(port_str) = std::env::var("LOOPBACK_PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.loopback_port = port;
            }
        }
    }

    /// Apply environment overrides for popup timing
    pub fn apply_popup_env_overrides(popup_settings: &mut PopupSettings) {
        Self::apply_numeric_env_override("POLL_INTERVAL_MS", &mut popup_settings.poll_interval_ms);
        Self::apply_numeric_env_override(
            "COMPLETION_DELAY_MS",
            &mut popup_settings.completion_delay_ms,
        );
        if let Ok(value) = std::env::var("REPORT_DENIED_CONSENT") {
            if let Ok(report) = value.parse::<bool>() {
                popup_settings.report_denied_consent = report;
            }
        }
    }

    fn apply_backend_env_overrides(backend_settings: &mut BackendSettings) {
        if let Ok(base_url) = std::env::var("BACKEND_BASE_URL") {
            backend_settings.base_url = base_url;
        }
    }

    fn apply_storage_env_overrides(storage_settings: &mut StorageSettings) {
        if let Ok(directory) = std::env::var("SESSION_STORE_DIR") {
            storage_settings.directory = directory;
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            logging_settings.level = log_level;
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the loopback redirect host
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.application.loopback_host, self.application.loopback_port
        )
    }

    /// Marker that identifies the redirect back to our own origin
    #[must_use]
    pub fn redirect_marker(&self) -> &str {
        self.application
            .redirect_marker
            .as_deref()
            .unwrap_or(&self.application.redirect_url)
    }

    /// Poll period, never shorter than one millisecond
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.popup.poll_interval_ms.max(1))
    }

    #[must_use]
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.popup.completion_delay_ms)
    }
}

impl ProviderSettings {
    /// Get the client ID, checking the environment variable first (the configured
    /// name, or `default_env` when none is configured), then falling back to the direct value
    #[must_use]
    pub fn get_client_id(&self, default_env: &str) -> Option<String> {
        let env_var = self.client_id_env.as_deref().unwrap_or(default_env);
        if let Ok(value) = std::env::var(env_var) {
            if !value.is_empty() {
                return Some(value);
            }
        }
        self.client_id.clone()
    }
}
