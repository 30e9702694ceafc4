//! Gateway server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! sweep_interval_secs = 30
//!
//! [webhooks]
//! max_attempts = 3
//! base_delay_secs = 2
//!
//! [[vendors]]
//! vendor_id = "v_acme"
//! wallet_address = "0x742d35cc6635c0532925a3b8d19dac9dd9bf1234"
//! preferred_dest_chain_id = 8453
//! enabled_source_chains = [1, 8453, 84532]
//! webhook_url = "$ACME_WEBHOOK_URL"
//!
//! [[products]]
//! product_id = "p_starter"
//! vendor_id = "v_acme"
//! default_amount_minor = 990000
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `config.toml`)
//! - `HOST` — Override server bind address
//! - `PORT` — Override server port

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use payrail::directory::{ProductRecord, VendorRecord};
use payrail_webhooks::WebhookConfig;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `8080`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between webhook poll sweeps (default: `30`).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Webhook delivery settings.
    #[serde(default)]
    pub webhooks: WebhookConfig,

    /// Vendor records served by the read-only directory.
    #[serde(default)]
    pub vendors: Vec<VendorRecord>,

    /// Product records served by the read-only catalog.
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    8080
}

const fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            sweep_interval_secs: default_sweep_interval_secs(),
            webhooks: WebhookConfig::default(),
            vendors: Vec::new(),
            products: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// After loading, `$VAR` / `${VAR}` references are expanded from the
    /// process environment, and `HOST` / `PORT` env vars override the file
    /// values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };

        let expanded = expand_env_vars(&content);
        let mut config: Self = toml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        Ok(config)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment
/// variables. Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];

        let (name, consumed) = if let Some(inner) = tail.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 2),
                None => {
                    out.push('$');
                    rest = tail;
                    continue;
                }
            }
        } else {
            let end = tail
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(tail.len());
            (&tail[..end], end)
        };

        if name.is_empty() {
            out.push('$');
            rest = tail;
            continue;
        }

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&tail[..consumed]);
            }
        }
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}
