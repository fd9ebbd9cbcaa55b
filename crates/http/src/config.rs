//! Server settings shared by the listener, the pool and every worker.
//!
//! Keys use the camelCase names of the classic settings file, so a document
//! like the following loads as is:
//!
//! ```
//! use micro_http_worker::config::ServerSettings;
//!
//! let settings = ServerSettings::from_toml_str(r#"
//!     port = 8443
//!     readTimeout = 5000
//!     maxThreads = 16
//!
//!     [tls]
//!     certFile = "cert.pem"
//!     keyFile = "key.pem"
//! "#).unwrap();
//!
//! assert_eq!(settings.port, 8443);
//! assert_eq!(settings.max_request_size, 16_000);
//! assert!(settings.tls.is_some());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// Inactivity timeout in milliseconds.
    pub read_timeout: u64,

    /// Upper bound for a whole non-multipart request, header included.
    pub max_request_size: usize,

    /// Upper bound for a `multipart/*` body.
    pub max_multi_part_size: usize,

    /// Workers kept alive by the periodic cleanup.
    pub min_threads: usize,
    pub max_threads: usize,

    /// Period of the pool cleanup task, in milliseconds.
    pub cleanup_interval: u64,

    pub tls: Option<TlsSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    /// PEM certificate chain.
    pub cert_file: String,
    /// PEM private key (PKCS#1, PKCS#8 or SEC1).
    pub key_file: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            read_timeout: 10_000,
            max_request_size: 16_000,
            max_multi_part_size: 1_000_000,
            min_threads: 1,
            max_threads: 100,
            cleanup_interval: 1_000,
            tls: None,
        }
    }
}

impl ServerSettings {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
