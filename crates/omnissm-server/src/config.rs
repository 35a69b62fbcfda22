//! Server process configuration, loaded from the environment.

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind_address: SocketAddr,

    /// Directory holding the registry and overflow-queue databases
    pub data_path: PathBuf,

    /// Fleet-management service endpoint
    pub ssm_endpoint: String,

    /// Configuration-history service endpoint
    pub config_source_endpoint: String,

    /// Object-store endpoint for oversized event payloads
    pub object_store_endpoint: String,

    /// Optional YAML service configuration file
    pub config_file: Option<PathBuf>,

    /// Seconds between reconciliation passes; 0 disables the timer
    pub reconcile_interval_secs: u64,

    /// Seconds between overflow-queue drain passes
    pub drain_interval_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let data_path = std::env::var("OMNISSM_DATA_PATH")
            .unwrap_or_else(|_| "./data/omnissm".to_string())
            .into();

        let ssm_endpoint = std::env::var("OMNISSM_SSM_ENDPOINT")
            .unwrap_or_else(|_| "http://127.0.0.1:9090".to_string());

        let config_source_endpoint = std::env::var("OMNISSM_CONFIG_ENDPOINT")
            .unwrap_or_else(|_| "http://127.0.0.1:9091".to_string());

        let object_store_endpoint = std::env::var("OMNISSM_OBJECT_STORE_ENDPOINT")
            .unwrap_or_else(|_| "http://127.0.0.1:9092".to_string());

        let config_file = std::env::var("OMNISSM_CONFIG_FILE").ok().map(PathBuf::from);

        let reconcile_interval_secs = std::env::var("OMNISSM_RECONCILE_INTERVAL")
            .unwrap_or_else(|_| "300".to_string())
            .parse()?;

        let drain_interval_secs = std::env::var("OMNISSM_DRAIN_INTERVAL")
            .unwrap_or_else(|_| "60".to_string())
            .parse()?;

        Ok(ServerConfig {
            bind_address,
            data_path,
            ssm_endpoint,
            config_source_endpoint,
            object_store_endpoint,
            config_file,
            reconcile_interval_secs,
            drain_interval_secs,
        })
    }
}
