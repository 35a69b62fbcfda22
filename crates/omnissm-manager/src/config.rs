//! Service configuration.
//!
//! The configuration is an explicitly constructed value threaded into
//! every component; nothing reads the environment after startup.

use omnissm_dispatch::RetryPolicy;
use omnissm_identity::AccountWhitelist;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::{ManagerError, Result};

pub const DEFAULT_REGISTRATIONS_TABLE: &str = "omnissm-registrations";
pub const DEFAULT_INSTANCE_ROLE: &str =
    "service-role/AmazonEC2RunCommandRoleForManagedInstances";
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Name of the registry table
    pub registrations_table: String,

    /// Accounts allowed to register
    pub account_whitelist: Vec<String>,

    /// IAM role recorded on minted activations
    pub instance_role: String,

    /// Tag keys mirrored to the fleet-management service
    pub resource_tags: Vec<String>,

    /// Overflow FIFO queue name; empty disables overflow
    pub queue_name: String,

    /// Per-action retry budget
    pub max_retries: u32,

    /// account id -> role name assumed for cross-account reconciliation
    pub assume_roles: HashMap<String, String>,

    /// Whether `ResourceDeleted` tears down the registry row along with
    /// the downstream managed instance, or leaves it as an audit trail
    pub delete_entry_on_resource_deleted: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registrations_table: DEFAULT_REGISTRATIONS_TABLE.to_string(),
            account_whitelist: Vec::new(),
            instance_role: DEFAULT_INSTANCE_ROLE.to_string(),
            resource_tags: vec![
                "App".to_string(),
                "OwnerContact".to_string(),
                "Name".to_string(),
            ],
            queue_name: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            assume_roles: HashMap::new(),
            delete_entry_on_resource_deleted: true,
        }
    }
}

impl Config {
    /// Read configuration from a YAML file, then let `OMNISSM_*`
    /// environment variables override individual fields.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(&path).map_err(|e| {
            ManagerError::Config(format!("cannot read {:?}: {e}", path.as_ref()))
        })?;
        serde_yaml::from_str(&data)
            .map_err(|e| ManagerError::Config(format!("cannot parse {:?}: {e}", path.as_ref())))
    }

    fn apply_env(&mut self) {
        if let Ok(table) = std::env::var("OMNISSM_REGISTRATIONS_TABLE") {
            if !table.is_empty() {
                self.registrations_table = table;
            }
        }
        if let Ok(whitelist) = std::env::var("OMNISSM_ACCOUNT_WHITELIST") {
            self.account_whitelist = split_list(&whitelist);
        }
        if let Ok(role) = std::env::var("OMNISSM_INSTANCE_ROLE") {
            if !role.is_empty() {
                self.instance_role = role;
            }
        }
        if let Ok(tags) = std::env::var("OMNISSM_RESOURCE_TAGS") {
            if !tags.is_empty() {
                self.resource_tags = split_list(&tags);
            }
        }
        if let Ok(queue) = std::env::var("OMNISSM_QUEUE_NAME") {
            self.queue_name = queue;
        }
        if let Ok(retries) = std::env::var("OMNISSM_MAX_RETRIES") {
            if let Ok(retries) = retries.parse() {
                self.max_retries = retries;
            }
        }
    }

    pub fn whitelist(&self) -> AccountWhitelist {
        AccountWhitelist::from_accounts(self.account_whitelist.iter().cloned())
    }

    pub fn has_resource_tag(&self, tag: &str) -> bool {
        self.resource_tags.iter().any(|t| t == tag)
    }

    /// Role ARN assumed when reconciling the given account, if one is
    /// configured; callers fall back to the ambient identity otherwise.
    pub fn role_arn(&self, account_id: &str) -> Option<String> {
        self.assume_roles
            .get(account_id)
            .map(|role| format!("arn:aws:iam::{account_id}:role/{role}"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    pub fn overflow_enabled(&self) -> bool {
        !self.queue_name.is_empty()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
