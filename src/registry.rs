//! Static mapping from monitored URLs to the servers that own them.
use reqwest::Url;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{ConfigError, MonitorConfig};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No server registered for address '{0}'")]
    NotFound(String),
}

/// A host that owns one or more targets and accepts remote commands.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub address: String,
    pub name: String,
    pub login: String,
    pub secret: String,
    pub port: u16,
}

impl std::fmt::Debug for ServerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRecord")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("login", &self.login)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredTarget {
    pub url: String,
    /// Host part of `url`, used as the server lookup key.
    pub address: String,
}

impl MonitoredTarget {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let address = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "URL has no host".to_string(),
            })?
            // IPv6 hosts come back bracketed.
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        Ok(Self {
            url: url.to_string(),
            address,
        })
    }
}

/// Read-only after construction. Targets and servers keep configuration order.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Vec<MonitoredTarget>,
    servers: Vec<ServerRecord>,
    by_address: HashMap<String, usize>,
}

impl TargetRegistry {
    pub fn new(
        targets: Vec<MonitoredTarget>,
        servers: Vec<ServerRecord>,
    ) -> Result<Self, ConfigError> {
        if targets.is_empty() {
            return Err(ConfigError::MissingField("urls".to_string()));
        }
        let by_address: HashMap<String, usize> = servers
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.address.clone(), idx))
            .collect();
        for target in &targets {
            if !by_address.contains_key(&target.address) {
                return Err(ConfigError::UnknownServer {
                    url: target.url.clone(),
                    address: target.address.clone(),
                });
            }
        }
        Ok(Self {
            targets,
            servers,
            by_address,
        })
    }

    /// Builds the registry from loaded configuration. Servers are ordered by the
    /// first target that references them, then any unreferenced servers by address.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        let targets = config
            .urls
            .iter()
            .map(|url| MonitoredTarget::parse(url))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ordered_addresses: Vec<&String> = Vec::new();
        for target in &targets {
            if let Some((address, _)) = config.servers.get_key_value(&target.address) {
                if !ordered_addresses.contains(&address) {
                    ordered_addresses.push(address);
                }
            }
        }
        let mut unreferenced: Vec<&String> = config
            .servers
            .keys()
            .filter(|a| !ordered_addresses.contains(a))
            .collect();
        unreferenced.sort();
        ordered_addresses.extend(unreferenced);

        let servers = ordered_addresses
            .into_iter()
            .map(|address| {
                let entry = &config.servers[address];
                ServerRecord {
                    address: address.clone(),
                    name: entry.name.clone(),
                    login: entry.login.clone(),
                    secret: entry.password.clone(),
                    port: entry.port,
                }
            })
            .collect();

        Self::new(targets, servers)
    }

    pub fn resolve_server(&self, address: &str) -> Result<&ServerRecord, RegistryError> {
        self.by_address
            .get(address)
            .map(|&idx| &self.servers[idx])
            .ok_or_else(|| RegistryError::NotFound(address.to_string()))
    }

    pub fn targets(&self) -> &[MonitoredTarget] {
        &self.targets
    }

    pub fn servers(&self) -> &[ServerRecord] {
        &self.servers
    }

    pub fn targets_on<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a MonitoredTarget> {
        self.targets.iter().filter(move |t| t.address == address)
    }
}
