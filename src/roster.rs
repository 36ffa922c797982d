//! Service registry
//!
//! The fixed table of monitored services. Names and ports never change after
//! startup; only the host hint moves, and only from the task probing that
//! service in the current cycle.

use crate::manifest::CrowsnestConfig;
use std::sync::{Arc, RwLock};

/// A monitored service and its probe state
#[derive(Debug)]
pub struct Service {
    name: String,
    port: u16,
    /// Host that answered last time
    hint: RwLock<String>,
}

impl Service {
    pub fn new(name: &str, port: u16, default_host: &str) -> Self {
        Self {
            name: name.to_string(),
            port,
            hint: RwLock::new(default_host.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current host hint
    pub fn host_hint(&self) -> String {
        self.hint
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Remember the host that answered
    pub fn set_host_hint(&self, host: &str) {
        let mut hint = self
            .hint
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *hint != host {
            *hint = host.to_string();
        }
    }

    /// Hosts to try, hint first, then the service name
    pub fn candidates(&self) -> Vec<String> {
        let hint = self.host_hint();
        if hint == self.name {
            vec![hint]
        } else {
            vec![hint, self.name.clone()]
        }
    }

    /// Probe URL for a candidate host
    pub fn url_for(&self, host: &str) -> String {
        format!("http://{}:{}/", host, self.port)
    }
}

/// All monitored services, in configuration order
#[derive(Debug, Default)]
pub struct Roster {
    services: Vec<Arc<Service>>,
}

impl Roster {
    pub fn new(services: Vec<Service>) -> Self {
        Self {
            services: services.into_iter().map(Arc::new).collect(),
        }
    }

    /// Build the roster from a validated configuration
    pub fn from_config(config: &CrowsnestConfig) -> Self {
        Self::new(
            config
                .services
                .iter()
                .map(|def| Service::new(&def.name, def.port, &config.config.default_host))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.iter()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }
}
