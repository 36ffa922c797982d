//! Liveness probing
//!
//! A service is alive when any of its candidate hosts answers HTTP at all.
//! The status code is not judged: a 500 still proves the process is up.

use crate::roster::Service;
use crate::sickbay::http::HttpClient;
use tracing::{debug, info, warn};

/// Result of probing one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// A candidate answered
    Alive { host: String, status: u16 },
    /// Every candidate failed
    Dead,
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Liveness::Alive { .. })
    }

    /// Host that answered, if any
    pub fn host(&self) -> Option<&str> {
        match self {
            Liveness::Alive { host, .. } => Some(host),
            Liveness::Dead => None,
        }
    }
}

impl std::fmt::Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Liveness::Alive { host, status } => write!(f, "alive via {} ({})", host, status),
            Liveness::Dead => write!(f, "dead"),
        }
    }
}

/// Probe a service's candidate hosts in order, stopping at the first answer
///
/// Does not touch the service's host hint; the caller decides what to keep.
pub async fn probe<H: HttpClient>(http: &H, service: &Service) -> Liveness {
    for host in service.candidates() {
        let url = service.url_for(&host);
        match http.get(&url).await {
            Ok(status) => {
                info!(service = service.name(), %url, status, "probe answered");
                return Liveness::Alive { host, status };
            }
            Err(e) if e.is_timeout() => {
                warn!(service = service.name(), %url, "probe timed out: {}", e);
            }
            Err(e) => {
                info!(service = service.name(), %url, "probe failed: {}", e);
            }
        }
    }

    debug!(service = service.name(), "all candidates exhausted");
    Liveness::Dead
}
