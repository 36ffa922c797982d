//! HTTP client used by liveness probes

use crate::error::{Error, Result};
use std::future::Future;
use std::io;
use std::time::Duration;
use ureq::Agent;

/// A GET-only HTTP client with a fixed per-request timeout
pub trait HttpClient: Send + Sync + 'static {
    /// Issue a GET and return the status code of whatever answered
    ///
    /// Timeouts surface as [`Error::ProbeTimeout`], everything else that
    /// prevents a response as [`Error::ProbeTransport`].
    fn get(&self, url: &str) -> impl Future<Output = Result<u16>> + Send;
}

/// Blocking ureq agent driven from tokio's blocking pool
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: Agent,
    timeout: Duration,
}

impl UreqClient {
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, timeout }
    }

    fn classify(&self, url: &str, err: ureq::Error) -> Error {
        match err {
            ureq::Error::Timeout(_) => Error::ProbeTimeout {
                url: url.to_string(),
                timeout: self.timeout,
            },
            ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => Error::ProbeTimeout {
                url: url.to_string(),
                timeout: self.timeout,
            },
            other => Error::ProbeTransport {
                url: url.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl HttpClient for UreqClient {
    async fn get(&self, url: &str) -> Result<u16> {
        let agent = self.agent.clone();
        let target = url.to_string();

        // The body is never read, only the fact that something answered.
        let outcome = tokio::task::spawn_blocking(move || {
            agent
                .get(target.as_str())
                .call()
                .map(|response| response.status().as_u16())
        })
        .await
        .map_err(|e| Error::ProbeTransport {
            url: url.to_string(),
            message: format!("probe task failed: {}", e),
        })?;

        outcome.map_err(|e| self.classify(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one canned response on an ephemeral port
    fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        port
    }

    #[tokio::test]
    async fn test_any_status_is_an_answer() {
        let port = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let client = UreqClient::new(Duration::from_secs(3));

        let status = client
            .get(&format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap();
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = UreqClient::new(Duration::from_secs(3));

        let err = client
            .get(&format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProbeTransport { .. }));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and hold the connection without answering
        std::thread::spawn(move || {
            let held = listener.accept();
            std::thread::sleep(Duration::from_secs(2));
            drop(held);
        });

        let client = UreqClient::new(Duration::from_millis(200));
        let err = client
            .get(&format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }
}
