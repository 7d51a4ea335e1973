//! Search client configuration.

use std::time::Duration;

/// Configuration for the OpenSearch transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OpenSearch URL(s).
    pub urls: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout, forwarded to the transport. The core performs no
    /// retry of its own; a timed-out request surfaces as a transport error.
    pub request_timeout: Duration,
    /// AWS region for Amazon OpenSearch Service. Configuration only;
    /// SigV4 request signing is not wired into the transport yet.
    #[cfg(feature = "aws-auth")]
    pub aws_region: Option<String>,
}

impl ClientConfig {
    /// Create a new configuration with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            #[cfg(feature = "aws-auth")]
            aws_region: None,
        }
    }

    /// Create configuration with multiple URLs for a cluster.
    pub fn cluster(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::new("")
        }
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set AWS region for Amazon OpenSearch Service.
    #[cfg(feature = "aws-auth")]
    pub fn with_aws_region(mut self, region: impl Into<String>) -> Self {
        self.aws_region = Some(region.into());
        self
    }
}
