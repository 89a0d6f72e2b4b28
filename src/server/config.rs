//! Server configuration.

use std::net::SocketAddr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Enable request logging
    pub logging: bool,
    /// CORS enabled (permissive, demo deployment)
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".parse().unwrap(),
            logging: true,
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Create with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        let host = self.addr.ip();
        self.addr = SocketAddr::new(host, port);
        self
    }

    /// Bind to all interfaces
    pub fn bind_all(mut self) -> Self {
        let port = self.addr.port();
        self.addr = format!("0.0.0.0:{port}").parse().unwrap();
        self
    }

    /// Set address directly
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Disable logging
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }

    /// Disable CORS
    pub fn without_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ServerConfig::default().with_port(9000).bind_all().without_cors();

        assert_eq!(config.addr.port(), 9000);
        assert!(config.addr.ip().is_unspecified());
        assert!(!config.cors_enabled);
        assert!(config.logging);
    }
}
