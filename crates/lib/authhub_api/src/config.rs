//! API server configuration.

use authhub_core::token::resolve_global_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Global JWT signing secret (hub-scoped tokens).
    pub jwt_secret: String,
    /// Master value for the secret vault (per-service signing secrets).
    pub master_key: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                                      |
    /// |--------------------|----------------------------------------------|
    /// | `BIND_ADDR`        | `127.0.0.1:3200`                             |
    /// | `DATABASE_URL`     | `postgres://localhost:5432/authhub`          |
    /// | `JWT_SECRET` / `AUTHHUB_SECRET` | generated & persisted to file   |
    /// | `MASTER_KEY`       | dev-only placeholder                         |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/authhub".into()),
            jwt_secret: resolve_global_secret(),
            master_key: std::env::var("MASTER_KEY")
                .unwrap_or_else(|_| "authhub-default-dev-key-change-in-production".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_reads_overrides() {
        unsafe {
            std::env::set_var("BIND_ADDR", "0.0.0.0:4000");
            std::env::set_var("JWT_SECRET", "cfg-test-secret");
            std::env::set_var("MASTER_KEY", "cfg-test-master");
        }

        let cfg = ApiConfig::from_env();
        assert_eq!(cfg.bind_addr, "0.0.0.0:4000");
        assert_eq!(cfg.jwt_secret, "cfg-test-secret");
        assert_eq!(cfg.master_key, "cfg-test-master");
    }
}
