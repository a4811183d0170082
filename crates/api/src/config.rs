use reconcile_core::registry::DEFAULT_BREEDING_METHODS;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted upload body in bytes (default: 10 MiB).
    pub max_upload_bytes: usize,
    /// Postgres URL for the job table. Jobs stay in memory when unset.
    pub database_url: Option<String>,
    /// BrAPI v2 base URL. An in-memory store is used when unset.
    pub brapi_url: Option<String>,
    /// Bearer token for the BrAPI server.
    pub brapi_token: Option<String>,
    /// Source written into every external reference this service creates.
    pub reference_source: String,
    /// Finished jobs older than this are deleted (default: one day).
    pub job_ttl_secs: u64,
    /// Accepted breeding-method codes for germplasm uploads.
    pub breeding_methods: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `MAX_UPLOAD_BYTES`     | `10485760`                 |
    /// | `DATABASE_URL`         | unset (in-memory jobs)     |
    /// | `BRAPI_URL`            | unset (in-memory store)    |
    /// | `BRAPI_TOKEN`          | unset                      |
    /// | `REFERENCE_SOURCE`     | `reconcile.local`          |
    /// | `JOB_TTL_SECS`         | `86400`                    |
    /// | `BREEDING_METHODS`     | built-in code list         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let job_ttl_secs: u64 = std::env::var("JOB_TTL_SECS")
            .unwrap_or_else(|_| "86400".into())
            .parse()
            .expect("JOB_TTL_SECS must be a valid u64");

        let reference_source =
            std::env::var("REFERENCE_SOURCE").unwrap_or_else(|_| "reconcile.local".into());

        let breeding_methods = std::env::var("BREEDING_METHODS")
            .map(|v| split_list(&v))
            .ok()
            .filter(|methods| !methods.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_BREEDING_METHODS
                    .iter()
                    .map(|m| m.to_string())
                    .collect()
            });

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            database_url: non_empty_var("DATABASE_URL"),
            brapi_url: non_empty_var("BRAPI_URL"),
            brapi_token: non_empty_var("BRAPI_TOKEN"),
            reference_source,
            job_ttl_secs,
            breeding_methods,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(split_list("").is_empty());
    }
}
