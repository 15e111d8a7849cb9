//! Database layer for Ragline
//!
//! Provides:
//! - Connection pool management for the vectorstore
//! - Bounded startup wait for PostgreSQL
//! - One-shot connectivity probes for health checks

use crate::config::Settings;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sqlx::{Connection, PgConnection};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attempts made by [`wait_for_postgres`] before giving up
pub const STARTUP_MAX_ATTEMPTS: u32 = 30;

/// Fixed delay between startup attempts
pub const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fixed-interval retry policy for startup checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: STARTUP_MAX_ATTEMPTS,
            delay: STARTUP_RETRY_DELAY,
        }
    }
}

/// Open a fresh connection and close it again.
///
/// Never reuses a pooled connection, so the result reflects whether the
/// server accepts new connections right now.
pub async fn connect_once(url: &str) -> Result<()> {
    let conn = PgConnection::connect(url).await?;
    conn.close().await?;
    Ok(())
}

/// Block until PostgreSQL accepts connections, or fail after the bound
pub async fn wait_for_postgres(url: &str, policy: RetryPolicy) -> Result<()> {
    let attempts = retry_until_ready(policy, || connect_once(url)).await?;
    info!(attempts, "PostgreSQL connection established");
    Ok(())
}

/// Run `attempt` until it succeeds or `policy.max_attempts` is reached.
///
/// Returns the number of attempts used. Sleeps `policy.delay` after every
/// failure, including the last one.
pub async fn retry_until_ready<F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for n in 1..=policy.max_attempts {
        match attempt().await {
            Ok(()) => return Ok(n),
            Err(e) => {
                warn!(
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Waiting for PostgreSQL"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }

    Err(AppError::DatabaseUnavailable {
        attempts: policy.max_attempts,
    })
}

/// Connectivity probe for health checks. Never fails; timeouts count as down.
pub async fn probe(url: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, connect_once(url)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Health probe failed");
            false
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Health probe timed out");
            false
        }
    }
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<DatabaseConnection>,
}

impl DbPool {
    /// Create a new connection pool from settings
    pub async fn new(settings: &Settings) -> Result<Self> {
        info!(
            host = %settings.postgres_host,
            port = settings.postgres_port,
            database = %settings.postgres_db,
            "Connecting to database..."
        );

        let mut opts = ConnectOptions::new(settings.database_url());
        opts.max_connections(settings.max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(settings.debug);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database pool established");

        Ok(Self { conn: Arc::new(conn) })
    }

    #[cfg(test)]
    pub(crate) fn from_connection(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Get the pooled connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database through the pool
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: STARTUP_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }

    fn refused() -> AppError {
        AppError::DatabaseConnection {
            message: "connection refused".into(),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_returns_on_first_success() {
        let calls = AtomicU32::new(0);
        let used = assert_ok!(
            retry_until_ready(fast_policy(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
        );

        assert_eq!(used, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let calls = AtomicU32::new(0);
        let used = retry_until_ready(fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { if n < 4 { Err(refused()) } else { Ok(()) } }
        })
        .await
        .unwrap();

        assert_eq!(used, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let result = retry_until_ready(fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(refused()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(AppError::DatabaseUnavailable { attempts: 30 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_wait_for_unreachable_database_fails() {
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
        };
        let err = assert_err!(wait_for_postgres("postgresql://u:p@127.0.0.1:1/d", policy).await);
        assert!(matches!(err, AppError::DatabaseUnavailable { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_probe_reports_unreachable_database() {
        let up = probe("postgresql://u:p@127.0.0.1:1/d", Duration::from_secs(5)).await;
        assert!(!up);
    }
}
