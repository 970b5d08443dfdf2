use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_postgres::{Client, NoTls};

use super::{StorageMedium, StorageSlot};
use crate::error::{FrameworkError, Result};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS ff_storage (
        module VARCHAR(128) NOT NULL,
        storage_key VARCHAR(255) NOT NULL,
        payload BYTEA NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (module, storage_key)
    )
"#;

/// PostgreSQL implementation of [`StorageMedium`].
///
/// The blocking forms park the calling worker with `block_in_place`, so they
/// need a multi-threaded tokio runtime. On a current-thread runtime they fail
/// with [`FrameworkError::Runtime`].
pub struct PgStorage {
    client: Arc<Client>,
    runtime: Handle,
}

impl PgStorage {
    /// Connect once and make sure the table exists. Any failure here means
    /// the side cannot start.
    pub async fn connect(connection: &str) -> Result<Self> {
        let (client, conn) = tokio_postgres::connect(connection, NoTls)
            .await
            .map_err(|e| startup_failure("could not connect to the storage database", e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::error!(error = %e, "storage database connection closed");
            }
        });

        client
            .batch_execute(CREATE_TABLE)
            .await
            .map_err(|e| startup_failure("could not create the storage table", e))?;
        tracing::info!("storage table ff_storage ready");

        Ok(Self {
            client: Arc::new(client),
            runtime: Handle::current(),
        })
    }

    fn block_on<T, F: Future<Output = Result<T>>>(&self, fut: F) -> Result<T> {
        ensure_blocking_allowed()?;
        tokio::task::block_in_place(|| self.runtime.block_on(fut))
    }
}

/// Anything that goes wrong while connecting or preparing the table stops
/// the side from starting.
fn startup_failure(stage: &str, e: tokio_postgres::Error) -> FrameworkError {
    tracing::error!(error = %e, "FATAL: {}", stage);
    FrameworkError::Connectivity(format!("{}: {}", stage, e))
}

/// `block_in_place` cannot park a current-thread runtime's only worker.
fn ensure_blocking_allowed() -> Result<()> {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::CurrentThread) => Err(FrameworkError::Runtime(
            "blocking storage calls need a multi-threaded runtime; use the async forms".to_string(),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl StorageMedium for PgStorage {
    fn read(&self, slot: &StorageSlot) -> Result<Option<Vec<u8>>> {
        self.block_on(self.read_async(slot))
    }

    fn write(&self, slot: &StorageSlot, payload: &[u8]) -> Result<()> {
        self.block_on(self.write_async(slot, payload))
    }

    fn exists(&self, slot: &StorageSlot) -> Result<bool> {
        self.block_on(self.exists_async(slot))
    }

    fn delete(&self, slot: &StorageSlot) -> Result<()> {
        self.block_on(self.delete_async(slot))
    }

    async fn read_async(&self, slot: &StorageSlot) -> Result<Option<Vec<u8>>> {
        let row = self
            .client
            .query_opt(
                "SELECT payload FROM ff_storage WHERE module = $1 AND storage_key = $2",
                &[&slot.module(), &slot.key()],
            )
            .await?;

        Ok(row.map(|row| row.get("payload")))
    }

    async fn write_async(&self, slot: &StorageSlot, payload: &[u8]) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO ff_storage (module, storage_key, payload)
                VALUES ($1, $2, $3)
                ON CONFLICT (module, storage_key)
                DO UPDATE SET payload = EXCLUDED.payload, updated_at = now()
                "#,
                &[&slot.module(), &slot.key(), &payload],
            )
            .await?;

        Ok(())
    }

    async fn exists_async(&self, slot: &StorageSlot) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM ff_storage WHERE module = $1 AND storage_key = $2)",
                &[&slot.module(), &slot.key()],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn delete_async(&self, slot: &StorageSlot) -> Result<()> {
        self.client
            .execute(
                "DELETE FROM ff_storage WHERE module = $1 AND storage_key = $2",
                &[&slot.module(), &slot.key()],
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_storage_is_a_medium() {
        fn assert_medium<T: StorageMedium + 'static>() {}
        assert_medium::<PgStorage>();
    }

    #[tokio::test]
    async fn test_blocking_refused_on_current_thread_runtime() {
        let err = ensure_blocking_allowed().unwrap_err();
        assert!(matches!(err, FrameworkError::Runtime(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_allowed_on_multi_thread_runtime() {
        assert!(ensure_blocking_allowed().is_ok());
    }

    #[test]
    fn test_blocking_allowed_outside_a_runtime() {
        assert!(ensure_blocking_allowed().is_ok());
    }

    #[tokio::test]
    async fn test_startup_database_errors_are_fatal() {
        let db_error = tokio_postgres::connect("this is not a connection string", NoTls)
            .await
            .err()
            .unwrap();

        let err = startup_failure("could not create the storage table", db_error);
        assert!(matches!(&err, FrameworkError::Connectivity(msg) if msg.starts_with("could not create the storage table: ")));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_malformed_connection_string_is_connectivity_failure() {
        let err = PgStorage::connect("this is not a connection string")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FrameworkError::Connectivity(_)));
        assert!(err.is_fatal());
    }
}
