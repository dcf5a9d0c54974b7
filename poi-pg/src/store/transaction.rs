//! Transaction atomique pour un lot de POI
//!
//! Garantit le rollback si le lot n'est pas explicitement commité.

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Transaction};
use tracing::{debug, error};

/// Transaction PostgreSQL couvrant exactement un lot
pub struct BatchTransaction<'a> {
    transaction: Transaction<'a>,
    batch: usize,
    rows: u64,
}

impl<'a> BatchTransaction<'a> {
    /// Démarre la transaction du lot `batch` (numéroté à partir de 1)
    pub async fn begin(client: &'a mut Object, batch: usize) -> Result<Self> {
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        debug!(batch, "Batch transaction started");

        Ok(Self {
            transaction,
            batch,
            rows: 0,
        })
    }

    /// Accède à la transaction sous-jacente pour exécuter des requêtes
    pub fn transaction(&self) -> &Transaction<'a> {
        &self.transaction
    }

    /// Comptabilise des lignes écrites dans ce lot
    pub fn record_rows(&mut self, rows: u64) {
        self.rows += rows;
    }

    /// Commit et retourne le nombre de lignes du lot
    pub async fn commit(self) -> Result<u64> {
        self.transaction
            .commit()
            .await
            .with_context(|| format!("Failed to commit batch {}", self.batch))?;

        debug!(batch = self.batch, rows = self.rows, "Batch transaction committed");
        Ok(self.rows)
    }

    /// Annule le lot. Sans appel explicite, le rollback a lieu au drop.
    pub async fn rollback(self, reason: &str) {
        error!(
            batch = self.batch,
            rows_attempted = self.rows,
            reason = %reason,
            "Rolling back batch"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }
    }
}
