use chrono::{DateTime, Duration, Utc};
use migrato_store::{
    Engine, MigrationRecord, MigrationStatus, RecordPatch, RecordQuery, Store, WriteRecord,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    context::{Context, MigrationContext},
    error::{Error, Result},
    migration::Migration,
    validator::{validate, ValidationError},
};

/// Names touched by one [`Migrator::execute_migrations`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Migrations whose `up` handler ran and completed, in execution order.
    pub executed: Vec<String>,

    /// Migrations another runner had already claimed.
    pub skipped: Vec<String>,
}

impl ExecutionReport {
    fn push(&mut self, name: &str, outcome: Outcome) {
        match outcome {
            Outcome::Executed => self.executed.push(name.to_owned()),
            Outcome::Skipped => self.skipped.push(name.to_owned()),
        }
    }
}

/// A defined migration and its record status. `None` means pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub name: String,
    pub status: Option<MigrationStatus>,
}

enum Outcome {
    Executed,
    Skipped,
}

/// Applies migrations exactly once.
///
/// Execution is sequential, in ascending name order. Concurrent runners, in
/// this process or another, are kept apart by the store alone: inserting the
/// `RUNNING` record of a migration is its claim, and the unique name makes
/// every other insert of the same name fail. A runner losing the claim skips
/// the migration without error.
#[derive(Clone)]
pub struct Migrator<E: Engine> {
    store: Store<E>,
    context: MigrationContext,
    config: Config,
}

impl<E: Engine> Migrator<E> {
    pub fn new(store: Store<E>) -> Self {
        Self {
            store,
            context: MigrationContext::default(),
            config: Config::default(),
        }
    }

    /// Replaces the configuration. The store is pointed at
    /// `config.table_name`.
    ///
    /// Fails with [`Error::Config`] when the table name is not a plain
    /// identifier or the stuck timeout is not a positive number of minutes.
    pub fn config(mut self, config: Config) -> Result<Self> {
        stuck_threshold(config.stuck_timeout())?;

        self.store = self
            .store
            .table_name(&config.table_name)
            .map_err(|err| Error::Config(err.to_string()))?;
        self.config = config;

        Ok(self)
    }

    /// Replaces the values handed to handlers.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = MigrationContext::new(context);

        self
    }

    /// Makes `value` available to handlers through their context.
    pub fn data<D: Send + Sync + 'static>(self, value: D) -> Self {
        self.context.insert(value);

        self
    }

    pub fn store(&self) -> &Store<E> {
        &self.store
    }

    pub fn context(&self) -> &MigrationContext {
        &self.context
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    /// Runs every migration of `migrations` that is neither completed nor
    /// running.
    ///
    /// The batch is validated first and rejected as a whole, before any
    /// record is touched. Abandoned claims older than the configured timeout
    /// are then marked `STUCK`.
    ///
    /// With `use_transaction`, the pending migrations share one transaction:
    /// when one fails, the writes of the whole call are rolled back and only
    /// the failure is recorded. Without it, each migration commits on its own
    /// and a failure leaves the ones before it completed.
    ///
    /// The first failing handler stops the batch and its error is returned
    /// unchanged, after its record was marked `FAILED`.
    pub async fn execute_migrations(
        &self,
        migrations: &[Migration<E>],
        use_transaction: bool,
    ) -> Result<ExecutionReport> {
        self.execute(migrations, use_transaction, true).await
    }

    /// [`Migrator::execute_migrations`] for callers that just ran
    /// [`Migrator::cleanup_stuck_migrations`] themselves.
    pub(crate) async fn execute_cleaned(
        &self,
        migrations: &[Migration<E>],
        use_transaction: bool,
    ) -> Result<ExecutionReport> {
        self.execute(migrations, use_transaction, false).await
    }

    async fn execute(
        &self,
        migrations: &[Migration<E>],
        use_transaction: bool,
        cleanup_stuck: bool,
    ) -> Result<ExecutionReport> {
        validate(migrations, self.config.max_name_length)?;

        let mut sorted = migrations.iter().collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        if cleanup_stuck {
            self.cleanup_stuck_migrations(self.config.stuck_timeout())
                .await?;
        }

        let claimed = self
            .store
            .records()
            .await?
            .into_iter()
            .filter(|record| {
                matches!(
                    record.status,
                    MigrationStatus::Completed | MigrationStatus::Running
                )
            })
            .map(|record| record.name)
            .collect::<HashSet<_>>();

        let pending = sorted
            .into_iter()
            .filter(|migration| !claimed.contains(&migration.name))
            .collect::<Vec<_>>();

        if pending.is_empty() {
            debug!("no pending migrations");

            return Ok(ExecutionReport::default());
        }

        info!(
            pending = pending.len(),
            use_transaction, "executing pending migrations"
        );

        let report = if use_transaction {
            self.execute_in_transaction(&pending).await?
        } else {
            self.execute_each(&pending).await?
        };

        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            "migrations executed"
        );

        Ok(report)
    }

    async fn execute_each(&self, pending: &[&Migration<E>]) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();

        for migration in pending {
            let outcome = self.execute_single(migration, None).await?;
            report.push(&migration.name, outcome);
        }

        Ok(report)
    }

    async fn execute_in_transaction(&self, pending: &[&Migration<E>]) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();
        let mut tx = self.store.begin().await?;

        for migration in pending {
            let res = self.execute_single(migration, Some(&mut tx)).await;

            match res {
                Ok(outcome) => report.push(&migration.name, outcome),
                Err(err) => {
                    if let Err(rollback_err) = self.store.rollback(tx).await {
                        error!(error = %rollback_err, "failed to roll back migration batch");
                    }

                    // The FAILED mark went away with the rollback.
                    if let Some(name) = err.migration() {
                        self.record_failure(name).await;
                    }

                    return Err(err);
                }
            }
        }

        self.store.commit(tx).await?;

        Ok(report)
    }

    async fn execute_single(
        &self,
        migration: &Migration<E>,
        mut tx: Option<&mut E::Transaction>,
    ) -> Result<Outcome> {
        let name = migration.name.as_str();

        let Some(up) = migration.up.as_ref() else {
            return Err(ValidationError::MissingUp(name.to_owned()).into());
        };

        match self
            .store
            .create(WriteRecord::new(name), tx.as_deref_mut())
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_unique_violation() => {
                info!(migration = name, "migration already claimed, skipping");

                return Ok(Outcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        }

        debug!(migration = name, "executing migration");

        match up.handle(&self.context, tx.as_deref_mut()).await {
            Ok(()) => {
                self.store
                    .update(name, RecordPatch::completed(Utc::now()), tx)
                    .await?;

                info!(migration = name, "migration completed");

                Ok(Outcome::Executed)
            }
            Err(source) => {
                error!(migration = name, error = %source, "migration failed");

                if let Err(err) = self
                    .store
                    .update(name, RecordPatch::failed(Utc::now()), tx)
                    .await
                {
                    error!(migration = name, error = %err, "failed to mark migration as failed");
                }

                Err(Error::handler(name, source))
            }
        }
    }

    /// Writes a `FAILED` record for a migration whose claim was rolled back
    /// with its batch.
    async fn record_failure(&self, name: &str) {
        let record = WriteRecord::new(name)
            .status(MigrationStatus::Failed)
            .failed_at(Utc::now());

        match self.store.create(record, None).await {
            Ok(_) => {}
            Err(err) if err.is_unique_violation() => {
                warn!(
                    migration = name,
                    "migration claimed by another runner after batch rollback"
                );
            }
            Err(err) => {
                error!(migration = name, error = %err, "failed to mark migration as failed");
            }
        }
    }

    /// Marks every `RUNNING` record claimed more than `timeout_minutes` ago as
    /// `STUCK`. Handlers are not invoked. Returns the names reclassified.
    ///
    /// A timeout that is not positive, or too large to subtract from now, is
    /// an [`Error::Config`].
    pub async fn cleanup_stuck_migrations(&self, timeout_minutes: i64) -> Result<Vec<String>> {
        let threshold = stuck_threshold(timeout_minutes)?;

        debug!(timeout_minutes, "scanning for stuck migrations");

        let running = self
            .store
            .records_with_status(MigrationStatus::Running)
            .await?;

        let mut stuck = Vec::new();

        for record in running
            .into_iter()
            .filter(|record| record.claimed_at() < threshold)
        {
            self.store
                .update(&record.name, RecordPatch::stuck(Utc::now()), None)
                .await?;

            warn!(
                migration = %record.name,
                started_at = %record.claimed_at(),
                timeout_minutes,
                "migration stuck in RUNNING, marked as STUCK"
            );

            stuck.push(record.name);
        }

        Ok(stuck)
    }

    /// Deletes `FAILED` records, all of them or the one named, so those
    /// migrations run again on the next call. Returns how many were deleted.
    pub async fn cleanup_failed_migrations(&self, name: Option<&str>) -> Result<u64> {
        self.delete_with_status(MigrationStatus::Failed, name).await
    }

    /// Deletes `STUCK` records, all of them or the one named. Only do this
    /// once the runner owning the claim is known to be gone.
    pub async fn cleanup_stuck_records(&self, name: Option<&str>) -> Result<u64> {
        self.delete_with_status(MigrationStatus::Stuck, name).await
    }

    async fn delete_with_status(&self, status: MigrationStatus, name: Option<&str>) -> Result<u64> {
        let mut query = RecordQuery::new().status(status);

        if let Some(name) = name {
            query = query.name(name);
        }

        let deleted = self.store.delete(query, None).await?;

        info!(%status, name, deleted, "migration records cleaned up");

        Ok(deleted)
    }

    /// Runs the `down` handler of `name` and deletes its record, both in one
    /// transaction.
    ///
    /// When `down` fails the transaction is rolled back, the record is then
    /// marked `FAILED` on its own and the handler's error is returned.
    pub async fn rollback_migration(&self, name: &str, migrations: &[Migration<E>]) -> Result<()> {
        let Some(migration) = migrations.iter().find(|migration| migration.name == name) else {
            return Err(Error::MigrationNotFound(name.to_owned()));
        };

        let Some(down) = migration.down.as_ref() else {
            return Err(Error::MissingDown(name.to_owned()));
        };

        let mut tx = self.store.begin().await?;

        if let Err(source) = down.handle(&self.context, Some(&mut tx)).await {
            error!(migration = name, error = %source, "migration rollback failed");

            if let Err(err) = self.store.rollback(tx).await {
                error!(migration = name, error = %err, "failed to roll back transaction");
            }

            if let Err(err) = self
                .store
                .update(name, RecordPatch::failed(Utc::now()), None)
                .await
            {
                error!(migration = name, error = %err, "failed to mark migration as failed");
            }

            return Err(Error::handler(name, source));
        }

        self.store
            .delete(RecordQuery::new().name(name), Some(&mut tx))
            .await?;
        self.store.commit(tx).await?;

        info!(migration = name, "migration rolled back");

        Ok(())
    }

    /// Completed migrations, by name.
    pub async fn get_executed_migrations(&self) -> Result<Vec<MigrationRecord>> {
        Ok(self
            .store
            .records_with_status(MigrationStatus::Completed)
            .await?)
    }

    pub async fn get_executed_migration_list(&self) -> Result<Vec<String>> {
        Ok(self
            .get_executed_migrations()
            .await?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    pub async fn is_migration_executed(&self, name: &str) -> Result<bool> {
        Ok(self
            .store
            .get(name, None)
            .await?
            .map_or(false, |record| record.is_executed()))
    }

    /// Status of each defined migration, by name.
    pub async fn status(&self, migrations: &[Migration<E>]) -> Result<Vec<MigrationState>> {
        let statuses = self
            .store
            .records()
            .await?
            .into_iter()
            .map(|record| (record.name, record.status))
            .collect::<HashMap<_, _>>();

        let mut states = migrations
            .iter()
            .map(|migration| MigrationState {
                name: migration.name.to_owned(),
                status: statuses.get(&migration.name).copied(),
            })
            .collect::<Vec<_>>();

        states.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(states)
    }
}

/// Instant before which a `RUNNING` claim is stuck.
fn stuck_threshold(timeout_minutes: i64) -> Result<DateTime<Utc>> {
    if timeout_minutes <= 0 {
        return Err(Error::Config(format!(
            "stuck timeout must be a positive number of minutes, got {timeout_minutes}"
        )));
    }

    Duration::try_minutes(timeout_minutes)
        .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
        .ok_or_else(|| {
            Error::Config(format!(
                "stuck timeout of {timeout_minutes} minutes is out of range"
            ))
        })
}
