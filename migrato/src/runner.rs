use parking_lot::RwLock;
use std::sync::Arc;

use migrato_store::{Engine, MigrationStatus};
use tracing::{debug, error, warn};

use crate::{
    error::{Error, Result},
    migration::Migration,
    migrator::{ExecutionReport, Migrator},
    validator::validate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    /// The startup hook fired but had nothing to do.
    Disabled,
    Running,
    Completed,
    Failed,
}

/// Runs the configured migrations when the host application starts.
///
/// An error from the migrator is returned from [`Runner::on_startup`] as is,
/// the host is expected to abort its startup rather than serve a partially
/// migrated store.
#[derive(Clone)]
pub struct Runner<E: Engine> {
    migrator: Migrator<E>,
    migrations: Vec<Migration<E>>,
    state: Arc<RwLock<RunnerState>>,
}

impl<E: Engine> Runner<E> {
    pub fn new(migrator: Migrator<E>, migrations: Vec<Migration<E>>) -> Self {
        Self {
            migrator,
            migrations,
            state: Arc::new(RwLock::new(RunnerState::Idle)),
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.read()
    }

    pub fn migrator(&self) -> &Migrator<E> {
        &self.migrator
    }

    pub fn migrations(&self) -> &[Migration<E>] {
        &self.migrations
    }

    /// Startup hook. Does nothing unless migrations are enabled, supplied and
    /// configured to run on startup.
    pub async fn on_startup(&self) -> Result<()> {
        let config = self.migrator.get_config();

        if !config.enabled {
            debug!("migrations are disabled, skipping startup run");
        } else if self.migrations.is_empty() {
            debug!("no migrations configured, skipping startup run");
        } else if !config.run_on_startup {
            debug!("migrations are not configured to run on startup");
        } else {
            self.run().await?;

            return Ok(());
        }

        *self.state.write() = RunnerState::Disabled;

        Ok(())
    }

    /// Runs the migrations now, whether or not they run on startup.
    pub async fn run_migrations(&self) -> Result<ExecutionReport> {
        let config = self.migrator.get_config();

        if !config.enabled {
            return Err(Error::Config("migrations are disabled".to_owned()));
        }

        if self.migrations.is_empty() {
            return Err(Error::Config("no migrations configured".to_owned()));
        }

        self.run().await
    }

    async fn run(&self) -> Result<ExecutionReport> {
        *self.state.write() = RunnerState::Running;

        match self.execute().await {
            Ok(report) => {
                *self.state.write() = RunnerState::Completed;

                Ok(report)
            }
            Err(err) => {
                error!(error = %err, "migration run failed");
                *self.state.write() = RunnerState::Failed;

                Err(err)
            }
        }
    }

    async fn execute(&self) -> Result<ExecutionReport> {
        let config = self.migrator.get_config();

        validate(&self.migrations, config.max_name_length)?;

        let failed = self
            .migrator
            .store()
            .records_with_status(MigrationStatus::Failed)
            .await?;

        if !failed.is_empty() {
            let names = failed
                .iter()
                .map(|record| record.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");

            warn!(
                migrations = %names,
                "failed migrations from previous runs must be cleaned up before they are retried"
            );
        }

        self.migrator
            .cleanup_stuck_migrations(config.stuck_timeout())
            .await?;

        self.migrator
            .execute_cleaned(&self.migrations, config.use_transaction)
            .await
    }
}
