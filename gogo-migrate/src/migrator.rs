//! The migration runner.
//!
//! A [Migrator] owns the ordered migration list and a [VersionStore]. It walks
//! the version axis one step at a time: each step opens its own transaction,
//! runs one migration body, records the new version and commits. A failing step
//! is rolled back and ends the run; steps committed before it stay applied, so
//! running again resumes from the last recorded version.

use crate::config::MigrateConfig;
use crate::connection::{Connection, ManualCommit, Transaction};
use crate::dialect::Dialect;
use crate::error::{Error, TxAction};
use crate::migration::Migration;
use crate::tx::Tx;
use crate::version::{Bootstrap, VersionStore, DEFAULT_VERSION_TABLE};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// A report of actions performed during a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Whether this run created the version table.
    pub version_table_created: bool,
    pub starting_version: u32,
    pub final_version: u32,
    /// The migration versions applied or rolled back, in execution order.
    pub versions: Vec<u32>,
}

impl MigrationReport {
    fn starting_at(bootstrap: Bootstrap) -> Self {
        Self {
            version_table_created: bootstrap.created,
            starting_version: bootstrap.version,
            final_version: bootstrap.version,
            versions: Vec::new(),
        }
    }
}

/// Where a rollback should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Roll back until this version is reached.
    Absolute(u32),
    /// Roll back this many steps from the current version.
    Relative(u64),
}

impl Destination {
    /// Parse a rollback destination.
    ///
    /// An empty string means "no rollback requested" and yields `None`. A
    /// non-negative integer is an absolute version; a negative integer `-n` means
    /// `n` steps back from the current version.
    pub fn parse(input: &str) -> Result<Option<Self>, Error> {
        if input.is_empty() {
            return Ok(None);
        }
        let invalid = |reason: String| Error::InvalidDestination {
            input: input.to_string(),
            reason,
        };
        let value: i64 = input.parse().map_err(|e| invalid(format!("{e}")))?;
        if value < 0 {
            return Ok(Some(Self::Relative(value.unsigned_abs())));
        }
        u32::try_from(value)
            .map(|version| Some(Self::Absolute(version)))
            .map_err(|_| invalid(format!("{value} exceeds the largest version")))
    }

    /// The absolute version this destination names when the database is at `current`.
    pub fn resolve(self, current: u32) -> Result<u32, Error> {
        match self {
            Self::Absolute(version) => Ok(version),
            Self::Relative(steps) => {
                let destination = i128::from(current) - i128::from(steps);
                u32::try_from(destination).map_err(|_| Error::OutOfRange {
                    destination: i64::try_from(destination).unwrap_or(i64::MIN),
                    current,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Apply,
    Rollback,
}

impl Direction {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Rollback => "rollback",
        }
    }

    fn step_error(self, version: u32, source: Error) -> Error {
        let source = Box::new(source);
        match self {
            Self::Apply => Error::Apply { version, source },
            Self::Rollback => Error::Rollback { version, source },
        }
    }
}

/// The entrypoint for running a sequence of [Migration]s.
///
/// Construct it with a [Dialect] and the full, ordered list of migrations. The
/// first migration is version 1.
#[derive(Debug)]
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
    store: VersionStore,
}

impl Migrator {
    pub fn new(dialect: impl Dialect + 'static, migrations: Vec<Box<dyn Migration>>) -> Self {
        Self::with_dialect(Box::new(dialect), migrations)
    }

    pub fn with_dialect(dialect: Box<dyn Dialect>, migrations: Vec<Box<dyn Migration>>) -> Self {
        Self {
            migrations,
            store: VersionStore::new(dialect, DEFAULT_VERSION_TABLE),
        }
    }

    /// Build a migrator from configuration.
    pub fn from_config(config: &MigrateConfig, migrations: Vec<Box<dyn Migration>>) -> Self {
        Self::with_dialect(config.dialect(), migrations).with_version_table(&config.version_table)
    }

    /// Set a custom name for the version table. Defaults to `_gogo_migrations`.
    pub fn with_version_table(mut self, name: impl Into<String>) -> Self {
        self.store = self.store.with_table(name);
        self
    }

    pub fn migrations(&self) -> &[Box<dyn Migration>] {
        &self.migrations
    }

    pub fn version_store(&self) -> &VersionStore {
        &self.store
    }

    /// The version reached once every migration has been applied.
    pub fn latest_version(&self) -> u32 {
        u32::try_from(self.migrations.len()).unwrap_or(u32::MAX)
    }

    /// Get the current version, creating the version table if it does not exist.
    /// Returns 0 if no migrations have been applied.
    pub fn current_version<C: Connection>(&self, conn: &mut C) -> Result<u32, Error> {
        self.store.dialect().pre_migrate(conn)?;
        Ok(self.bootstrap(conn)?.version)
    }

    /// The versions [Migrator::migrate] would apply, in order, without changing
    /// the database.
    pub fn pending<C: Connection>(&self, conn: &mut C) -> Result<Vec<u32>, Error> {
        let current = self.store.stored_version(conn)?.unwrap_or(0);
        Ok((current.saturating_add(1)..=self.latest_version()).collect())
    }

    /// Apply every migration after the current version.
    ///
    /// On failure the failing step is rolled back and the error names its
    /// version; earlier steps of the run stay committed.
    pub fn migrate<C: Connection>(&self, conn: &mut C) -> Result<MigrationReport, Error> {
        let mut session = ManualCommit::enter(conn)?;
        let outcome = self.migrate_inner(session.conn(), self.latest_version());
        finish(outcome, session.release())
    }

    /// Apply migrations up to and including version `target`. A database already
    /// at or past `target` is left unchanged.
    pub fn migrate_to<C: Connection>(
        &self,
        conn: &mut C,
        target: u32,
    ) -> Result<MigrationReport, Error> {
        if target > self.latest_version() {
            return Err(Error::UnknownVersion {
                version: target,
                known: self.migrations.len(),
            });
        }
        let mut session = ManualCommit::enter(conn)?;
        let outcome = self.migrate_inner(session.conn(), target);
        finish(outcome, session.release())
    }

    /// Roll back to the destination described by `destination`
    /// (see [Destination::parse]). An empty string does nothing and returns `None`.
    pub fn rollback<C: Connection>(
        &self,
        conn: &mut C,
        destination: &str,
    ) -> Result<Option<MigrationReport>, Error> {
        match Destination::parse(destination)? {
            Some(destination) => self.rollback_to(conn, destination).map(Some),
            None => Ok(None),
        }
    }

    /// Roll back one migration at a time until `destination` is reached.
    pub fn rollback_to<C: Connection>(
        &self,
        conn: &mut C,
        destination: Destination,
    ) -> Result<MigrationReport, Error> {
        let mut session = ManualCommit::enter(conn)?;
        let outcome = self.rollback_inner(session.conn(), destination);
        finish(outcome, session.release())
    }

    fn migrate_inner<C: Connection>(
        &self,
        conn: &mut C,
        target: u32,
    ) -> Result<MigrationReport, Error> {
        self.store.dialect().pre_migrate(conn)?;
        let bootstrap = self.bootstrap(conn)?;
        let mut report = MigrationReport::starting_at(bootstrap);
        let mut version = bootstrap.version;

        #[cfg(feature = "tracing")]
        {
            if version > self.latest_version() {
                tracing::warn!(
                    current_version = version,
                    known_migrations = self.migrations.len(),
                    "Database is ahead of the supplied migrations"
                );
            }
            tracing::debug!(
                current_version = version,
                target_version = target,
                "Considering migrations to run"
            );
        }

        while version < target {
            let migration = &self.migrations[version as usize];
            let next = version + 1;
            self.step(conn, Direction::Apply, next, next, migration.as_ref())?;
            version = next;
            report.versions.push(version);
        }

        report.final_version = version;
        self.store.dialect().post_migrate(conn)?;
        Ok(report)
    }

    fn rollback_inner<C: Connection>(
        &self,
        conn: &mut C,
        destination: Destination,
    ) -> Result<MigrationReport, Error> {
        self.store.dialect().pre_migrate(conn)?;
        let bootstrap = self.bootstrap(conn)?;
        let mut report = MigrationReport::starting_at(bootstrap);
        let mut version = bootstrap.version;

        let target = destination.resolve(version)?;
        if version < 1 {
            return Err(Error::NothingToRollBack(version));
        }
        if version > target && version > self.latest_version() {
            return Err(Error::UnknownVersion {
                version,
                known: self.migrations.len(),
            });
        }

        #[cfg(feature = "tracing")]
        tracing::info!(current_version = version, target_version = target, "Rolling back");

        while version > target {
            let migration = &self.migrations[(version - 1) as usize];
            self.step(conn, Direction::Rollback, version, version - 1, migration.as_ref())?;
            report.versions.push(version);
            version -= 1;
        }

        report.final_version = version;
        self.store.dialect().post_migrate(conn)?;
        Ok(report)
    }

    // Look up (and if needed create) the version row in its own transaction, so a
    // half-created table is never left behind.
    fn bootstrap<C: Connection>(&self, conn: &mut C) -> Result<Bootstrap, Error> {
        let mut tx = conn.begin().map_err(|e| self.store.bootstrap_error(e))?;
        match self.store.bootstrap(&mut tx) {
            Ok(bootstrap) => {
                tx.commit().map_err(|e| self.store.bootstrap_error(e))?;
                Ok(bootstrap)
            }
            Err(error) => {
                rollback_quietly(tx);
                Err(error)
            }
        }
    }

    /// Run one migration body in its own transaction and record `record` as the
    /// new version. `version` is the migration being applied or rolled back.
    fn step<C: Connection>(
        &self,
        conn: &mut C,
        direction: Direction,
        version: u32,
        record: u32,
        migration: &dyn Migration,
    ) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "migration",
            version,
            direction = direction.as_str(),
            description = migration.description().unwrap_or_default()
        )
        .entered();
        #[cfg(feature = "tracing")]
        tracing::info!("Starting migration step");

        let started = Instant::now();
        let mut tx = conn.begin().map_err(|e| Error::Transaction {
            action: TxAction::Begin,
            version,
            source: Box::new(e),
        })?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut handle = Tx::new(&mut tx);
            match direction {
                Direction::Apply => migration.apply(&mut handle),
                Direction::Rollback => migration.rollback(&mut handle),
            }
        }))
        .unwrap_or_else(|payload| Err(panic_error(payload)));

        if let Err(error) = outcome {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %error, "Migration step failed");
            rollback_quietly(tx);
            return Err(direction.step_error(version, error));
        }

        if let Err(error) = self.store.record_version(&mut tx, record) {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %error, "Recording version failed");
            rollback_quietly(tx);
            return Err(Error::VersionUpdate {
                version: record,
                source: Box::new(error),
            });
        }

        tx.commit().map_err(|e| Error::Transaction {
            action: TxAction::Commit,
            version,
            source: Box::new(e),
        })?;

        let _elapsed = started.elapsed();
        #[cfg(feature = "tracing")]
        tracing::info!(
            duration_ms = _elapsed.as_millis(),
            "Migration step completed"
        );
        Ok(())
    }
}

// A failure to roll back is logged and never replaces the error that caused it.
fn rollback_quietly<T: Transaction>(tx: T) {
    if let Err(_error) = tx.rollback() {
        #[cfg(feature = "tracing")]
        tracing::error!(error = %_error, "Rolling back step transaction failed");
    }
}

// The run's own error wins over a failure to restore auto-commit.
fn finish<T>(outcome: Result<T, Error>, restored: Result<(), Error>) -> Result<T, Error> {
    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) => Err(error),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(_restore)) => {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_restore, "Failed to restore auto-commit mode");
            Err(error)
        }
    }
}

/// Turn a panic payload from a migration body into an error.
fn panic_error(payload: Box<dyn Any + Send>) -> Error {
    let payload = match payload.downcast::<Error>() {
        Ok(error) => return *error,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<Box<dyn std::error::Error + Send + Sync>>() {
        Ok(error) => return Error::Panicked(error.to_string()),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<String>() {
        Ok(message) => return Error::Panicked(*message),
        Err(payload) => payload,
    };
    match payload.downcast::<&'static str>() {
        Ok(message) => Error::Panicked((*message).to_string()),
        Err(_) => Error::UnexpectedPanic,
    }
}
