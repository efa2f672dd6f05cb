use crate::error::Error;
use crate::tx::Tx;

/// A trait that must be implemented to define a migration.
///
/// A migration's version is its position in the list handed to the
/// [Migrator](crate::Migrator): the first migration is version 1, the second
/// version 2, and so on. Once a migration has been applied to any database it
/// must keep its position; append new migrations to the end of the list.
///
/// Both bodies run inside a transaction that is committed only if the body
/// returns `Ok` and the version row is updated. Returning an error, or panicking
/// (which is what the `must_*` helpers on [Tx] do), rolls the step back.
pub trait Migration {
    /// Apply the migration.
    fn apply(&self, tx: &mut Tx<'_>) -> Result<(), Error>;

    /// Undo the migration. The default implementation refuses, so rolling back
    /// past this migration fails until it is implemented.
    fn rollback(&self, _tx: &mut Tx<'_>) -> Result<(), Error> {
        Err(Error::Irreversible)
    }

    /// Optional human-readable summary, included in log output.
    fn description(&self) -> Option<&str> {
        None
    }
}

impl std::fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("description", &self.description())
            .finish()
    }
}

/// A [Migration] built from a pair of closures.
///
/// ```
/// use gogo_migrate::{FnMigration, Tx};
///
/// let migration = FnMigration::new(
///     |tx: &mut Tx<'_>| tx.exec_all("create table users (id integer primary key)"),
///     |tx: &mut Tx<'_>| tx.exec_all("drop table users"),
/// )
/// .with_description("Create users table");
/// # let _ = migration;
/// ```
pub struct FnMigration<A, R> {
    apply: A,
    rollback: R,
    description: Option<String>,
}

impl<A, R> FnMigration<A, R>
where
    A: Fn(&mut Tx<'_>) -> Result<(), Error>,
    R: Fn(&mut Tx<'_>) -> Result<(), Error>,
{
    pub fn new(apply: A, rollback: R) -> Self {
        Self {
            apply,
            rollback,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<A, R> Migration for FnMigration<A, R>
where
    A: Fn(&mut Tx<'_>) -> Result<(), Error>,
    R: Fn(&mut Tx<'_>) -> Result<(), Error>,
{
    fn apply(&self, tx: &mut Tx<'_>) -> Result<(), Error> {
        (self.apply)(tx)
    }

    fn rollback(&self, tx: &mut Tx<'_>) -> Result<(), Error> {
        (self.rollback)(tx)
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
