//! The migration contract.

use futures::future::BoxFuture;
use quarry_db::{Connection, Schema};

use crate::error::Result;

/// One reversible schema change.
///
/// Implementations receive the schema builder of the migrating connection;
/// [`Schema::connection`] gives access to queries for data changes.
///
/// ```rust
/// use futures::future::BoxFuture;
/// use quarry_db::{Connection, Schema};
/// use quarry_migrate::{Migration, Result};
///
/// struct CreateUsers;
///
/// impl<C: Connection> Migration<C> for CreateUsers {
///     fn up<'a>(&'a self, schema: &'a Schema<'a, C>) -> BoxFuture<'a, Result<()>> {
///         Box::pin(async move {
///             schema
///                 .create_table("users", |table| {
///                     table.id();
///                     table.string("email", 255).unique();
///                     table.timestamps();
///                 })
///                 .await?;
///             Ok(())
///         })
///     }
///
///     fn down<'a>(&'a self, schema: &'a Schema<'a, C>) -> BoxFuture<'a, Result<()>> {
///         Box::pin(async move { Ok(schema.drop_table("users").await?) })
///     }
/// }
/// ```
pub trait Migration<C: Connection>: Send + Sync {
    /// Applies the change.
    fn up<'a>(&'a self, schema: &'a Schema<'a, C>) -> BoxFuture<'a, Result<()>>;

    /// Reverts the change.
    fn down<'a>(&'a self, schema: &'a Schema<'a, C>) -> BoxFuture<'a, Result<()>>;

    /// Whether [`Migration::down`] can run. Checked before a rollback starts.
    fn is_reversible(&self) -> bool {
        true
    }
}
