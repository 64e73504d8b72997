//! Postgres-backed stores. Queries are plain `sqlx::query` with runtime
//! binding; `sql/schema.sql` holds the tables they expect.

mod orders;
mod users;

pub use orders::PgOrderStore;
pub use users::PgUserStore;
