/// Database layer
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: Embedded schema migrations from the workspace `migrations/` directory
///
/// The database is the hosted Supabase Postgres instance; every table is
/// filtered by `user_id` in the model layer.

pub mod migrations;
pub mod pool;
