use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use sea_orm_migration::MigratorTrait;

use crate::error::AppResult;

const SQLITE_PRAGMAS: [&str; 3] =
    ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL", "PRAGMA cache_size=-64000"];

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url);
    // Every pooled connection to ":memory:" would otherwise open its own empty database.
    if database_url.contains(":memory:") {
        opts.max_connections(1).min_connections(1);
    }
    let db = Database::connect(opts).await?;

    if db.get_database_backend() == DbBackend::Sqlite {
        for pragma in SQLITE_PRAGMAS {
            db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string()))
                .await?;
        }
    }

    migration::Migrator::up(&db, None).await?;
    tracing::debug!("database migrations applied");
    Ok(db)
}
