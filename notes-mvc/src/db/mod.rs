mod migrations;
mod sessions;

use tokio_rusqlite::Connection;

use migrations::MIGRATIONS;

pub use sessions::SqliteStore;
#[cfg(test)]
pub use sessions::count_sessions;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),
    #[error(transparent)]
    TokioRusqlite(tokio_rusqlite::Error),
    #[error(transparent)]
    Rusqlite(rusqlite::Error),
}

impl Error {
    pub fn not_found_message(self, message: impl Into<String>) -> Self {
        if matches!(self, Self::NotFound(_)) {
            return Self::NotFound(message.into());
        }
        self
    }
}

impl From<tokio_rusqlite::Error> for Error {
    fn from(error: tokio_rusqlite::Error) -> Self {
        match error {
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows) => Self::NotFound("Not found".into()),
            error => Self::TokioRusqlite(error),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("Not found".into()),
            error => Self::Rusqlite(error),
        }
    }
}

/// Handle to the SQLite worker thread. Cloning is cheap; every request gets its own clone
/// out of the router state.
pub type DB = Connection;

pub async fn init_db(path: &str) -> Result<DB> {
    let conn = Connection::open(path).await?;

    conn.call(|conn| {
        migrate(conn)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(())
    })
    .await?;

    tracing::info!("database ready at {path}");

    Ok(conn)
}

#[cfg(test)]
pub async fn init_test_db() -> Result<DB> {
    let conn = Connection::open_in_memory().await?;

    conn.call(|conn| {
        migrate(conn)?;
        Ok(())
    })
    .await?;

    Ok(conn)
}

fn migrate(conn: &mut rusqlite::Connection) -> tokio_rusqlite::Result<()> {
    MIGRATIONS
        .to_latest(conn)
        .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
}
