use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tower_sessions::{
    cookie::time::OffsetDateTime,
    session::{Id, Record},
    session_store::{self, SessionStore},
};

use super::DB;

/// Session records kept in the `sessions` table of the application database, so open forms
/// survive a restart. Expired rows are ignored on load and purged by `continuously_delete_expired`.
#[derive(Clone)]
pub struct SqliteStore {
    db: DB,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn new(db: DB) -> Self {
        Self { db }
    }

    pub async fn delete_expired(&self) -> session_store::Result<usize> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        self.db
            .call(move |conn| {
                let deleted = conn.execute("DELETE FROM sessions WHERE expiry_date <= ?", params![now])?;
                Ok(deleted)
            })
            .await
            .map_err(backend)
    }

    pub async fn continuously_delete_expired(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match self.delete_expired().await {
                Ok(0) => {}
                Ok(deleted) => tracing::debug!("deleted {deleted} expired sessions"),
                Err(err) => tracing::error!("failed to delete expired sessions: {err:?}"),
            }
        }
    }
}

fn backend(error: tokio_rusqlite::Error) -> session_store::Error {
    session_store::Error::Backend(error.to_string())
}

fn encode(record: &Record) -> session_store::Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| session_store::Error::Encode(e.to_string()))
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        loop {
            let id = record.id.to_string();
            let data = encode(record)?;
            let expiry_date = record.expiry_date.unix_timestamp();

            let inserted = self
                .db
                .call(move |conn| {
                    let inserted = conn.execute(
                        "INSERT INTO sessions (id, data, expiry_date) VALUES (?, ?, ?) ON CONFLICT(id) DO NOTHING",
                        params![id, data, expiry_date],
                    )?;
                    Ok(inserted)
                })
                .await
                .map_err(backend)?;

            if inserted == 1 {
                return Ok(());
            }
            record.id = Id::default();
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let id = record.id.to_string();
        let data = encode(record)?;
        let expiry_date = record.expiry_date.unix_timestamp();

        self.db
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO sessions (id, data, expiry_date) VALUES (?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET data = excluded.data, expiry_date = excluded.expiry_date"#,
                    params![id, data, expiry_date],
                )?;
                Ok(())
            })
            .await
            .map_err(backend)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let id = session_id.to_string();
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let data = self
            .db
            .call(move |conn| {
                conn.query_row(
                    "SELECT data FROM sessions WHERE id = ? AND expiry_date > ?",
                    params![id, now],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()
                .map_err(|e| e.into())
            })
            .await
            .map_err(backend)?;

        data.map(|data| serde_json::from_slice(&data).map_err(|e| session_store::Error::Decode(e.to_string())))
            .transpose()
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        let id = session_id.to_string();

        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE id = ?", params![id])?;
                Ok(())
            })
            .await
            .map_err(backend)
    }
}

#[cfg(test)]
pub async fn count_sessions(db: &DB) -> u32 {
    db.call(|conn| {
        conn.query_row("SELECT count(*) FROM sessions", [], |r| r.get(0))
            .map_err(|e| e.into())
    })
    .await
    .unwrap()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tower_sessions::cookie::time::Duration;

    use super::*;
    use crate::db::init_test_db;

    fn record(expires_in: Duration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::from([("csrf.token".to_string(), serde_json::json!("abc"))]),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn create_load_delete() {
        let db = init_test_db().await.unwrap();
        let store = SqliteStore::new(db.clone());
        let mut session = record(Duration::hours(1));

        store.create(&mut session).await.unwrap();
        let loaded = store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.data, session.data);

        store.delete(&session.id).await.unwrap();
        assert!(store.load(&session.id).await.unwrap().is_none());
        assert_eq!(count_sessions(&db).await, 0);
    }

    #[tokio::test]
    async fn save_overwrites_existing_record() {
        let db = init_test_db().await.unwrap();
        let store = SqliteStore::new(db.clone());
        let mut session = record(Duration::hours(1));
        store.create(&mut session).await.unwrap();

        session.data.insert("csrf.token".into(), serde_json::json!("def"));
        store.save(&session).await.unwrap();

        let loaded = store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.data["csrf.token"], serde_json::json!("def"));
        assert_eq!(count_sessions(&db).await, 1);
    }

    #[tokio::test]
    async fn expired_sessions_are_hidden_and_purged() {
        let db = init_test_db().await.unwrap();
        let store = SqliteStore::new(db.clone());
        let mut live = record(Duration::hours(1));
        let mut expired = record(Duration::hours(-1));
        store.create(&mut live).await.unwrap();
        store.create(&mut expired).await.unwrap();

        assert!(store.load(&expired.id).await.unwrap().is_none());

        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert_eq!(count_sessions(&db).await, 1);
        assert!(store.load(&live.id).await.unwrap().is_some());
    }
}
