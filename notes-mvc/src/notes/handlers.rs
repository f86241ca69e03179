use rusqlite::{params, OptionalExtension, Row};

use crate::db::{self, DB};

use super::{NewNote, Note, NoteId};

impl<'a> TryFrom<&Row<'a>> for Note {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

pub async fn find_notes(db: &DB) -> db::Result<Vec<Note>> {
    db.call(|conn| {
        let notes = conn
            .prepare("SELECT id, title, content, created_at FROM notes ORDER BY id")?
            .query_map([], |row| Note::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    })
    .await
    .map_err(db::Error::from)
}

pub async fn get_note(db: &DB, note_id: NoteId) -> db::Result<Note> {
    db.call(move |conn| {
        let note = conn.query_row(
            "SELECT id, title, content, created_at FROM notes WHERE id = ?",
            params![note_id],
            |row| Note::try_from(row),
        )?;
        Ok(note)
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("Note '{note_id}' not found")))
}

pub async fn create_note(db: &DB, NewNote { title, content, created_at }: NewNote) -> db::Result<Note> {
    db.call(move |conn| {
        conn.query_row(
            r#"INSERT INTO notes (title, content, created_at) VALUES (?, ?, ?)
            RETURNING id, title, content, created_at"#,
            params![title, content, created_at],
            |row| Note::try_from(row),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
}

/// Replaces title and content. `created_at` is left as stored.
pub async fn update_note(db: &DB, note_id: NoteId, title: String, content: String) -> db::Result<Note> {
    db.call(move |conn| {
        conn.query_row(
            r#"UPDATE notes SET title = ?, content = ?
            WHERE id = ?
            RETURNING id, title, content, created_at"#,
            params![title, content, note_id],
            |row| Note::try_from(row),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("Note '{note_id}' not found")))
}

/// Returns the removed note, or `None` when there was nothing to remove.
pub async fn delete_note(db: &DB, note_id: NoteId) -> db::Result<Option<Note>> {
    db.call(move |conn| {
        conn.query_row(
            "DELETE FROM notes WHERE id = ? RETURNING id, title, content, created_at",
            params![note_id],
            |row| Note::try_from(row),
        )
        .optional()
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[tokio::test]
    async fn create_and_find() -> db::Result<()> {
        let db = init_test_db().await?;

        let note = create_note(&db, NewNote::new("Groceries", "Milk, eggs")).await?;
        let notes = find_notes(&db).await?;

        assert_eq!(notes, vec![note.clone()]);
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.content, "Milk, eggs");
        Ok(())
    }

    #[tokio::test]
    async fn ids_are_unique_and_ordered() -> db::Result<()> {
        let db = init_test_db().await?;

        let first = create_note(&db, NewNote::new("first", "1")).await?;
        let second = create_note(&db, NewNote::new("second", "2")).await?;
        let notes = find_notes(&db).await?;

        assert_ne!(first.id, second.id);
        assert_eq!(notes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_created_at() -> db::Result<()> {
        let db = init_test_db().await?;

        let note = create_note(&db, NewNote::new("Groceries", "Milk, eggs")).await?;
        let updated = update_note(&db, note.id, "Groceries".into(), "Milk, eggs, bread".into()).await?;

        assert_eq!(updated.id, note.id);
        assert_eq!(updated.content, "Milk, eggs, bread");
        assert_eq!(updated.created_at, note.created_at);
        assert_eq!(get_note(&db, note.id).await?, updated);
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_note() -> db::Result<()> {
        let db = init_test_db().await?;

        let result = update_note(&db, 42, "a".into(), "b".into()).await;

        assert!(matches!(result, Err(db::Error::NotFound(ref m)) if m == "Note '42' not found"));
        Ok(())
    }

    #[tokio::test]
    async fn get_missing_note() -> db::Result<()> {
        let db = init_test_db().await?;

        let result = get_note(&db, 7).await;

        assert!(matches!(result, Err(db::Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> db::Result<()> {
        let db = init_test_db().await?;

        let note = create_note(&db, NewNote::new("first", "1")).await?;

        assert_eq!(delete_note(&db, note.id).await?, Some(note.clone()));
        assert_eq!(delete_note(&db, note.id).await?, None);
        assert!(find_notes(&db).await?.is_empty());
        Ok(())
    }
}
