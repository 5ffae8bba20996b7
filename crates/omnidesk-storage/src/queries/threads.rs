// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email thread bindings.

use omnidesk_core::OmniError;
use omnidesk_core::types::Thread;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_insert_err, map_tr_err};

pub async fn get(db: &Database, id: &str) -> Result<Option<Thread>, OmniError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, subject, email_date, from_addr FROM threads WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Thread {
                        id: row.get(0)?,
                        subject: row.get(1)?,
                        email_date: row.get(2)?,
                        from: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create(db: &Database, thread: &Thread) -> Result<Thread, OmniError> {
    let row = thread.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO threads (id, subject, email_date, from_addr) VALUES (?1, ?2, ?3, ?4)",
                params![row.id, row.subject, row.email_date, row.from],
            )?;
            Ok(())
        })
        .await
        .map_err(map_insert_err("thread", thread.id.clone()))?;
    Ok(thread.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn thread_id_is_unique() {
        let db = Database::open_in_memory().await.unwrap();
        let thread = Thread {
            id: "thread-1".into(),
            subject: "Help".into(),
            email_date: "Mon, 1 Jan 2026 10:00:00 +0000".into(),
            from: "Jane <jane@x.com>".into(),
        };
        create(&db, &thread).await.unwrap();
        assert_eq!(get(&db, "thread-1").await.unwrap(), Some(thread.clone()));
        assert!(create(&db, &thread).await.unwrap_err().is_conflict());
        assert!(get(&db, "thread-2").await.unwrap().is_none());
    }
}
