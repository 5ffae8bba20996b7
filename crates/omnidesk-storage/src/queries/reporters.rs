// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter lookups and creation.

use omnidesk_core::OmniError;
use omnidesk_core::types::{NewReporter, Reporter, now_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_insert_err, map_tr_err};

const COLUMNS: &str = "id, meta_reporter_id, name, email, phone_number, gender, address, \
                       platform_username, is_deleted, created_at, updated_at";

fn row_to_reporter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reporter> {
    Ok(Reporter {
        id: row.get(0)?,
        meta_reporter_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone_number: row.get(4)?,
        gender: row.get(5)?,
        address: row.get(6)?,
        platform_username: row.get(7)?,
        is_deleted: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

async fn find_one(
    db: &Database,
    filter: &'static str,
    value: rusqlite::types::Value,
) -> Result<Option<Reporter>, OmniError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM reporters WHERE {filter} ORDER BY id LIMIT 1"),
                params![value],
                row_to_reporter,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a reporter by the id its platform assigned.
pub async fn find_by_meta_id(db: &Database, meta_id: &str) -> Result<Option<Reporter>, OmniError> {
    find_one(db, "meta_reporter_id = ?1", meta_id.to_string().into()).await
}

/// Look up a reporter by email address (case-insensitive).
pub async fn find_by_email(db: &Database, email: &str) -> Result<Option<Reporter>, OmniError> {
    find_one(
        db,
        "email = ?1 COLLATE NOCASE AND is_deleted = 0",
        email.to_string().into(),
    )
    .await
}

pub async fn get(db: &Database, id: i64) -> Result<Option<Reporter>, OmniError> {
    find_one(db, "id = ?1", id.into()).await
}

/// Insert a reporter; a duplicate `meta_reporter_id` or email sender address
/// yields [`OmniError::Conflict`].
pub async fn create(db: &Database, reporter: &NewReporter) -> Result<Reporter, OmniError> {
    let reporter = reporter.clone();
    let key = reporter
        .meta_reporter_id
        .clone()
        .or_else(|| reporter.email.clone())
        .unwrap_or_default();
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO reporters
                         (meta_reporter_id, name, email, phone_number, email_sender, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     RETURNING {COLUMNS}"
                ),
                params![
                    reporter.meta_reporter_id,
                    reporter.name,
                    reporter.email,
                    reporter.phone_number,
                    reporter.email_sender,
                    now,
                ],
                row_to_reporter,
            )
        })
        .await
        .map_err(map_insert_err("reporter", key))
}
