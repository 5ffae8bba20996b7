// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use omnidesk_core::OmniError;
use omnidesk_core::types::{Message, NewMessage, now_timestamp};
use rusqlite::{OptionalExtension, params};

use super::{parse_column, parse_optional_column};
use crate::database::{Database, map_insert_err, map_tr_err};

const COLUMNS: &str = "id, interaction_id, sender_id, recipient_id, meta_message_id, body, \
                       message_timestamp, attachment_type, attachment_url, sent_by, is_read, \
                       is_deleted, created_at, updated_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        interaction_id: row.get(1)?,
        sender_id: row.get(2)?,
        recipient_id: row.get(3)?,
        meta_message_id: row.get(4)?,
        body: row.get(5)?,
        message_timestamp: row.get(6)?,
        attachment_type: parse_optional_column(row, 7)?,
        attachment_url: row.get(8)?,
        sent_by: parse_column(row, 9)?,
        is_read: row.get(10)?,
        is_deleted: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Look up a message by its provider-assigned id.
pub async fn find_by_meta_id(db: &Database, meta_id: &str) -> Result<Option<Message>, OmniError> {
    let meta_id = meta_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE meta_message_id = ?1"),
                params![meta_id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a message; a duplicate external id yields [`OmniError::Conflict`].
pub async fn create(db: &Database, msg: &NewMessage) -> Result<Message, OmniError> {
    let msg = msg.clone();
    let key = msg
        .meta_message_id
        .clone()
        .unwrap_or_else(|| format!("interaction {}", msg.interaction_id));
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO messages (interaction_id, sender_id, recipient_id, meta_message_id,
                         body, message_timestamp, attachment_type, attachment_url, sent_by,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                     RETURNING {COLUMNS}"
                ),
                params![
                    msg.interaction_id,
                    msg.sender_id,
                    msg.recipient_id,
                    msg.meta_message_id,
                    msg.body,
                    msg.message_timestamp,
                    msg.attachment_type.map(|a| a.to_string()),
                    msg.attachment_url,
                    msg.sent_by.to_string(),
                    now,
                ],
                row_to_message,
            )
        })
        .await
        .map_err(map_insert_err("message", key))
}

/// Messages of an interaction in timestamp order.
pub async fn list_for_interaction(
    db: &Database,
    interaction_id: i64,
) -> Result<Vec<Message>, OmniError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Message>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE interaction_id = ?1 AND is_deleted = 0
                 ORDER BY message_timestamp ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![interaction_id], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent message of an interaction; `external_only` skips rows
/// without a provider id.
pub async fn latest(
    db: &Database,
    interaction_id: i64,
    external_only: bool,
) -> Result<Option<Message>, OmniError> {
    let extra = if external_only {
        "AND meta_message_id IS NOT NULL"
    } else {
        ""
    };
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM messages
                     WHERE interaction_id = ?1 AND is_deleted = 0 {extra}
                     ORDER BY message_timestamp DESC, id DESC LIMIT 1"
                ),
                params![interaction_id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
