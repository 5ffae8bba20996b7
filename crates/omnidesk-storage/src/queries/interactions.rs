// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interaction lookups, creation, partial updates and filtered listing.
//!
//! The partial unique indexes from the initial migration make "at most one
//! ongoing interaction per correlation key" a hard invariant; a losing
//! concurrent create surfaces as [`OmniError::Conflict`].

use omnidesk_core::OmniError;
use omnidesk_core::types::{
    Interaction, InteractionQuery, InteractionStatus, InteractionUpdate, NewInteraction, Platform,
    now_timestamp,
};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};

use super::parse_column;
use crate::database::{Database, map_insert_err, map_tr_err};

const COLUMNS: &str = "id, platform_id, reporter_id, conversation_id, mention_media_id, \
                       mention_media_url, agent_id, status, platform, interaction_type, \
                       latitude, longitude, duration_secs, created_at, updated_at";

fn row_to_interaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Interaction> {
    Ok(Interaction {
        id: row.get(0)?,
        platform_id: row.get(1)?,
        reporter_id: row.get(2)?,
        conversation_id: row.get(3)?,
        mention_media_id: row.get(4)?,
        mention_media_url: row.get(5)?,
        agent_id: row.get(6)?,
        status: parse_column(row, 7)?,
        platform: parse_column(row, 8)?,
        interaction_type: parse_column(row, 9)?,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
        duration_secs: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

async fn find_ongoing(
    db: &Database,
    filter: &'static str,
    values: Vec<Value>,
) -> Result<Option<Interaction>, OmniError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM interactions
                     WHERE {filter} AND status <> 'CLOSED'
                     ORDER BY id DESC LIMIT 1"
                ),
                params_from_iter(values),
                row_to_interaction,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Ongoing direct-message interaction of `reporter_id` on `platform`.
pub async fn find_ongoing_by_reporter(
    db: &Database,
    reporter_id: i64,
    platform: Platform,
) -> Result<Option<Interaction>, OmniError> {
    find_ongoing(
        db,
        "reporter_id = ?1 AND platform = ?2 AND interaction_type = 'PESAN'",
        vec![reporter_id.into(), platform.to_string().into()],
    )
    .await
}

pub async fn find_ongoing_by_mention_media(
    db: &Database,
    media_id: &str,
) -> Result<Option<Interaction>, OmniError> {
    find_ongoing(db, "mention_media_id = ?1", vec![media_id.to_string().into()]).await
}

pub async fn find_ongoing_by_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Interaction>, OmniError> {
    find_ongoing(
        db,
        "conversation_id = ?1",
        vec![conversation_id.to_string().into()],
    )
    .await
}

pub async fn get(db: &Database, id: i64) -> Result<Option<Interaction>, OmniError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM interactions WHERE id = ?1"),
                params![id],
                row_to_interaction,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Open a new UNCLAIMED interaction.
pub async fn create(db: &Database, new: &NewInteraction) -> Result<Interaction, OmniError> {
    let new = new.clone();
    let key = new
        .mention_media_id
        .clone()
        .or_else(|| new.conversation_id.clone())
        .or_else(|| new.reporter_id.map(|r| format!("reporter {r} on {}", new.platform)))
        .unwrap_or_else(|| new.platform_id.clone());
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO interactions (platform_id, reporter_id, conversation_id,
                         mention_media_id, mention_media_url, status, platform, interaction_type,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                     RETURNING {COLUMNS}"
                ),
                params![
                    new.platform_id,
                    new.reporter_id,
                    new.conversation_id,
                    new.mention_media_id,
                    new.mention_media_url,
                    InteractionStatus::Unclaimed.to_string(),
                    new.platform.to_string(),
                    new.interaction_type.to_string(),
                    now,
                ],
                row_to_interaction,
            )
        })
        .await
        .map_err(map_insert_err("ongoing interaction", key))
}

/// Apply the set fields of `update`; `Ok(None)` if the row does not exist.
///
/// Reopening a CLOSED interaction can collide with a newer ongoing one for
/// the same key, which surfaces as [`OmniError::Conflict`].
pub async fn update(
    db: &Database,
    id: i64,
    update: &InteractionUpdate,
) -> Result<Option<Interaction>, OmniError> {
    let agent_id = update.agent_id.clone();
    let status = update.status.map(|s| s.to_string());
    let duration_secs = update.duration_secs;
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE interactions SET
                         agent_id = COALESCE(?2, agent_id),
                         status = COALESCE(?3, status),
                         duration_secs = COALESCE(?4, duration_secs),
                         updated_at = ?5
                     WHERE id = ?1
                     RETURNING {COLUMNS}"
                ),
                params![id, agent_id, status, duration_secs, now],
                row_to_interaction,
            )
            .optional()
        })
        .await
        .map_err(map_insert_err("ongoing interaction", id.to_string()))
}

/// Translate a query into a WHERE clause and its positional values.
fn where_clause(query: &InteractionQuery) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let mut any_of = |column: &str, items: Vec<Value>, clauses: &mut Vec<String>| {
        if items.is_empty() {
            return;
        }
        let marks = vec!["?"; items.len()].join(", ");
        clauses.push(format!("{column} IN ({marks})"));
        values.extend(items);
    };

    any_of(
        "id",
        query.interaction_ids.iter().map(|&v| v.into()).collect(),
        &mut clauses,
    );
    any_of(
        "reporter_id",
        query.reporter_ids.iter().map(|&v| v.into()).collect(),
        &mut clauses,
    );
    any_of(
        "agent_id",
        query.agent_ids.iter().map(|v| v.clone().into()).collect(),
        &mut clauses,
    );
    any_of(
        "status",
        query.statuses.iter().map(|v| v.to_string().into()).collect(),
        &mut clauses,
    );
    any_of(
        "platform",
        query.platforms.iter().map(|v| v.to_string().into()).collect(),
        &mut clauses,
    );
    any_of(
        "interaction_type",
        query
            .interaction_types
            .iter()
            .map(|v| v.to_string().into())
            .collect(),
        &mut clauses,
    );

    if let Some(scope) = &query.scope {
        let mut visible = vec!["platform = 'EMAIL'".to_string()];
        if scope.include_live_chat {
            visible.push("platform = 'LIVE_CHAT'".to_string());
        }
        if !scope.platform_ids.is_empty() {
            let marks = vec!["?"; scope.platform_ids.len()].join(", ");
            visible.push(format!("platform_id IN ({marks})"));
            values.extend(scope.platform_ids.iter().map(|v| Value::from(v.clone())));
        }
        clauses.push(format!("({})", visible.join(" OR ")));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Matching interactions newest first plus the unpaginated total.
pub async fn list(
    db: &Database,
    query: &InteractionQuery,
) -> Result<(Vec<Interaction>, i64), OmniError> {
    let (filter, values) = where_clause(query);
    let window = query.window();

    db.connection()
        .call(move |conn| -> rusqlite::Result<(Vec<Interaction>, i64)> {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM interactions {filter}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let paging = match window {
                Some((offset, limit)) => format!("LIMIT {limit} OFFSET {offset}"),
                None => String::new(),
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM interactions {filter}
                 ORDER BY created_at DESC, id DESC {paging}"
            ))?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_interaction)?;
            let interactions = rows.collect::<Result<Vec<_>, _>>()?;
            Ok((interactions, total))
        })
        .await
        .map_err(map_tr_err)
}
