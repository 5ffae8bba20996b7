// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel account reads. Writes exist for provisioning and tests.

use omnidesk_core::OmniError;
use omnidesk_core::types::ChannelAccount;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn get(db: &Database, id: i64) -> Result<Option<ChannelAccount>, OmniError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, facebook_page_id, instagram_id, whatsapp_number_id,
                        whatsapp_business_id, facebook_access_token, instagram_access_token,
                        whatsapp_access_token, is_live_chat_active
                 FROM channel_accounts WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ChannelAccount {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        facebook_page_id: row.get(2)?,
                        instagram_id: row.get(3)?,
                        whatsapp_number_id: row.get(4)?,
                        whatsapp_business_id: row.get(5)?,
                        facebook_access_token: row.get(6)?,
                        instagram_access_token: row.get(7)?,
                        whatsapp_access_token: row.get(8)?,
                        is_live_chat_active: row.get(9)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create(db: &Database, account: &ChannelAccount) -> Result<ChannelAccount, OmniError> {
    let row = account.clone();
    let id = db
        .connection()
        .call(move |conn| -> rusqlite::Result<i64> {
            conn.execute(
                "INSERT INTO channel_accounts (name, facebook_page_id, instagram_id,
                     whatsapp_number_id, whatsapp_business_id, facebook_access_token,
                     instagram_access_token, whatsapp_access_token, is_live_chat_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.name,
                    row.facebook_page_id,
                    row.instagram_id,
                    row.whatsapp_number_id,
                    row.whatsapp_business_id,
                    row.facebook_access_token,
                    row.instagram_access_token,
                    row.whatsapp_access_token,
                    row.is_live_chat_active,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;

    Ok(ChannelAccount {
        id,
        ..account.clone()
    })
}
