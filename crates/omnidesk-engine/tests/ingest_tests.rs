// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion against the in-memory and SQLite ledgers.

use std::sync::Arc;

use omnidesk_core::types::{AttachmentType, InteractionStatus, InteractionType, SentBy};
use omnidesk_core::Platform;
use omnidesk_engine::payload::{MetaWebhook, WhatsappWebhook};
use omnidesk_test_utils::TestHarness;
use serde_json::{Value, json};

fn whatsapp_text(wamid: &str, phone: &str, body: &str) -> WhatsappWebhook {
    serde_json::from_value(json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-1",
            "changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "contacts": [{"wa_id": phone, "profile": {"name": "Budi"}}],
                "messages": [{
                    "id": wamid,
                    "from": phone,
                    "timestamp": "1700000000",
                    "type": "text",
                    "text": {"body": body}
                }]
            }}]
        }]
    }))
    .unwrap()
}

fn whatsapp_message(wamid: &str, message: Value) -> WhatsappWebhook {
    let mut msg = message;
    msg["id"] = json!(wamid);
    msg["timestamp"] = json!("1700000000");
    serde_json::from_value(json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-1",
            "changes": [{"value": {
                "contacts": [{"wa_id": "62811", "profile": {"name": "Budi"}}],
                "messages": [msg]
            }}]
        }]
    }))
    .unwrap()
}

fn messenger(page: &str, sender: &str, mid: &str, text: &str) -> MetaWebhook {
    serde_json::from_value(json!({
        "object": "page",
        "entry": [{
            "id": page,
            "messaging": [{
                "sender": {"id": sender},
                "recipient": {"id": page},
                "timestamp": 1700000000123i64,
                "message": {"mid": mid, "text": text}
            }]
        }]
    }))
    .unwrap()
}

async fn assert_whatsapp_redelivery_is_idempotent(harness: &TestHarness) {
    let payload = whatsapp_text("wamid.100", "6281234", "halo");

    let first = harness.engine.ingest_whatsapp(&payload).await.unwrap();
    assert_eq!(first.message_ids, vec!["wamid.100"]);
    assert_eq!(first.created.len(), 1);

    let message = &first.messages[0];
    assert_eq!(message.meta_message_id.as_deref(), Some("wamid.100"));
    assert_eq!(message.sent_by, SentBy::Reporter);
    assert_eq!(message.body, "halo");
    assert_eq!(message.message_timestamp, "2023-11-14T22:13:20.000Z");

    let interaction = harness
        .ledger
        .get_interaction(message.interaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interaction.status, InteractionStatus::Unclaimed);
    assert_eq!(interaction.platform, Platform::Whatsapp);
    assert_eq!(interaction.platform_id, "waba-1");

    let reporter = harness
        .ledger
        .find_reporter_by_meta_id("6281234")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interaction.reporter_id, Some(reporter.id));
    assert_eq!(reporter.name, "Budi");

    let second = harness.engine.ingest_whatsapp(&payload).await.unwrap();
    assert_eq!(second.messages[0].id, message.id);
    assert_eq!(second.interaction_ids, first.interaction_ids);
    assert!(second.created.is_empty());
    assert_eq!(harness.notifier.messages().len(), 1);
}

#[tokio::test]
async fn whatsapp_redelivery_resolves_to_the_same_rows() {
    let harness = TestHarness::new().await.unwrap();
    assert_whatsapp_redelivery_is_idempotent(&harness).await;
    assert_eq!(harness.memory.interaction_count().await, 1);
    assert_eq!(harness.memory.message_count().await, 1);
}

#[tokio::test]
async fn whatsapp_redelivery_is_idempotent_on_sqlite() {
    let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
    assert_whatsapp_redelivery_is_idempotent(&harness).await;
}

#[tokio::test]
async fn follow_up_messages_share_the_ongoing_interaction() {
    let harness = TestHarness::new().await.unwrap();
    let a = harness
        .engine
        .ingest_whatsapp(&whatsapp_text("wamid.1", "628", "one"))
        .await
        .unwrap();
    let b = harness
        .engine
        .ingest_whatsapp(&whatsapp_text("wamid.2", "628", "two"))
        .await
        .unwrap();
    assert_eq!(a.interaction_ids, b.interaction_ids);
    assert_eq!(harness.memory.reporter_count().await, 1);
}

#[tokio::test]
async fn closed_interaction_is_not_reused() {
    let harness = TestHarness::new().await.unwrap();
    let a = harness
        .engine
        .ingest_whatsapp(&whatsapp_text("wamid.1", "628", "one"))
        .await
        .unwrap();
    harness.engine.close(a.interaction_ids[0]).await.unwrap();

    let b = harness
        .engine
        .ingest_whatsapp(&whatsapp_text("wamid.2", "628", "two"))
        .await
        .unwrap();
    assert_ne!(a.interaction_ids, b.interaction_ids);
    assert_eq!(harness.memory.reporter_count().await, 1);
}

#[tokio::test]
async fn whatsapp_image_resolves_media_url() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .gateway
        .script_media("media-1", "https://lookaside/media-1")
        .await;
    let payload = whatsapp_message(
        "wamid.img",
        json!({"type": "image", "image": {"id": "media-1", "caption": "receipt"}}),
    );

    let report = harness.engine.ingest_whatsapp(&payload).await.unwrap();
    let message = &report.messages[0];
    assert_eq!(message.attachment_type, Some(AttachmentType::Image));
    assert_eq!(message.attachment_url.as_deref(), Some("https://lookaside/media-1"));
    assert_eq!(message.body, "receipt");
}

#[tokio::test]
async fn failed_media_lookup_leaves_no_partial_state() {
    let harness = TestHarness::new().await.unwrap();
    let payload = whatsapp_message(
        "wamid.vid",
        json!({"type": "video", "video": {"id": "missing"}}),
    );

    assert!(harness.engine.ingest_whatsapp(&payload).await.is_err());
    assert_eq!(harness.memory.reporter_count().await, 0);
    assert_eq!(harness.memory.interaction_count().await, 0);
}

#[tokio::test]
async fn whatsapp_location_is_stored_as_json() {
    let harness = TestHarness::new().await.unwrap();
    let payload = whatsapp_message(
        "wamid.loc",
        json!({"type": "location", "location": {"latitude": -6.2, "longitude": 106.8}}),
    );

    let report = harness.engine.ingest_whatsapp(&payload).await.unwrap();
    let message = &report.messages[0];
    assert_eq!(message.attachment_type, Some(AttachmentType::Location));
    let body: Value = serde_json::from_str(&message.body).unwrap();
    assert_eq!(body["latitude"], -6.2);
}

#[tokio::test]
async fn whatsapp_status_updates_are_skipped() {
    let harness = TestHarness::new().await.unwrap();
    let payload: WhatsappWebhook = serde_json::from_value(json!({
        "object": "whatsapp_business_account",
        "entry": [{"id": "waba-1", "changes": [{"value": {"statuses": [{"id": "wamid.1"}]}}]}]
    }))
    .unwrap();

    let report = harness.engine.ingest_whatsapp(&payload).await.unwrap();
    assert!(report.message_ids.is_empty());
    assert!(harness.notifier.messages().is_empty());
}

#[tokio::test]
async fn messenger_direct_message_creates_facebook_interaction() {
    let harness = TestHarness::new().await.unwrap();
    let report = harness
        .engine
        .ingest_facebook(&messenger("page-1", "psid-9", "m_1", "hello"))
        .await
        .unwrap();

    let message = &report.messages[0];
    assert_eq!(message.sender_id, "psid-9");
    assert_eq!(message.recipient_id, "page-1");
    assert_eq!(message.message_timestamp, "2023-11-14T22:13:20.123Z");

    let interaction = harness
        .ledger
        .get_interaction(message.interaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interaction.platform, Platform::Facebook);
    assert_eq!(interaction.interaction_type, InteractionType::Message);
}

#[tokio::test]
async fn page_echoes_are_skipped() {
    let harness = TestHarness::new().await.unwrap();
    let report = harness
        .engine
        .ingest_facebook(&messenger("page-1", "page-1", "m_echo", "our reply"))
        .await
        .unwrap();
    assert!(report.message_ids.is_empty());
    assert_eq!(harness.memory.message_count().await, 0);
}

#[tokio::test]
async fn same_sender_on_two_platforms_gets_two_interactions() {
    let harness = TestHarness::new().await.unwrap();
    let fb = harness
        .engine
        .ingest_facebook(&messenger("page-1", "user-1", "m_a", "fb"))
        .await
        .unwrap();
    let ig = harness
        .engine
        .ingest_instagram(&messenger("ig-1", "user-1", "m_b", "ig"))
        .await
        .unwrap();
    assert_ne!(fb.interaction_ids, ig.interaction_ids);
}

#[tokio::test]
async fn facebook_mention_is_keyed_by_post() {
    let harness = TestHarness::new().await.unwrap();
    let mention = |comment: &str| -> MetaWebhook {
        serde_json::from_value(json!({
            "object": "page",
            "entry": [{"id": "page-1", "changes": [{"field": "feed", "value": {
                "post_id": "page-1_post-7",
                "comment_id": comment,
                "message": "@Support help",
                "from": {"id": "user-3"},
                "created_time": 1700000000
            }}]}]
        }))
        .unwrap()
    };

    let first = harness.engine.ingest_facebook(&mention("c-1")).await.unwrap();
    let second = harness.engine.ingest_facebook(&mention("c-2")).await.unwrap();
    assert_eq!(first.interaction_ids, second.interaction_ids);
    assert_eq!(first.message_ids, vec!["c-1"]);

    let interaction = harness
        .ledger
        .get_interaction(first.interaction_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interaction.interaction_type, InteractionType::Mention);
    assert_eq!(interaction.mention_media_id.as_deref(), Some("page-1_post-7"));
    assert_eq!(
        interaction.mention_media_url.as_deref(),
        Some("https://www.facebook.com/page-1_post-7")
    );
    assert_eq!(interaction.reporter_id, None);
}

#[tokio::test]
async fn instagram_mention_fetches_text_through_the_gateway() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .gateway
        .script_mention("ig-comment-1", "@support my order", Some("https://instagram.com/p/abc"))
        .await;
    let payload: MetaWebhook = serde_json::from_value(json!({
        "object": "instagram",
        "entry": [{"id": "ig-1", "changes": [{"field": "mentions", "value": {
            "media_id": "media-5",
            "comment_id": "ig-comment-1"
        }}]}]
    }))
    .unwrap();

    let report = harness.engine.ingest_instagram(&payload).await.unwrap();
    assert_eq!(report.messages[0].body, "@support my order");

    let interaction = harness
        .ledger
        .get_interaction(report.interaction_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interaction.platform, Platform::Instagram);
    assert_eq!(
        interaction.mention_media_url.as_deref(),
        Some("https://instagram.com/p/abc")
    );

    // A redelivery never reaches the gateway.
    let lookups = harness.gateway.lookup_count();
    harness.engine.ingest_instagram(&payload).await.unwrap();
    assert_eq!(harness.gateway.lookup_count(), lookups);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_for_a_new_reporter_converge() {
    let harness = Arc::new(TestHarness::new().await.unwrap());

    let mut tasks = Vec::new();
    for n in 0..8 {
        let harness = harness.clone();
        tasks.push(tokio::spawn(async move {
            let payload = whatsapp_text(&format!("wamid.c{n}"), "62899", "burst");
            harness.engine.ingest_whatsapp(&payload).await
        }));
    }

    let mut interaction_ids = Vec::new();
    for task in tasks {
        let report = task.await.unwrap().unwrap();
        interaction_ids.extend(report.interaction_ids);
    }
    interaction_ids.dedup();
    assert_eq!(interaction_ids.len(), 1);
    assert_eq!(harness.memory.reporter_count().await, 1);
    assert_eq!(harness.memory.interaction_count().await, 1);
    assert_eq!(harness.memory.message_count().await, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redeliveries_create_one_message() {
    let harness = Arc::new(TestHarness::new().await.unwrap());
    let payload = whatsapp_text("wamid.same", "62877", "dup");

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let harness = harness.clone();
        let payload = payload.clone();
        tasks.push(tokio::spawn(async move {
            harness.engine.ingest_whatsapp(&payload).await
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().messages[0].id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(harness.memory.message_count().await, 1);
    assert_eq!(harness.notifier.messages().len(), 1);
}
