//! services/api/src/web/responder.rs
//!
//! The inbound-message auto-responder pipeline: client upsert, message
//! persistence, three-tier QA matching, language detection, and reply
//! dispatch. The pipeline never fails outward; every error degrades to a
//! fixed apology string so the webhook handler can keep its always-200
//! contract.

use crate::web::state::AppState;
use crate::web::webhook::{sender_name, ChangeValue, InboundMessage};
use tracing::{error, info};
use wachat_core::domain::{Client, QaPair};
use wachat_core::ports::{DataStore, PortResult};
use wachat_core::text::{default_response, detect_language, extract_keywords};

/// Returned when any stage of the pipeline fails.
pub const FALLBACK_RESPONSE: &str =
    "Sorry, there was an error processing your message. Please try again later.";

/// Cap on QA pairs returned by the keyword and full-message tiers.
pub const DEFAULT_QA_LIMIT: i64 = 5;

/// Minimum token length for the keyword tier.
const KEYWORD_MIN_LENGTH: usize = 2;

/// Handles one inbound text message end to end: generate a reply and
/// dispatch it through the gateway. Errors are logged, never propagated.
pub async fn process_text_message(
    app_state: &AppState,
    message: &InboundMessage,
    value: &ChangeValue,
) {
    let Some(text) = message.text.as_ref().and_then(|t| t.body.as_deref()) else {
        return;
    };
    let Some(from) = message.from.as_deref() else {
        return;
    };
    let name = sender_name(value, from);

    info!("Received text message from {}", from);

    let response = generate_response(app_state.store.as_ref(), text, from, &name).await;

    match app_state.sender.send_text(from, &response).await {
        Ok(()) => info!("Reply sent successfully"),
        Err(e) => error!("Failed to send reply: {}", e),
    }
}

/// Generates the reply for an inbound message. Always returns a non-empty
/// string; failures collapse into [`FALLBACK_RESPONSE`].
pub async fn generate_response(
    store: &dyn DataStore,
    message: &str,
    from: &str,
    name: &str,
) -> String {
    match try_generate_response(store, message, from, name).await {
        Ok(response) => response,
        Err(e) => {
            error!("Error generating response: {}", e);
            FALLBACK_RESPONSE.to_string()
        }
    }
}

async fn try_generate_response(
    store: &dyn DataStore,
    message: &str,
    from: &str,
    name: &str,
) -> PortResult<String> {
    let client = find_or_create_client(store, from, name).await?;

    // Record the inbound message before anything else can fail.
    store.save_message(client.id, message, false).await?;
    store.record_client_activity(client.id, message).await?;

    let relevant = find_relevant_qa_pairs(store, message, DEFAULT_QA_LIMIT).await;
    let language = detect_language(message);

    let response = if let Some(qa) = relevant.first() {
        info!("Found matching QA: {}", qa.question);
        qa.answer.clone()
    } else {
        info!("No matching QA found, using default response");
        default_response(message, language)
    };

    store.save_message(client.id, &response, true).await?;
    store.record_client_activity(client.id, &response).await?;

    Ok(response)
}

/// Looks a client up by phone, creating one on first contact. The name
/// defaults to "Unknown" when the webhook carried no contact profile.
pub async fn find_or_create_client(
    store: &dyn DataStore,
    phone: &str,
    name: &str,
) -> PortResult<Client> {
    if let Some(client) = store.find_client_by_phone(phone).await? {
        return Ok(client);
    }

    let name = if name.is_empty() { "Unknown" } else { name };
    let client = store.create_client(phone, name, "Client").await?;
    info!("Created new client: {}", phone);
    Ok(client)
}

/// Three-tier QA lookup: exact match, then keyword substrings, then the
/// whole message as a substring. Store failures are logged and treated as
/// "no match".
pub async fn find_relevant_qa_pairs(
    store: &dyn DataStore,
    message: &str,
    limit: i64,
) -> Vec<QaPair> {
    match qa_lookup(store, message, limit).await {
        Ok(pairs) => pairs,
        Err(e) => {
            error!("Error finding QA pairs: {}", e);
            Vec::new()
        }
    }
}

async fn qa_lookup(store: &dyn DataStore, message: &str, limit: i64) -> PortResult<Vec<QaPair>> {
    let exact = store.find_qa_exact(message).await?;
    if !exact.is_empty() {
        return Ok(exact);
    }

    let keywords = extract_keywords(message, KEYWORD_MIN_LENGTH);
    if keywords.is_empty() {
        // No usable tokens; fall back to matching the whole message.
        return store.find_qa_containing(message, limit).await;
    }

    store.find_qa_by_keywords(&keywords, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;

    #[tokio::test]
    async fn persists_one_inbound_and_one_outbound_message_in_order() {
        let store = FakeStore::default();
        let response = generate_response(&store, "hello", "15550001111", "Jane").await;
        assert!(!response.is_empty());

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hello");
        assert!(!messages[0].from_bot);
        assert_eq!(messages[1].text, response);
        assert!(messages[1].from_bot);
        assert_eq!(messages[0].client_id, messages[1].client_id);

        let clients = store.clients();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, messages[0].client_id);
        // Last activity reflects the outbound reply.
        assert_eq!(clients[0].last_message, response);
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent_per_phone() {
        let store = FakeStore::default();
        let first = find_or_create_client(&store, "15550001111", "Jane")
            .await
            .expect("create");
        let second = find_or_create_client(&store, "15550001111", "Someone Else")
            .await
            .expect("find");
        assert_eq!(first.id, second.id);
        assert_eq!(store.clients().len(), 1);
        assert_eq!(second.name, "Jane");
    }

    #[tokio::test]
    async fn empty_sender_name_defaults_to_unknown() {
        let store = FakeStore::default();
        let client = find_or_create_client(&store, "15550001111", "")
            .await
            .expect("create");
        assert_eq!(client.name, "Unknown");
    }

    #[tokio::test]
    async fn exact_match_takes_precedence_over_keyword_matches() {
        let store = FakeStore::default();
        store.add_qa_pair(
            "What are your business hours?",
            "We are open 9am-5pm.",
            "general",
        );
        store.add_qa_pair(
            "Where are your business offices?",
            "Our offices are downtown.",
            "general",
        );

        let response =
            generate_response(&store, "what are your business hours?", "15550001111", "Jane").await;
        assert_eq!(response, "We are open 9am-5pm.");
    }

    #[tokio::test]
    async fn keyword_tier_matches_any_keyword_substring() {
        let store = FakeStore::default();
        store.add_qa_pair(
            "How much does an apartment cost?",
            "Apartments start at 500k.",
            "pricing",
        );

        let pairs = find_relevant_qa_pairs(&store, "apartment please", DEFAULT_QA_LIMIT).await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].answer, "Apartments start at 500k.");
    }

    #[tokio::test]
    async fn qa_lookup_failure_degrades_to_no_match() {
        let store = FakeStore::default();
        store.fail_qa();
        let pairs = find_relevant_qa_pairs(&store, "hello", DEFAULT_QA_LIMIT).await;
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn store_failure_yields_the_apology_response() {
        let store = FakeStore::default();
        store.fail_messages();
        let response = generate_response(&store, "hello", "15550001111", "Jane").await;
        assert_eq!(response, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn english_defaults_distinguish_greeting_from_pricing() {
        let store = FakeStore::default();
        let greeting = generate_response(&store, "hello", "15550001111", "Jane").await;
        let pricing = generate_response(&store, "what is the price", "15550002222", "Joe").await;
        assert!(greeting.starts_with("Hello!"));
        assert!(pricing.starts_with("Property prices"));
        assert_ne!(greeting, pricing);
    }

    #[tokio::test]
    async fn arabic_message_gets_an_arabic_default() {
        let store = FakeStore::default();
        let response = generate_response(&store, "مرحبا", "15550001111", "Jane").await;
        assert!(response.contains("مرحبا"));
    }
}
