use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("webhook payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("webhook object is {0}, not whatsapp_business_account")]
    WrongObject(String),
}

/// One inbound text message, flattened out of the webhook envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundText {
    /// Which tenant's number received the message.
    pub phone_number_id: String,
    /// Sender phone, which is also the customer id.
    pub from: String,
    pub message_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    object: String,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: ChangeValue,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    metadata: Option<Metadata>,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    from: String,
    #[serde(rename = "type")]
    kind: String,
    text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: String,
}

/// Extracts the text messages from a webhook delivery. Status updates and
/// non-text message types are skipped, not errors: Meta batches them into
/// the same envelope.
pub fn parse_webhook(body: &[u8]) -> Result<Vec<InboundText>, PayloadError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    if envelope.object != "whatsapp_business_account" {
        return Err(PayloadError::WrongObject(envelope.object));
    }

    let mut messages = Vec::new();
    for entry in envelope.entry {
        for change in entry.changes {
            let Some(metadata) = change.value.metadata else { continue };
            for message in change.value.messages {
                if message.kind != "text" {
                    continue;
                }
                let Some(text) = message.text else { continue };
                messages.push(InboundText {
                    phone_number_id: metadata.phone_number_id.clone(),
                    from: message.from,
                    message_id: message.id,
                    text: text.body,
                });
            }
        }
    }
    Ok(messages)
}

/// Request body for sending one text message through the Cloud API.
pub fn text_message_body(to: &str, text: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "body": text },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_webhook, text_message_body, PayloadError};

    fn envelope(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "object": "whatsapp_business_account",
            "entry": [{ "id": "biz-1", "changes": [{ "field": "messages", "value": value }] }],
        }))
        .expect("encode")
    }

    #[test]
    fn extracts_text_messages() {
        let body = envelope(json!({
            "metadata": { "display_phone_number": "15550001", "phone_number_id": "wa-123" },
            "messages": [{
                "id": "wamid.1",
                "from": "5215550001",
                "type": "text",
                "text": { "body": "dos sandwiches" },
            }],
        }));

        let messages = parse_webhook(&body).expect("parse");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].phone_number_id, "wa-123");
        assert_eq!(messages[0].from, "5215550001");
        assert_eq!(messages[0].text, "dos sandwiches");
    }

    #[test]
    fn status_only_deliveries_yield_nothing() {
        let body = envelope(json!({
            "metadata": { "phone_number_id": "wa-123" },
            "statuses": [{ "id": "wamid.1", "status": "delivered" }],
        }));
        assert!(parse_webhook(&body).expect("parse").is_empty());
    }

    #[test]
    fn non_text_messages_are_skipped() {
        let body = envelope(json!({
            "metadata": { "phone_number_id": "wa-123" },
            "messages": [{
                "id": "wamid.2",
                "from": "5215550001",
                "type": "image",
                "image": { "id": "media-1" },
            }],
        }));
        assert!(parse_webhook(&body).expect("parse").is_empty());
    }

    #[test]
    fn foreign_objects_are_rejected() {
        let body = serde_json::to_vec(&json!({ "object": "page", "entry": [] })).expect("encode");
        assert!(matches!(parse_webhook(&body), Err(PayloadError::WrongObject(_))));
    }

    #[test]
    fn outbound_body_targets_the_recipient() {
        let body = text_message_body("5215550001", "hola");
        assert_eq!(body["to"], "5215550001");
        assert_eq!(body["text"]["body"], "hola");
        assert_eq!(body["messaging_product"], "whatsapp");
    }
}
