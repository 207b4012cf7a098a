//! Envelope and message types from signal-cli daemon.

use serde::{Deserialize, Serialize};

use super::send::Recipient;

/// A message envelope received from Signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Source phone number (e.g., "+1234567890").
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub source_number: Option<String>,

    #[serde(default)]
    pub source_uuid: Option<String>,

    /// Profile name of the sender, if the daemon knows it.
    #[serde(default)]
    pub source_name: Option<String>,

    /// Message timestamp (milliseconds since epoch).
    #[serde(default)]
    pub timestamp: u64,

    /// Data message content. Receipts and typing indicators leave this empty.
    #[serde(default)]
    pub data_message: Option<DataMessage>,
}

impl Envelope {
    /// Text body of the data message, if any.
    pub fn text(&self) -> Option<&str> {
        self.data_message.as_ref()?.message.as_deref()
    }

    /// Where a reply to this envelope should go: the group it was posted in,
    /// otherwise the sender directly.
    pub fn reply_to(&self) -> Option<Recipient> {
        let data = self.data_message.as_ref()?;
        if let Some(group) = &data.group_info {
            if !group.group_id.is_empty() {
                return Some(Recipient::Group(group.group_id.clone()));
            }
        }

        let sender = self
            .source_number
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.source);
        if sender.is_empty() {
            None
        } else {
            Some(Recipient::Direct(sender.to_string()))
        }
    }

    /// Best display name for the sender.
    pub fn sender_name(&self) -> &str {
        self.source_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.source)
    }
}

/// A data message containing the actual message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    #[serde(default)]
    pub timestamp: u64,

    /// The text message content.
    #[serde(default)]
    pub message: Option<String>,

    /// Group information if this is a group message.
    #[serde(default)]
    pub group_info: Option<GroupInfo>,

    #[serde(default)]
    pub sticker: Option<Sticker>,
}

/// Information about a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    /// Group ID (base64 encoded).
    #[serde(default)]
    pub group_id: String,

    /// Group type (v1 or v2).
    #[serde(default)]
    pub r#type: Option<String>,
}

/// A sticker attached to an incoming message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sticker {
    #[serde(default)]
    pub pack_id: String,
    #[serde(default)]
    pub sticker_id: u32,
}

/// Wrapper for SSE event data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveEvent {
    /// The message envelope.
    pub envelope: Envelope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_message() {
        let json = r#"{
            "envelope": {
                "source": "+15550001",
                "sourceNumber": "+15550001",
                "sourceName": "Olena",
                "timestamp": 1700000000000,
                "dataMessage": {"timestamp": 1700000000000, "message": "/start 25"}
            }
        }"#;
        let event: ReceiveEvent = serde_json::from_str(json).unwrap();
        let envelope = event.envelope;

        assert_eq!(envelope.text(), Some("/start 25"));
        assert_eq!(envelope.sender_name(), "Olena");
        assert_eq!(
            envelope.reply_to(),
            Some(Recipient::Direct("+15550001".to_string()))
        );
    }

    #[test]
    fn test_group_message_replies_to_group() {
        let json = r#"{
            "source": "+15550001",
            "dataMessage": {"message": "/stop", "groupInfo": {"groupId": "Z3JvdXA=", "type": "DELIVER"}}
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(
            envelope.reply_to(),
            Some(Recipient::Group("Z3JvdXA=".to_string()))
        );
    }

    #[test]
    fn test_receipt_has_no_reply_target() {
        let json = r#"{"source": "+15550001", "receiptMessage": {"isDelivery": true}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert!(envelope.text().is_none());
        assert!(envelope.reply_to().is_none());
    }

    #[test]
    fn test_sender_name_falls_back_to_number() {
        let json = r#"{"source": "+15550001", "sourceName": "", "dataMessage": {}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.sender_name(), "+15550001");
    }

    #[test]
    fn test_incoming_sticker() {
        let json = r#"{"dataMessage": {"sticker": {"packId": "abc", "stickerId": 3}}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        let sticker = envelope.data_message.unwrap().sticker.unwrap();
        assert_eq!(sticker.pack_id, "abc");
        assert_eq!(sticker.sticker_id, 3);
    }
}
