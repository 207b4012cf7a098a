//! Types for sending messages via signal-cli daemon.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Destination of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// A phone number or account UUID.
    Direct(String),
    /// A base64 group id.
    Group(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Direct(number) => f.write_str(number),
            Recipient::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// Parameters for the `send` RPC.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    /// Recipients (phone numbers).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipient: Vec<String>,

    /// Group IDs to send to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_id: Vec<String>,

    /// The message text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Sticker to send, as `packId:stickerId`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker: Option<String>,

    /// Account to send from (multi-account mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl SendParams {
    /// Create new send params for a text message to a recipient.
    pub fn text(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: vec![recipient.into()],
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Create new send params for a text message to a group.
    pub fn group(group_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            group_id: vec![group_id.into()],
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Address the params to `recipient` with no content yet.
    pub fn to(recipient: &Recipient) -> Self {
        match recipient {
            Recipient::Direct(number) => Self {
                recipient: vec![number.clone()],
                ..Default::default()
            },
            Recipient::Group(id) => Self {
                group_id: vec![id.clone()],
                ..Default::default()
            },
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_sticker(mut self, sticker: impl Into<String>) -> Self {
        self.sticker = Some(sticker.into());
        self
    }

    /// Set the account for multi-account mode.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// Result of sending a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    /// Timestamp of the sent message.
    pub timestamp: u64,

    /// Results per recipient (if available).
    #[serde(default)]
    pub results: Vec<RecipientResult>,
}

impl SendResult {
    /// Recipients the daemon reported as failed.
    pub fn failures(&self) -> impl Iterator<Item = &RecipientResult> {
        self.results.iter().filter(|r| r.kind != "SUCCESS")
    }
}

/// Delivery result for one recipient.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientResult {
    /// Outcome reported by signal-cli, e.g. `SUCCESS` or `UNREGISTERED_FAILURE`.
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticker_params_serialize() {
        let params = SendParams::to(&Recipient::Direct("+15550001".to_string()))
            .with_sticker("pack:7")
            .with_account("+15559999");
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "recipient": ["+15550001"],
                "sticker": "pack:7",
                "account": "+15559999"
            })
        );
    }

    #[test]
    fn test_group_params_omit_recipient() {
        let params = SendParams::to(&Recipient::Group("Z3JvdXA=".to_string())).with_message("hi");
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"groupId": ["Z3JvdXA="], "message": "hi"})
        );
    }

    #[test]
    fn test_send_result_failures() {
        let json = r#"{
            "timestamp": 1,
            "results": [{"type": "SUCCESS"}, {"type": "UNREGISTERED_FAILURE"}]
        }"#;
        let result: SendResult = serde_json::from_str(json).unwrap();
        let failed: Vec<_> = result.failures().map(|r| r.kind.as_str()).collect();
        assert_eq!(failed, vec!["UNREGISTERED_FAILURE"]);
    }

    #[test]
    fn test_recipient_display() {
        assert_eq!(Recipient::Direct("+1".to_string()).to_string(), "+1");
        assert_eq!(Recipient::Group("g".to_string()).to_string(), "group:g");
    }
}
