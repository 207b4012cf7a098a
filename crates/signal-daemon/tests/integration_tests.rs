//! Integration tests for signal-daemon.
//!
//! Tests marked `#[ignore]` need a running signal-cli daemon at
//! `SIGNAL_DAEMON_URL` with `SIGNAL_ACCOUNT` registered:
//!   cargo test --test integration_tests -- --ignored

use std::env;
use std::time::Duration;

use futures::StreamExt;
use signal_daemon::{
    subscribe_with_reconnect, DaemonConfig, DaemonError, ReconnectConfig, SendParams, SignalClient,
};

/// Nothing listens on the discard port.
const DEAD_DAEMON: &str = "http://127.0.0.1:9";

// ============================================================================
// Unit tests (no daemon required)
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_daemon_config_default() {
        let config = DaemonConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert!(config.account.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_daemon_config_trims_trailing_slash() {
        let config = DaemonConfig::new("http://127.0.0.1:9000/");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.rpc_url(), "http://127.0.0.1:9000/api/v1/rpc");
    }

    #[test]
    fn test_daemon_config_urls() {
        let config = DaemonConfig::new("http://localhost:8080");
        assert_eq!(config.rpc_url(), "http://localhost:8080/api/v1/rpc");
        assert_eq!(config.check_url(), "http://localhost:8080/api/v1/check");
        assert_eq!(config.events_url(), "http://localhost:8080/api/v1/events");
    }

    #[test]
    fn test_daemon_config_events_url_with_account() {
        let config = DaemonConfig::with_account("http://localhost:8080", "+1234567890");
        assert_eq!(config.account, Some("+1234567890".to_string()));
        assert_eq!(
            config.events_url(),
            "http://localhost:8080/api/v1/events?account=%2B1234567890"
        );
    }
}

mod send_params_tests {
    use super::*;

    #[test]
    fn test_send_params_text() {
        let params = SendParams::text("+1234567890", "Hello");
        assert_eq!(params.recipient, vec!["+1234567890".to_string()]);
        assert_eq!(params.message, Some("Hello".to_string()));
        assert!(params.group_id.is_empty());
        assert!(params.sticker.is_none());
    }

    #[test]
    fn test_send_params_group() {
        let params = SendParams::group("GROUP_ID", "Hello group");
        assert!(params.recipient.is_empty());
        assert_eq!(params.group_id, vec!["GROUP_ID".to_string()]);
    }
}

// ============================================================================
// Offline behavior
// ============================================================================

#[tokio::test]
async fn test_connect_to_dead_daemon_fails() {
    let config = DaemonConfig::new(DEAD_DAEMON).with_request_timeout(Duration::from_secs(2));
    let result = SignalClient::connect(config).await;
    assert!(matches!(result, Err(DaemonError::Http(_))));
}

#[tokio::test]
async fn test_send_to_dead_daemon_fails() {
    let config = DaemonConfig::new(DEAD_DAEMON).with_request_timeout(Duration::from_secs(2));
    let client = SignalClient::new(config).unwrap();
    assert!(!client.is_connected());

    let result = client.send_text("+1234567890", "hello").await;
    assert!(matches!(result, Err(DaemonError::Http(_))));
}

#[tokio::test]
async fn test_subscription_retries_then_ends() {
    let client = SignalClient::new(DaemonConfig::new(DEAD_DAEMON)).unwrap();
    let reconnect = ReconnectConfig {
        max_retries: Some(1),
        initial_delay: Duration::from_millis(10),
        ..Default::default()
    };
    let stream = subscribe_with_reconnect(&client, reconnect).unwrap();

    let items: Vec<_> = tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
        .await
        .expect("stream should give up");

    // One failure for the first connection and one for the retry
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| matches!(item, Err(DaemonError::Sse(_)))));
}

// ============================================================================
// Live daemon
// ============================================================================

fn live_config() -> Option<DaemonConfig> {
    let url = env::var("SIGNAL_DAEMON_URL").ok()?;
    let account = env::var("SIGNAL_ACCOUNT").ok()?;
    Some(DaemonConfig::with_account(url, account))
}

#[tokio::test]
#[ignore]
async fn test_daemon_health_check() {
    let Some(config) = live_config() else {
        eprintln!("SIGNAL_DAEMON_URL / SIGNAL_ACCOUNT not set, skipping");
        return;
    };
    let client = SignalClient::connect(config).await.unwrap();
    assert!(client.is_connected());
    assert!(client.health_check().await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_daemon_send_note_to_self() {
    let Some(config) = live_config() else {
        eprintln!("SIGNAL_DAEMON_URL / SIGNAL_ACCOUNT not set, skipping");
        return;
    };
    let account = config.account.clone().unwrap();
    let client = SignalClient::connect(config).await.unwrap();
    let result = client.send_text(&account, "integration test").await.unwrap();
    assert!(result.timestamp > 0);
}
