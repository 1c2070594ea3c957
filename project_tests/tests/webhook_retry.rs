//! Chat webhook delivery and its bounded retries.

use httpmock::prelude::*;
use lib_sync::workflow::{Notifier, NotifyError, WebhookNotifier};
use project_tests::{webhook_url, WEBHOOK_PATH};
use serde_json::json;

#[tokio::test]
async fn always_failing_endpoint_gets_exactly_five_attempts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(WEBHOOK_PATH).query_param("key", "abc");
            then.status(500);
        })
        .await;

    let notifier = WebhookNotifier::new(&webhook_url(&server), 5).unwrap();
    let result = notifier.send_text("hello", &[]).await;

    match result {
        Err(NotifyError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 5);
            assert_eq!(last, "HTTP 500");
        }
        other => panic!("unexpected result {:?}", other),
    }
    mock.assert_hits_async(5).await;
}

#[tokio::test]
async fn only_status_200_counts_as_delivered() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(WEBHOOK_PATH);
            then.status(204);
        })
        .await;

    let notifier = WebhookNotifier::new(&webhook_url(&server), 3).unwrap();
    assert!(notifier.send_text("hello", &[]).await.is_err());
    mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn delivered_message_carries_text_and_mentions() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(WEBHOOK_PATH).json_body(json!({
                "msgtype": "text",
                "text": {
                    "content": "8-Acme-JumpServer-support",
                    "mentioned_mobile_list": ["13800000000"]
                }
            }));
            then.status(200).json_body(json!({ "errcode": 0, "errmsg": "ok" }));
        })
        .await;

    let notifier = WebhookNotifier::new(&webhook_url(&server), 5).unwrap();
    let attempt = notifier
        .send_text("8-Acme-JumpServer-support", &["13800000000".to_string()])
        .await
        .unwrap();

    assert_eq!(attempt, 1);
    mock.assert_hits_async(1).await;
}
