// tests/ai_adapter_stub.rs
use news_enricher::ai_adapter::{
    extract_json, sanitize_reason, DisabledClient, JudgmentClient, StaticClient,
};
use news_enricher::error::JudgmentError;

#[tokio::test]
async fn disabled_client_reports_disabled() {
    let client = DisabledClient;
    assert!(!client.is_enabled());
    let err = client.complete("anything", 10).await.unwrap_err();
    assert!(err.is_disabled());
}

#[tokio::test]
async fn static_client_replays_then_repeats_last() {
    let client = StaticClient::scripted(vec![
        Err(JudgmentError::Timeout),
        Ok(r#"{"score": 0.9}"#.to_string()),
    ]);
    assert_eq!(client.complete("p1", 10).await, Err(JudgmentError::Timeout));
    assert_eq!(client.complete("p2", 10).await.unwrap(), r#"{"score": 0.9}"#);
    assert_eq!(client.complete("p3", 10).await.unwrap(), r#"{"score": 0.9}"#);
    assert_eq!(client.calls(), 3);
    assert_eq!(client.prompts(), vec!["p1", "p2", "p3"]);
}

#[test]
fn fenced_replies_are_unwrapped() {
    let raw = "Sure!\n```json\n{\"score\": 0.4, \"reason\": \"ok\"}\n```";
    assert_eq!(extract_json(raw), Some("{\"score\": 0.4, \"reason\": \"ok\"}"));
    assert_eq!(extract_json("no json here"), None);
}

#[test]
fn reasons_are_single_line_and_bounded() {
    let r = sanitize_reason("  line one\nline\ttwo  ", 100);
    assert!(!r.contains('\n'));
    assert!(sanitize_reason(&"x".repeat(500), 50).chars().count() <= 50);
}
