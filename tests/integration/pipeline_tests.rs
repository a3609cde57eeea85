use super::*;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gold_rate_watcher::plugins::notifiers::TelegramNotifier;
use gold_rate_watcher::{FailureClass, RunOutcome};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn serve_page(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/gold-rate"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_successful_run_records_charts_and_notifies() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, 200, GRT_PAGE).await;

    let workspace = Workspace::new();
    workspace.seed_history("date,price\n2024-01-01,10100\n");

    let notifier = RecordingNotifier::default();
    let watcher = static_watcher(
        &format!("{}/gold-rate", server.uri()),
        &workspace,
        Box::new(notifier.clone()),
    );

    let report = watcher.run(date("2024-01-02")).await;

    assert!(report.is_success());
    assert!(report.persisted);
    assert_eq!(
        workspace.history_contents(),
        "date,price\n2024-01-01,10100\n2024-01-02,10190\n"
    );

    let chart = report.chart.clone().expect("chart should be rendered");
    assert_eq!(chart, workspace.chart_path());
    let image = image::open(&chart)?;
    assert_eq!((image.width(), image.height()), (400, 200));

    let texts = notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("₹ 10,190"));
    assert!(texts[0].contains("▲ ₹ 90 since 2024-01-01"));
    assert_eq!(notifier.images(), vec![workspace.chart_path()]);

    match &notifier.sent()[0] {
        Sent::Text { destination, .. } => assert_eq!(destination, CHAT_ID),
        other => panic!("expected the text message first, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_first_run_sends_text_only() {
    let server = MockServer::start().await;
    serve_page(&server, 200, GRT_PAGE).await;

    let workspace = Workspace::new();
    let notifier = RecordingNotifier::default();
    let watcher = static_watcher(
        &format!("{}/gold-rate", server.uri()),
        &workspace,
        Box::new(notifier.clone()),
    );

    let report = watcher.run(date("2024-01-02")).await;

    assert_eq!(
        report.outcome,
        RunOutcome::Success {
            price: Decimal::from(10190),
            previous: None,
        }
    );
    assert_eq!(workspace.history_contents(), "date,price\n2024-01-02,10190\n");
    assert!(!workspace.chart_path().exists());
    assert_eq!(notifier.texts().len(), 1);
    assert!(notifier.images().is_empty());
}

#[tokio::test]
async fn test_unavailable_site_leaves_history_untouched() {
    let server = MockServer::start().await;
    serve_page(&server, 503, "Service Unavailable").await;

    let workspace = Workspace::new();
    workspace.seed_history("date,price\n2024-01-01,10100\n");

    let notifier = RecordingNotifier::default();
    let watcher = static_watcher(
        &format!("{}/gold-rate", server.uri()),
        &workspace,
        Box::new(notifier.clone()),
    );

    let report = watcher.run(date("2024-01-02")).await;

    assert!(matches!(
        report.outcome,
        RunOutcome::Failure { class: FailureClass::SiteUnreachable, .. }
    ));
    assert_eq!(workspace.history_contents(), "date,price\n2024-01-01,10100\n");
    assert!(!workspace.chart_path().exists());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Sent::Text { text, .. } => {
            assert!(text.contains("Could not fetch today's gold rate"));
            assert!(text.contains("503"));
        }
        other => panic!("expected a failure message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_layout_change_is_reported_as_such() {
    let server = MockServer::start().await;
    serve_page(&server, 200, "<html><body><h1>New look!</h1></body></html>").await;

    let workspace = Workspace::new();
    let notifier = RecordingNotifier::default();
    let watcher = static_watcher(
        &format!("{}/gold-rate", server.uri()),
        &workspace,
        Box::new(notifier.clone()),
    );

    let report = watcher.run(date("2024-01-02")).await;

    assert!(matches!(
        report.outcome,
        RunOutcome::Failure { class: FailureClass::LayoutChanged, .. }
    ));
    assert!(!workspace.history_path().exists());
    assert!(notifier.texts()[0].contains("page layout changed"));
}

#[tokio::test]
async fn test_repeated_runs_compare_against_earlier_days() {
    let server = MockServer::start().await;
    serve_page(&server, 200, GRT_PAGE).await;

    let workspace = Workspace::new();
    workspace.seed_history("date,price\n2024-01-01,10190\n");

    let notifier = RecordingNotifier::default();
    let watcher = static_watcher(
        &format!("{}/gold-rate", server.uri()),
        &workspace,
        Box::new(notifier.clone()),
    );

    watcher.run(date("2024-01-02")).await;
    let report = watcher.run(date("2024-01-02")).await;

    assert!(report.persisted);
    assert_eq!(workspace.history_contents().lines().count(), 4);

    let texts = notifier.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts.iter().all(|text| text.contains("No change since 2024-01-01")));
}

#[tokio::test]
async fn test_telegram_delivery_end_to_end() -> anyhow::Result<()> {
    const TOKEN: &str = "999:integration";

    let server = MockServer::start().await;
    serve_page(&server, 200, GRT_PAGE).await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .and(body_partial_json(json!({"chat_id": CHAT_ID, "parse_mode": "HTML"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let workspace = Workspace::new();
    workspace.seed_history("date,price\n2024-01-01,10240\n");

    let telegram = TelegramNotifier::new(TOKEN, server.uri(), std::time::Duration::from_secs(5))?
        .with_caption("Gold Price History (₹ per 1g, 22K)");
    let watcher = static_watcher(
        &format!("{}/gold-rate", server.uri()),
        &workspace,
        Box::new(telegram),
    );

    let report = watcher.run(date("2024-01-02")).await;

    assert!(report.text_delivered);
    assert_eq!(report.image_delivered, Some(true));

    let requests = server.received_requests().await.unwrap_or_default();
    let message = requests
        .iter()
        .find(|request| request.url.path().ends_with("/sendMessage"))
        .expect("sendMessage request");
    let payload: serde_json::Value = serde_json::from_slice(&message.body)?;
    let text = payload["text"].as_str().unwrap_or_default();
    assert!(text.contains("▼ ₹ 50 since 2024-01-01"));

    Ok(())
}
