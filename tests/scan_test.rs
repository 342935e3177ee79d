//! End-to-end scan tests against a mock vocabulary server
//!
//! These drive the full pipeline: ID source, concurrent probers, ordered
//! aggregation, the moderation gate with scripted decisions, and registry
//! persistence.

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vocscan::config::Config;
use vocscan::models::Decision;
use vocscan::scanner::{Scanner, ScriptedInput};
use vocscan::storage::{ApprovedRegistry, RegistryStore};

fn vocab_page(name: &str, kind: &str, public: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><body>
<table><tr><td class="title">{name} (10)</td></tr></table>
<div class="user-content">
  <dl>
    <dt>Автор:</dt><dd><a href="/profile/1">racer</a></dd>
    <dt>Публичный:</dt><dd>{public}</dd>
    <dt>Тип словаря:</dt><dd>{kind}</dd>
  </dl>
  <div class="words"><table>
    <tr><td class="text">слово первое</td></tr>
    <tr><td class="text">слово второе</td></tr>
  </table></div>
</div></body></html>"#
    )
}

async fn mount_page(server: &MockServer, id: u64, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/vocs/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, id: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/vocs/{id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Everything not explicitly mounted is absent
async fn mount_catch_all(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/vocs/\d+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer, registry: std::path::PathBuf) -> Config {
    let mut config = Config::default();
    config.scanner.workers = 4;
    config.scanner.base_url = format!("{}/vocs/", server.uri());
    config.http.rate_limit = 200;
    config.http.probe_timeout_secs = 5;
    config.http.page_timeout_secs = 5;
    config.registry.path = registry;
    config
}

/// IDs 1-5 answer 404, 200, 404, 403, 200. The operator approves the first
/// found vocabulary and quits on the second. Finalization must stay in strict
/// ID order no matter how the concurrent probes interleave.
#[tokio::test]
async fn test_scan_orders_results_and_persists_approvals() {
    let server = MockServer::start().await;
    mount_status(&server, 1, 404).await;
    mount_page(&server, 2, vocab_page("Пословицы", "Слова", "Да")).await;
    mount_status(&server, 3, 404).await;
    mount_status(&server, 4, 403).await;
    mount_page(&server, 5, vocab_page("Цитаты", "Фразы", "Да")).await;
    mount_catch_all(&server).await;

    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("registry.json");
    let mut config = test_config(&server, registry_path.clone());
    config.scanner.start_id = Some(1);

    let scanner = Scanner::new(config).unwrap();
    let input = Arc::new(ScriptedInput::new([Decision::Approve, Decision::Quit]));
    let report = scanner.run(input).await.unwrap();

    assert_eq!(report.start_id, 1);
    // ID 5 was still in moderation when the operator quit
    assert_eq!(report.next_id, 5);
    assert_eq!(report.approved, 1);
    assert_eq!(report.found, 2);
    assert!(report.absent >= 3, "1, 3, 4 plus any overshoot");

    let registry = RegistryStore::new(&registry_path).load().unwrap();
    let words: Vec<u64> = registry.ids("words").unwrap().iter().copied().collect();
    assert_eq!(words, vec![2]);
    assert!(registry.ids("phrases").is_none(), "5 was never approved");
}

/// With no explicit start ID the scan resumes one past the registry's
/// highest persisted ID.
#[tokio::test]
async fn test_scan_resumes_past_registry_max() {
    let server = MockServer::start().await;
    mount_page(&server, 11, vocab_page("Тексты", "Тексты", "Да")).await;
    mount_catch_all(&server).await;

    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("registry.json");

    let mut seeded = ApprovedRegistry::new();
    seeded.approve("words", 10);
    RegistryStore::new(&registry_path).flush(&seeded).unwrap();

    let config = test_config(&server, registry_path.clone());
    let scanner = Scanner::new(config).unwrap();
    let input = Arc::new(ScriptedInput::new([Decision::Quit]));
    let report = scanner.run(input).await.unwrap();

    assert_eq!(report.start_id, 11);
    assert_eq!(report.next_id, 11, "quit left 11 unresolved");

    let registry = RegistryStore::new(&registry_path).load().unwrap();
    assert_eq!(registry.len(), 1, "nothing new approved");
    assert_eq!(registry.max_id(), Some(10));
}

/// A registry flush failure on quit must neither hang the pipeline nor drop
/// the in-memory approvals: the scan still winds down and reports its
/// counters, with the approvals retained for the final flush attempt.
#[tokio::test]
async fn test_flush_failure_does_not_hang_scan() {
    let server = MockServer::start().await;
    mount_page(&server, 1, vocab_page("Первый", "Слова", "Да")).await;
    mount_page(&server, 2, vocab_page("Второй", "Слова", "Да")).await;
    mount_catch_all(&server).await;

    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("registry.json");
    // Squat on the temp path every flush writes through, so the write fails
    std::fs::create_dir(dir.path().join("registry.json.tmp")).unwrap();

    let mut config = test_config(&server, registry_path.clone());
    config.scanner.start_id = Some(1);

    let scanner = Scanner::new(config).unwrap();
    let input = Arc::new(ScriptedInput::new([Decision::Approve, Decision::Quit]));
    let report = tokio::time::timeout(Duration::from_secs(10), scanner.run(input))
        .await
        .expect("scan must stop after quit even when the flush fails")
        .unwrap();

    assert_eq!(report.approved, 1);
    assert_eq!(report.next_id, 2, "quit left 2 unresolved");
    assert_eq!(report.registry_total, 1, "approval kept in memory");
    assert!(!registry_path.exists(), "nothing was persisted");
}

/// Non-public and URL-kind vocabularies are auto-skipped without consuming an
/// operator decision.
#[tokio::test]
async fn test_scan_prefilters_without_prompting() {
    let server = MockServer::start().await;
    mount_page(&server, 1, vocab_page("Секрет", "Слова", "Нет")).await;
    mount_page(&server, 2, vocab_page("Ссылки", "URL", "Да")).await;
    mount_page(&server, 3, vocab_page("Открытый", "Слова", "Да")).await;
    mount_catch_all(&server).await;

    let dir = tempdir().unwrap();
    let mut config = test_config(&server, dir.path().join("registry.json"));
    config.scanner.start_id = Some(1);

    let scanner = Scanner::new(config).unwrap();
    // Only ID 3 reaches the operator; the single Quit must land on it
    let input = Arc::new(ScriptedInput::new([Decision::Quit]));
    let report = scanner.run(input).await.unwrap();

    assert_eq!(report.skipped, 2, "1 and 2 auto-skipped");
    assert_eq!(report.approved, 0);
    assert_eq!(report.next_id, 3);
}
