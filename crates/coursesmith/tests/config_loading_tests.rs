//! Table-driven config validation, plus a worker wired from a loaded config.

mod common;

use coursesmith::config::load_config_from_str;
use coursesmith::db::asset_repo;
use coursesmith::worker::scheduler_from_config;
use coursesmith::{AssetStatus, Database, NewAsset};

use common::TestHarness;

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "empty_object",
        config_json: "{}",
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "explicit_intervals",
        config_json: r#"{ "idle_interval_secs": 10, "error_backoff_secs": 30 }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "offline_llm",
        config_json: r#"{ "llm": { "api_key_env": null, "max_tokens": 400 } }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "wrong_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "relative_public_url",
        config_json: r#"{ "public_base_url": "storage/assets" }"#,
        should_succeed: false,
        expected_error: Some("public_base_url"),
    },
    ConfigTestCase {
        name: "backoff_shorter_than_idle",
        config_json: r#"{ "idle_interval_secs": 60, "error_backoff_secs": 30 }"#,
        should_succeed: false,
        expected_error: Some("error_backoff_secs"),
    },
    ConfigTestCase {
        name: "unknown_log_format",
        config_json: r#"{ "log_format": "xml" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "temperature_out_of_range",
        config_json: r#"{ "llm": { "temperature": 3.5 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
];

#[test]
fn test_json_config_loading() {
    for case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        match (result, case.should_succeed) {
            (Ok(_), true) => {}
            (Ok(_), false) => panic!("[{}] expected failure, config loaded", case.name),
            (Err(e), true) => panic!("[{}] expected success, got: {}", case.name, e),
            (Err(e), false) => {
                if let Some(expected) = case.expected_error {
                    assert!(
                        e.to_string().contains(expected),
                        "[{}] error {:?} should contain {:?}",
                        case.name,
                        e.to_string(),
                        expected
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn test_worker_wired_from_config() {
    let harness = TestHarness::new();
    harness.write_document("hr/leave.md", "# Leave Policy\n\n## Requesting\n- Submit two weeks ahead\n");

    let json = serde_json::json!({
        "documents_dir": harness.documents_dir,
        "artifacts_dir": harness.artifacts_dir,
        "public_base_url": "https://assets.example.org/files/",
        "concurrency": 2,
        "llm": { "api_key_env": null }
    });
    let config = load_config_from_str(&json.to_string()).unwrap();

    let db = Database::open_in_memory().unwrap();
    asset_repo::insert(
        &db,
        &NewAsset::new("job-aid", "doc://hr/leave.md").with_id("leave-1"),
    )
    .unwrap();

    let scheduler = scheduler_from_config(&config, db.clone()).unwrap();
    assert_eq!(scheduler.settings().concurrency, 2);

    let outcome = scheduler.poll_once().await.unwrap();
    assert_eq!(outcome.completed, 1);

    let asset = asset_repo::find_by_id(&db, "leave-1").unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Completed);
    assert_eq!(
        asset.output_url.as_deref(),
        Some("https://assets.example.org/files/processed-assets/job_aid_leave-1.pdf")
    );
    assert!(harness.artifact_path("job_aid_leave-1.pdf").exists());
}
