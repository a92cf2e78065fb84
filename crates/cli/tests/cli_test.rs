use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn base_cmd() -> Command {
    let mut cmd = Command::cargo_bin("foodfinder").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn write_raw_dataset(dir: &TempDir) {
    let raw = dir.path().join("raw");
    fs::create_dir_all(raw.join("photos")).unwrap();

    let businesses = [
        r#"{"business_id": "b1", "name": "Bella Napoli", "city": "Philadelphia", "state": "PA", "stars": 4.5, "review_count": 120, "is_open": 1, "categories": "Pizza, Italian, Restaurants"}"#,
        r#"{"business_id": "b2", "name": "Closed Diner", "city": "Tampa", "state": "FL", "stars": 3.0, "review_count": 10, "is_open": 0, "categories": "Diners, Restaurants"}"#,
        r#"{"business_id": "b3", "name": "Quick Lube", "city": "Reno", "state": "NV", "stars": 2.0, "review_count": 5, "is_open": 1, "categories": "Automotive"}"#,
        r#"{"business_id": "b4", "name": "Pho Saigon", "city": "Tucson", "state": "AZ", "stars": 4.0, "review_count": 80, "is_open": 1, "categories": "Vietnamese, Food"}"#,
    ];
    fs::write(
        raw.join("yelp_academic_dataset_business.json"),
        businesses.join("\n"),
    )
    .unwrap();

    fs::write(
        raw.join("photos.json"),
        r#"{"photo_id": "p1", "business_id": "b1", "caption": "Margherita", "label": "food"}"#,
    )
    .unwrap();
}

#[test]
fn help_lists_subcommands() {
    base_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("process-data"))
        .stdout(contains("build-indices"))
        .stdout(contains("rebuild-metadata"))
        .stdout(contains("search-text"))
        .stdout(contains("describe-image"))
        .stdout(contains("chat"));
}

#[test]
fn text_only_conflicts_with_image_only() {
    base_cmd()
        .args(["build-indices", "--text-only", "--image-only"])
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

#[test]
fn process_data_writes_restaurants_and_sample() {
    let dir = TempDir::new().unwrap();
    write_raw_dataset(&dir);

    base_cmd()
        .args(["--data-dir"])
        .arg(dir.path())
        .args(["process-data", "--sample", "1"])
        .assert()
        .success()
        .stdout(contains("Open restaurants: 2"))
        .stdout(contains("Created sample dataset with 1 restaurants"));

    let processed = dir.path().join("processed");
    let all: Value =
        serde_json::from_str(&fs::read_to_string(processed.join("restaurants.json")).unwrap())
            .unwrap();
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|r| r["business_id"] != "b2"));

    let sample: Value = serde_json::from_str(
        &fs::read_to_string(processed.join("restaurants_sample.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(sample.as_array().unwrap().len(), 1);
}

#[test]
fn process_data_without_raw_files_fails() {
    let dir = TempDir::new().unwrap();

    base_cmd()
        .arg("--data-dir")
        .arg(dir.path())
        .arg("process-data")
        .assert()
        .failure()
        .stderr(contains("Failed to read businesses"));
}

#[test]
fn stats_on_empty_memory_store() {
    let dir = TempDir::new().unwrap();

    base_cmd()
        .arg("--data-dir")
        .arg(dir.path())
        .args(["--memory", "stats"])
        .assert()
        .success()
        .stdout(contains("Restaurants (text index): 0"))
        .stdout(contains("Photos (image index): 0"));
}

#[test]
fn describe_image_reports_missing_file() {
    base_cmd()
        .args(["describe-image", "/no/such/dish.jpg", "What cuisine is this?"])
        .assert()
        .success()
        .stdout(contains("Error analyzing image"))
        .stdout(contains("Most likely").not());
}

#[test]
fn reset_indices_on_empty_dir() {
    let dir = TempDir::new().unwrap();

    base_cmd()
        .arg("--index-dir")
        .arg(dir.path())
        .arg("reset-indices")
        .assert()
        .success()
        .stdout(contains("nothing to remove"));
}

#[test]
fn reset_indices_removes_store() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("foodfinder.db");
    fs::create_dir_all(&store).unwrap();
    fs::write(store.join("CURRENT"), "MANIFEST-000001").unwrap();

    base_cmd()
        .arg("--index-dir")
        .arg(dir.path())
        .arg("reset-indices")
        .assert()
        .success()
        .stdout(contains("Removed index store"));

    assert!(!store.exists());
}

#[test]
fn search_text_points_at_tei_settings_when_unreachable() {
    base_cmd()
        .env("TEI_PROVIDER", "tei")
        .env("TEI_URL", "http://127.0.0.1:9")
        .args(["--memory", "search-text", "pizza"])
        .assert()
        .failure()
        .stderr(contains("embeddings service is not reachable"))
        .stderr(contains("TEI_URL"))
        .stderr(contains("docker compose").not());
}
