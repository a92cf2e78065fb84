//! Common test utilities

use foodfinder_agents::{ClipEncoder, MultimodalRetriever, TeiClient};
use foodfinder_core::Restaurant;
use foodfinder_db::schema::TEXT_DIMENSION;
use foodfinder_db::{init_memory, Repository};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create a test repository with in-memory database
pub async fn create_test_repo() -> Repository {
    let db = init_memory().await.expect("Failed to create test database");
    Repository::new(db)
}

/// A TEI server that answers every `/embed` call with `count` copies of one vector
pub async fn mock_tei(count: usize) -> MockServer {
    let server = MockServer::start().await;
    let vectors: Vec<Vec<f32>> = (0..count).map(|_| vec![0.05; TEXT_DIMENSION]).collect();
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(vectors)))
        .mount(&server)
        .await;
    server
}

pub fn retriever(repo: Repository, tei_url: &str) -> Arc<MultimodalRetriever> {
    Arc::new(MultimodalRetriever::new(
        repo,
        TeiClient::new(tei_url),
        ClipEncoder::new(std::env::temp_dir()),
    ))
}

pub fn sample_restaurants() -> Vec<Restaurant> {
    vec![
        Restaurant::new("r1", "Bella Napoli")
            .with_categories("Pizza, Italian")
            .with_location("10 Market St", "Philadelphia", "PA")
            .with_rating(4.5, 210),
        Restaurant::new("r2", "Pho Saigon")
            .with_categories("Vietnamese, Soup")
            .with_location("55 Canal St", "New Orleans", "LA")
            .with_rating(4.0, 98),
        Restaurant::new("r3", "Taqueria Sol")
            .with_categories("Mexican, Tacos")
            .with_location("3 Mission Ave", "Tucson", "AZ")
            .with_rating(3.5, 40),
    ]
}
