// Tests for graph resolution and link completeness

use minidb_client::PortalClient;
use minidb_core::MiniDbError;
use minidb_core::config::Strategy;
use minidb_core::profile::ProfileSet;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, url_path: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolve_binds_declared_links() {
    let server = MockServer::start().await;
    let client = PortalClient::new(&server.uri()).unwrap();

    let doc = json!({
        "Donor": {"properties": {}},
        "Sample": {"properties": {"donor": {"type": "string", "linkTo": "Donor"}}}
    });
    let strategy = Strategy::new();
    let mut set = ProfileSet::from_schema_document(&doc, &strategy).unwrap();
    set.resolve(&client, &strategy).await.unwrap();

    assert_eq!(
        set.get("Sample").unwrap().links.get("donor").map(String::as_str),
        Some("Donor")
    );
    assert!(set.get("Donor").unwrap().links.is_empty());
}

#[tokio::test]
async fn test_resolve_fetches_missing_profiles_on_demand() {
    let server = MockServer::start().await;
    mount_json(&server, "/profiles/Donor", json!({"properties": {}})).await;

    let client = PortalClient::new(&server.uri()).unwrap();
    let doc = json!({
        "Sample": {"properties": {"donor": {"type": "string", "linkTo": "Donor"}}}
    });
    let strategy = Strategy::new();
    let mut set = ProfileSet::from_schema_document(&doc, &strategy).unwrap();
    set.resolve(&client, &strategy).await.unwrap();

    assert!(set.get("Donor").is_some());
    assert!(set.get("Donor").unwrap().sampling_policies.is_empty());
}

#[tokio::test]
async fn test_resolve_follows_transitively_missing_profiles() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/profiles/Donor",
        json!({"properties": {"lab": {"type": "string", "linkTo": "Lab"}}}),
    )
    .await;
    mount_json(&server, "/profiles/Lab", json!({"properties": {}})).await;

    let client = PortalClient::new(&server.uri()).unwrap();
    let doc = json!({
        "Sample": {"properties": {"donor": {"type": "string", "linkTo": "Donor"}}}
    });
    let strategy = Strategy::new();
    let mut set = ProfileSet::from_schema_document(&doc, &strategy).unwrap();
    set.resolve(&client, &strategy).await.unwrap();

    // Link-complete: every discovered target exists and every link is bound.
    for profile in set.profiles.values() {
        for (prop, _) in profile.find_links().unwrap() {
            let target = profile.links.get(&prop).expect("link must be bound");
            assert!(set.get(target).is_some());
        }
    }
    assert_eq!(
        set.get("Donor").unwrap().links.get("lab").map(String::as_str),
        Some("Lab")
    );
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let server = MockServer::start().await;
    mount_json(&server, "/profiles/Donor", json!({"properties": {}})).await;

    let client = PortalClient::new(&server.uri()).unwrap();
    let doc = json!({
        "Sample": {"properties": {"donor": {"type": "string", "linkTo": "Donor"}}}
    });
    let strategy = Strategy::new();
    let mut set = ProfileSet::from_schema_document(&doc, &strategy).unwrap();
    set.resolve(&client, &strategy).await.unwrap();
    let profile_count = set.profiles.len();
    let sample_links = set.get("Sample").unwrap().links.clone();

    set.resolve(&client, &strategy).await.unwrap();
    assert_eq!(set.profiles.len(), profile_count);
    assert_eq!(set.get("Sample").unwrap().links, sample_links);
}

#[tokio::test]
async fn test_unfetchable_missing_profile_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profiles/Donor"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = PortalClient::new(&server.uri()).unwrap().with_max_retries(0);
    let doc = json!({
        "Sample": {"properties": {"donor": {"type": "string", "linkTo": "Donor"}}}
    });
    let strategy = Strategy::new();
    let mut set = ProfileSet::from_schema_document(&doc, &strategy).unwrap();

    let err = set.resolve(&client, &strategy).await.unwrap_err();
    assert!(matches!(err, MiniDbError::LinkResolution { ref profile, .. } if profile == "Donor"));
}

#[tokio::test]
async fn test_on_demand_profile_picks_up_declared_strategy() {
    let server = MockServer::start().await;
    mount_json(&server, "/profiles/Donor", json!({"properties": {}})).await;

    let client = PortalClient::new(&server.uri()).unwrap();
    let doc = json!({
        "Sample": {"properties": {"donor": {"type": "string", "linkTo": "Donor"}}}
    });
    // The strategy names a profile missing from the snapshot; attach it once
    // the schema is fetched on demand.
    let strategy: Strategy = serde_json::from_value(json!({
        "Donor": {"subsampling_rate": 0.5, "subsampling_min": 1}
    }))
    .unwrap();

    let mut set = ProfileSet::from_schema_document(&doc, &Strategy::new()).unwrap();
    set.resolve(&client, &strategy).await.unwrap();

    let donor = set.get("Donor").unwrap();
    assert_eq!(donor.sampling_policies.len(), 1);
    assert_eq!(donor.sampling_policies[0].rate, 0.5);
}
