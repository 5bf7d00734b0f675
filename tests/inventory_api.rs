//! Inventory resource tests against a wiremock server.

use futures_util::TryStreamExt;
use mender_sdk::api::ListDevicesQuery;
use mender_sdk::models::{
    AttributeScope, DeviceSearchFilter, FilterDefinition, FilterPredicate, SortOrder,
};
use mender_sdk::{Client, Error, RetryPolicy};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const INVENTORY: &str = "/api/management/v2/inventory";

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .token("test-token")
        .retry_policy(
            RetryPolicy::default()
                .max_retries(2)
                .base_delay(Duration::from_millis(5))
                .jitter(false),
        )
        .build()
        .unwrap()
}

fn device(id: &str) -> Value {
    json!({
        "id": id,
        "attributes": [
            {"name": "device_type", "value": "raspberrypi4", "scope": "identity"},
            {"name": "location", "value": "lab", "scope": "tags"}
        ],
        "updated_ts": "2024-05-01T12:00:00Z"
    })
}

fn devices(prefix: &str, count: usize) -> Value {
    Value::Array((0..count).map(|i| device(&format!("{}-{}", prefix, i))).collect())
}

#[tokio::test]
async fn test_list_devices_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/devices", INVENTORY)))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "2"))
        .and(query_param("sort", "updated_ts:desc"))
        .and(query_param("has_group", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(devices("dev", 2))
                .insert_header("X-Total-Count", "5"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let query = ListDevicesQuery::new()
        .page(1, 2)
        .sort("updated_ts", SortOrder::Desc)
        .has_group(true);
    let page = client.inventory().list_devices(&query).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_count, Some(5));
    assert_eq!(page.total_pages(), Some(3));
    assert!(page.has_more);
    assert_eq!(
        page.items[0].attribute_value("device_type", Some(AttributeScope::Identity)),
        Some(&json!("raspberrypi4"))
    );
}

#[tokio::test]
async fn test_devices_stream_walks_all_pages() {
    let mock_server = MockServer::start().await;

    for (page, count) in [("1", 3), ("2", 3), ("3", 1)] {
        Mock::given(method("GET"))
            .and(path(format!("{}/devices", INVENTORY)))
            .and(query_param("page", page))
            .and(query_param("per_page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(devices(page, count)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = client_for(&mock_server);
    let all: Vec<_> = client
        .inventory()
        .devices(ListDevicesQuery::new().group("prod"), Some(3))
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["1-0", "1-1", "1-2", "2-0", "2-1", "2-2", "3-0"]);
}

#[tokio::test]
async fn test_devices_stream_surfaces_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/devices", INVENTORY)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "token expired"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result: Result<Vec<_>, _> = client
        .inventory()
        .devices(ListDevicesQuery::new(), None)
        .try_collect()
        .await;

    match result {
        Err(Error::Authentication(err)) => assert_eq!(err.message, "token expired"),
        other => panic!("Expected Authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_device_and_tags() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/devices/dev-1", INVENTORY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(device("dev-1")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let inventory_client = client_for(&mock_server);
    let inventory = inventory_client.inventory();

    let device = inventory.get_device("dev-1").await.unwrap();
    assert_eq!(device.id, "dev-1");
    assert!(device.updated_ts.is_some());

    let tags = inventory.device_tags("dev-1").await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "location");
}

#[tokio::test]
async fn test_missing_device_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/devices/ghost", INVENTORY)))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": "Device not found"}))
                .insert_header("X-Request-Id", "abc-123"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    match client.inventory().get_device("ghost").await {
        Err(Error::NotFound(err)) => {
            assert_eq!(err.message, "Device not found");
            assert_eq!(err.request_id.as_deref(), Some("abc-123"));
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_set_device_tags() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{}/devices/dev-1/attributes", INVENTORY)))
        .and(body_json(json!([
            {"name": "env", "value": "prod", "scope": "tags"}
        ])))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .inventory()
        .set_device_tags("dev-1", [("env", "prod")])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_group_operations() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/groups", INVENTORY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"groups": ["prod", "lab"]})))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{}/devices/dev-1/group", INVENTORY)))
        .and(body_json(json!({"group": "prod"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/devices/dev-1/group", INVENTORY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"group": "prod"})))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("{}/groups/prod/devices", INVENTORY)))
        .and(body_json(json!(["dev-2", "dev-3"])))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/groups/prod/devices", INVENTORY)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["dev-1", "dev-2", "dev-3"]))
                .insert_header("X-Total-Count", "3"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/groups/prod/devices/dev-1", INVENTORY)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let inventory = client.inventory();

    let groups = inventory.list_groups(None).await.unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["prod", "lab"]);

    inventory.add_device_to_group("dev-1", "prod").await.unwrap();
    assert_eq!(
        inventory.device_group("dev-1").await.unwrap().as_deref(),
        Some("prod")
    );

    inventory
        .add_devices_to_group("prod", &["dev-2".to_string(), "dev-3".to_string()])
        .await
        .unwrap();

    let members = inventory.group_devices("prod", 1, 20).await.unwrap();
    assert_eq!(members.items, vec!["dev-1", "dev-2", "dev-3"]);
    assert_eq!(members.total_count, Some(3));
    assert!(!members.has_more);

    inventory.remove_device_from_group("dev-1", "prod").await.unwrap();
}

#[tokio::test]
async fn test_ungrouped_device_has_no_group() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/devices/dev-9/group", INVENTORY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"group": null})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert_eq!(client.inventory().device_group("dev-9").await.unwrap(), None);
}

#[tokio::test]
async fn test_search_devices() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/filters/search", INVENTORY)))
        .and(body_json(json!({
            "page": 1,
            "per_page": 10,
            "filters": [
                {"attribute": "device_type", "scope": "identity", "type": "$eq", "value": "raspberrypi4"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(devices("match", 2))
                .insert_header("X-Total-Count", "12"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .inventory()
        .search_by_attribute("device_type", "raspberrypi4", AttributeScope::Identity, 1, 10)
        .await
        .unwrap();

    assert_eq!(result.devices.len(), 2);
    assert_eq!(result.total_count, Some(12));
}

#[tokio::test]
async fn test_saved_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/filters", INVENTORY)))
        .and(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap_or_default();
            body["name"] == "edge-nodes" && body["terms"][0]["type"] == "$regex"
        })
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", "/api/management/v2/inventory/filters/flt-7"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/filters/flt-7", INVENTORY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "flt-7",
            "name": "edge-nodes",
            "terms": [
                {"attribute": "hostname", "scope": "inventory", "type": "$regex", "value": ".*edge.*"}
            ]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/filters/flt-7", INVENTORY)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let inventory = client.inventory();

    let terms = [FilterDefinition::new().add(FilterPredicate::contains(
        "hostname",
        "edge",
        AttributeScope::Inventory,
    ))];
    let id = inventory.create_filter("edge-nodes", &terms).await.unwrap();
    assert_eq!(id, "flt-7");

    let filter = inventory.get_filter(&id).await.unwrap();
    assert_eq!(filter.name, "edge-nodes");
    assert_eq!(filter.terms, terms[0].predicates);

    inventory.delete_filter(&id).await.unwrap();
}

#[tokio::test]
async fn test_search_validation_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/filters/search", INVENTORY)))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "invalid filter type"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let error = client
        .inventory()
        .search_devices(&DeviceSearchFilter::new())
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Validation(ref e) if e.message == "invalid filter type"));
}
