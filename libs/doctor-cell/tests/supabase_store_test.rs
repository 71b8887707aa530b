use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::InMemoryUserDirectory;
use doctor_cell::{
    AvailabilityError, AvailabilityStore, SupabaseAvailabilityStore, TimeWindow, WindowSpec,
};
use shared_database::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

async fn store_for(server: &MockServer, doctor: &TestUser) -> SupabaseAvailabilityStore {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    let directory = Arc::new(InMemoryUserDirectory::new());
    directory.insert(doctor.to_user()).await;

    SupabaseAvailabilityStore::new(Arc::new(SupabaseClient::new(&config)), directory, &config)
}

#[tokio::test]
async fn test_get_windows_queries_available_rules_of_weekday() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@clinic.test");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("day_of_week", "eq.1"))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_row(doctor.id, 1, 840, 960),
            MockSupabaseResponses::availability_row(doctor.id, 1, 540, 720),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, &doctor).await;
    let windows = store.get_windows(doctor.id, 1).await.unwrap();

    assert_eq!(windows, vec![TimeWindow::new(540, 720), TimeWindow::new(840, 960)]);
}

#[tokio::test]
async fn test_set_windows_calls_replacement_function() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@clinic.test");

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/replace_doctor_windows"))
        .and(body_partial_json(json!({
            "p_doctor_id": doctor.id,
            "p_day_of_week": 1,
            "p_windows": [{ "start_time": 540, "end_time": 720, "is_available": true }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_row(doctor.id, 1, 540, 720),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, &doctor).await;
    let stored = store
        .set_windows(doctor.id, 1, vec![WindowSpec::available(540, 720)])
        .await
        .unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].window(), TimeWindow::new(540, 720));
}

#[tokio::test]
async fn test_invalid_windows_never_reach_the_store() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@clinic.test");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server, &doctor).await;
    let result = store
        .set_windows(doctor.id, 1, vec![WindowSpec::available(720, 540)])
        .await;

    assert_matches!(result, Err(AvailabilityError::Validation(_)));
}

#[tokio::test]
async fn test_backend_failure_is_reported() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@clinic.test");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(MockSupabaseResponses::error_response("boom", "XX000")),
        )
        .mount(&server)
        .await;

    let store = store_for(&server, &doctor).await;
    assert_matches!(store.get_schedule(doctor.id).await, Err(AvailabilityError::Backend(_)));
}
