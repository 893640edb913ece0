use attio_universal::batch::{BatchConfig, BatchExecutor, BatchItem, BatchOptions};
use attio_universal::operations::{
    FilterCondition, FilterOperator, MockBackendConfig, MockRecordBackend, OperationKind,
    RecordOperations, SearchQuery, UniversalRecordService,
};
use attio_universal::{RecordData, ResourceType, UniversalError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

static TRACING: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

fn record(value: Value) -> RecordData {
    value.as_object().cloned().unwrap()
}

fn setup() -> (Arc<MockRecordBackend>, UniversalRecordService) {
    let backend = Arc::new(MockRecordBackend::new());
    let service = UniversalRecordService::new(backend.clone()).unwrap();
    (backend, service)
}

#[tokio::test]
async fn test_duplicate_person_points_at_existing_record() {
    init_tracing();
    let (_backend, service) = setup();
    let jane = record(json!({
        "name": {"first_name": "Jane", "last_name": "Doe", "full_name": "Jane Doe"},
        "email_addresses": ["jane@example.com"]
    }));

    let created = service.create_record(ResourceType::People, &jane).await.unwrap();
    let existing_id = attio_universal::resource::record_id(&created).unwrap();

    let err = service
        .create_record(ResourceType::People, &jane)
        .await
        .unwrap_err();
    assert_eq!(err.kind_name(), Some("duplicate_error"));
    let message = err.to_string();
    assert!(message.contains(r#"A person with email_addresses "jane@example.com" already exists"#));
    assert!(message.contains(&existing_id));
}

#[tokio::test]
async fn test_unknown_attribute_on_update_suggests_slug() {
    init_tracing();
    let (backend, service) = setup();
    let company = backend
        .insert_record(ResourceType::Companies, record(json!({"name": "Acme"})))
        .await;
    let id = attio_universal::resource::record_id(&company).unwrap();

    let err = service
        .update_record(ResourceType::Companies, &id, &record(json!({"descriptoin": "Anvils"})))
        .await
        .unwrap_err();

    assert_eq!(err.kind_name(), Some("attribute_not_found"));
    let message = err.to_string();
    assert!(message.contains(r#"Attribute "descriptoin" does not exist on companies."#));
    assert!(message.contains("description"));
}

#[tokio::test]
async fn test_remote_outage_is_reported_as_fallback() {
    init_tracing();
    let backend = Arc::new(MockRecordBackend::new_with_config(MockBackendConfig {
        fail_create: true,
        failure_message: "Service temporarily unavailable".to_string(),
        ..Default::default()
    }));
    let service = UniversalRecordService::new(backend).unwrap();

    let err = service
        .create_record(ResourceType::Deals, &record(json!({"name": "Renewal"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind_name(), Some("create_error"));
    assert!(err
        .to_string()
        .starts_with("Failed to create deal: Service temporarily unavailable"));
}

#[tokio::test]
async fn test_unauthorized_create_is_returned_unchanged() {
    init_tracing();
    let backend = Arc::new(MockRecordBackend::new_with_config(MockBackendConfig {
        fail_create: true,
        failure_message: "401 Unauthorized".to_string(),
        ..Default::default()
    }));
    let service = UniversalRecordService::new(backend).unwrap();

    let err = service
        .create_record(ResourceType::Companies, &record(json!({"name": "Acme"})))
        .await
        .unwrap_err();

    assert!(err.as_remote().is_some());
    assert_eq!(err.kind_name(), None);
    assert_eq!(err.to_string(), "401 Unauthorized");
}

#[tokio::test]
async fn test_forbidden_update_is_returned_unchanged() {
    init_tracing();
    let backend = Arc::new(MockRecordBackend::new_with_config(MockBackendConfig {
        fail_update: true,
        failure_message: "403 Forbidden: token lacks record write scope".to_string(),
        ..Default::default()
    }));
    let company = backend
        .insert_record(ResourceType::Companies, record(json!({"name": "Acme"})))
        .await;
    let id = attio_universal::resource::record_id(&company).unwrap();
    let service = UniversalRecordService::new(backend).unwrap();

    let err = service
        .update_record(ResourceType::Companies, &id, &record(json!({"name": "Acme Corp"})))
        .await
        .unwrap_err();

    assert!(matches!(err, UniversalError::Remote(_)));
    assert_eq!(err.kind_name(), None);
    assert_eq!(err.to_string(), "403 Forbidden: token lacks record write scope");
}

#[tokio::test]
async fn test_status_like_numbers_still_get_enhanced() {
    init_tracing();
    let backend = Arc::new(MockRecordBackend::new_with_config(MockBackendConfig {
        fail_create: true,
        failure_message: "Network timeout after 4013ms".to_string(),
        ..Default::default()
    }));
    let service = UniversalRecordService::new(backend).unwrap();

    let err = service
        .create_record(ResourceType::Companies, &record(json!({"name": "Acme"})))
        .await
        .unwrap_err();

    assert!(err.as_remote().is_none());
    assert_eq!(err.kind_name(), Some("create_error"));
    assert!(err.to_string().contains("Network timeout after 4013ms"));
}

#[tokio::test]
async fn test_search_text_and_filters() {
    init_tracing();
    let (backend, service) = setup();
    for (name, stage) in [("Acme renewal", "Lead"), ("Acme expansion", "Won"), ("Globex pilot", "Lead")] {
        backend
            .insert_record(ResourceType::Deals, record(json!({"name": name, "stage": stage})))
            .await;
    }

    let acme = service
        .search_records(ResourceType::Deals, &SearchQuery::text("acme"))
        .await
        .unwrap();
    assert_eq!(acme.len(), 2);

    let leads = service
        .search_records(
            ResourceType::Deals,
            &SearchQuery::new().filter(FilterCondition::equals("stage", "lead")),
        )
        .await
        .unwrap();
    assert_eq!(leads.len(), 2);

    let partial = service
        .search_records(
            ResourceType::Deals,
            &SearchQuery::new().filter(FilterCondition::new("stage", FilterOperator::Contains, "Wo")),
        )
        .await
        .unwrap();
    assert_eq!(partial.len(), 1);

    let err = service
        .search_records(
            ResourceType::Deals,
            &SearchQuery::new().filter(FilterCondition::equals("stage", "Negotiation")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UniversalError::FilterValidation { .. }));
    assert!(err.to_string().contains("Negotiation"));
}

#[tokio::test]
async fn test_search_paging() {
    init_tracing();
    let (backend, service) = setup();
    for i in 0..5 {
        backend
            .insert_record(ResourceType::Tasks, record(json!({"content": format!("Task {i}")})))
            .await;
    }

    let page = service
        .search_records(ResourceType::Tasks, &SearchQuery::new().limit(2).offset(3))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["values"]["content"], json!("Task 3"));

    let err = service
        .search_records(ResourceType::Tasks, &SearchQuery::new().limit(0))
        .await
        .unwrap_err();
    assert!(matches!(err, UniversalError::InvalidInput(_)));
}

#[tokio::test]
async fn test_generic_record_batch_uses_object_schema() {
    init_tracing();
    let (backend, service) = setup();
    let executor = BatchExecutor::with_config(
        Arc::new(service),
        BatchConfig {
            max_batch_size: 10,
            concurrency: 2,
            delay: Duration::from_millis(1),
        },
    );
    let options = BatchOptions {
        object: Some("vendors".to_string()),
        ..Default::default()
    };

    let items = vec![
        BatchItem::create(record(json!({"name": "Acme Supplies", "vendors_code": "V-1"}))),
        BatchItem::create(record(json!({"name": "Globex Parts", "partners_code": "P-1"}))),
    ];

    let result = executor
        .execute_batch(ResourceType::Records, OperationKind::Create, items, &options)
        .await
        .unwrap();

    assert!(result.operations[0].success);
    let failure = result.operations[1].error.as_deref().unwrap();
    assert!(failure.contains(r#"Attribute "partners_code" does not exist on records."#));
    assert_eq!(backend.record_count(ResourceType::Records).await, 1);
}
