use flowcore::serde_ext::escaped_json;
use flowcore::services::{FsResourceProvider, InMemorySharedDataStore, ResourceProvider, SharedDataStore};
use flowcore::{
    innermost_message, ActivityError, DatafeedEvent, EventPayload, EventTrigger, ExecutionErrorRecord,
    FlowError, FormRepliedEvent, MessageReceivedEvent, Value, Variable, WorkflowDefinition,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

#[test]
fn test_value_text_form() {
    assert_eq!(Value::Number(200.0).to_text(), "200");
    assert_eq!(Value::Number(1.5).to_text(), "1.5");
    assert_eq!(Value::Null.to_text(), "");
    assert_eq!(Value::from("plain").to_text(), "plain");
    assert_eq!(
        Value::Array(vec![Value::from("a"), Value::Bool(true)]).to_text(),
        r#"["a",true]"#
    );
}

#[test]
fn test_value_from_plain_json() {
    let value: Value = serde_json::from_value(json!({ "name": "Ada", "tags": ["x"] })).unwrap();
    let map = match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {:?}", other),
    };
    assert_eq!(map["name"], Value::from("Ada"));
    assert_eq!(map["tags"], Value::Array(vec![Value::from("x")]));
}

#[test]
fn test_variable_storage_form() {
    let scalar = Variable::from_value(Value::from("hi")).unwrap();
    assert_eq!(scalar.as_native(), Some(&Value::from("hi")));

    let list = Variable::from_value(Value::Array(vec![Value::from("a"), Value::from("b")])).unwrap();
    assert!(list.is_object(), "collections are stored serialized");
    assert_eq!(list.to_json().unwrap(), json!(["a", "b"]));
    assert_eq!(list.to_text(), r#"["a","b"]"#);
}

#[test]
fn test_error_record_field_names() {
    let record = ExecutionErrorRecord {
        message: "boom".to_string(),
        activity_inst_id: "act:1".to_string(),
        activity_id: "act".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({ "message": "boom", "activityInstId": "act:1", "activityId": "act" })
    );
}

#[test]
fn test_trigger_json_shape() {
    let trigger: EventTrigger = serde_json::from_value(json!({
        "one-of": [
            { "form-replied": { "form-id": "survey" } },
            { "message-received": { "content": "/go" } }
        ]
    }))
    .unwrap();

    let leaves = trigger.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(
        leaves[0],
        &EventTrigger::FormReplied {
            form_id: "survey".to_string()
        }
    );
    assert_eq!(leaves[0].message_name("wf").as_deref(), Some("form-replied_survey"));
    assert_eq!(leaves[1].message_name("wf").as_deref(), Some("message-received_/go"));
    assert_eq!(trigger.message_name("wf"), None);

    let request: EventTrigger = serde_json::from_value(json!({ "request-received": {} })).unwrap();
    assert_eq!(request.message_name("wf").as_deref(), Some("request-received_wf"));
}

#[test]
fn test_duplicated_activity_ids() {
    let definition: WorkflowDefinition = serde_json::from_value(json!({
        "id": "wf",
        "activities": [
            { "id": "b", "kind": "debug" },
            { "id": "a", "kind": "debug" },
            { "id": "b", "kind": "debug" },
            { "id": "a", "kind": "debug" },
            { "id": "c", "kind": "debug" }
        ]
    }))
    .unwrap();

    assert_eq!(definition.duplicated_activity_ids(), vec!["a", "b"]);
    assert!(definition.find_activity("c").is_some());
}

#[test]
fn test_payload_message_names() {
    let message = EventPayload::MessageReceived(MessageReceivedEvent {
        stream_id: "s".to_string(),
        message_id: "m".to_string(),
        text: "/start now please".to_string(),
    });
    assert_eq!(message.message_name().as_deref(), Some("message-received_/start"));

    let blank = EventPayload::MessageReceived(MessageReceivedEvent {
        stream_id: "s".to_string(),
        message_id: "m".to_string(),
        text: "   ".to_string(),
    });
    assert_eq!(blank.message_name(), None);

    let envelope = EventPayload::Datafeed(DatafeedEvent {
        leaf_type: "V4SymphonyElementsAction".to_string(),
        declared: Box::new(EventPayload::FormReplied(FormRepliedEvent {
            form_message_id: "fm".to_string(),
            form_id: "f".to_string(),
            values: HashMap::new(),
        })),
    });
    assert_eq!(envelope.message_name(), None, "envelopes correlate only once normalized");
    assert_eq!(envelope.normalized().message_name().as_deref(), Some("form-replied_f"));
}

#[test]
fn test_innermost_message() {
    let error = FlowError::ActivityExecution {
        activity_id: "save".to_string(),
        source: ActivityError::caused_by(
            "could not save",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        ),
    };
    assert_eq!(innermost_message(&error), "disk full");
    assert_eq!(innermost_message(&FlowError::Unauthorized), "Request is not authorised");
}

#[derive(Debug, Deserialize)]
struct Tagged {
    #[serde(deserialize_with = "escaped_json::deserialize")]
    tags: Vec<String>,
}

#[test]
fn test_escaped_json_forms() {
    let plain: Tagged = serde_json::from_value(json!({ "tags": ["a", "b"] })).unwrap();
    assert_eq!(plain.tags, vec!["a", "b"]);

    let text: Tagged = serde_json::from_value(json!({ "tags": "[\"a\"]" })).unwrap();
    assert_eq!(text.tags, vec!["a"]);

    let escaped: Tagged = serde_json::from_value(json!({ "tags": "[\\\"a\\\", \\\"b\\\"]" })).unwrap();
    assert_eq!(escaped.tags, vec!["a", "b"]);

    assert!(serde_json::from_value::<Tagged>(json!({ "tags": "not json" })).is_err());
}

#[tokio::test]
async fn test_fs_resources_stay_under_root() {
    let dir = tempfile::tempdir().expect("temp dir");
    let provider = FsResourceProvider::new(dir.path());

    let saved = provider
        .save_resource(Path::new("nested/data.txt"), b"payload")
        .await
        .expect("saves");
    assert_eq!(saved, dir.path().join("nested/data.txt"));
    assert_eq!(
        provider.resource_file(Path::new("nested/data.txt")).await.unwrap(),
        saved
    );

    let escape = provider.resource_file(Path::new("../outside.txt")).await;
    assert_eq!(escape.unwrap_err().kind(), std::io::ErrorKind::InvalidInput);

    let absolute = provider.save_resource(Path::new("/tmp/abs.txt"), b"x").await;
    assert!(absolute.is_err(), "absolute paths are rejected");

    let missing = provider.resource_file(Path::new("missing.txt")).await;
    assert_eq!(missing.unwrap_err().kind(), std::io::ErrorKind::NotFound);
}

#[tokio::test]
async fn test_shared_data_namespaces() {
    let store = InMemorySharedDataStore::new();
    store.put("counters", "a", Value::Number(1.0)).await;
    store.put("counters", "b", Value::Number(2.0)).await;
    store.put("other", "a", Value::from("x")).await;

    assert_eq!(store.get("counters", "a").await, Some(Value::Number(1.0)));
    assert_eq!(store.get("counters", "c").await, None);
    assert_eq!(store.namespace("counters").await.len(), 2);
    assert!(store.namespace("empty").await.is_empty());
}
