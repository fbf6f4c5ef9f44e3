use flowcore::FlowError;
use flowruntime::{load_file, WorkflowLoader};
use std::fs;

fn write_definition(dir: &std::path::Path, file: &str, id: &str) {
    let body = format!(
        r#"{{ "id": "{}", "activities": [ {{ "id": "a", "kind": "debug" }} ] }}"#,
        id
    );
    fs::write(dir.join(file), body).expect("write definition");
}

#[tokio::test]
async fn test_load_all_reads_json_files_in_name_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_definition(dir.path(), "b.json", "second");
    write_definition(dir.path(), "a.json", "first");
    fs::write(dir.path().join("notes.txt"), "not a workflow").unwrap();

    let definitions = WorkflowLoader::new(dir.path()).load_all().await.expect("loads");

    let ids: Vec<_> = definitions.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
    assert_eq!(definitions[0].activities[0].kind, "debug");
}

#[tokio::test]
async fn test_invalid_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"id\": ").unwrap();

    let error = load_file(&path).await.expect_err("invalid json");
    match error {
        FlowError::Configuration(message) => {
            assert!(message.contains("broken.json"), "message names the file: {}", message)
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_directory_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = WorkflowLoader::new(dir.path().join("absent")).load_all().await;
    assert!(matches!(result, Err(FlowError::Io(_))));
}
