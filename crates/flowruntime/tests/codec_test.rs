use flowcore::{Value, Variable};
use flowruntime::backend::interpolate;
use flowruntime::codec::{normalize_activity_text, StoredActivity};
use serde_json::json;
use std::collections::HashMap;

#[test]
fn test_line_breaks_inside_strings_are_escaped() {
    let raw = "{\"id\":\"a\",\"kind\":\"debug\",\"config\":{\"message\":\"one\r\ntwo\n\nthree\"}}";
    let activity = StoredActivity::decode(raw).expect("decodes");
    assert_eq!(activity.config, json!({ "message": "one\ntwo\nthree" }));
}

#[test]
fn test_line_breaks_outside_strings_are_kept() {
    let raw = "{\n  \"id\": \"a\",\n  \"kind\": \"debug\"\n}";
    assert_eq!(normalize_activity_text(raw), raw);
    assert!(StoredActivity::decode(raw).is_ok());
}

#[test]
fn test_invalid_escapes_are_relaxed() {
    let raw = r#"{"id":"a","kind":"debug","config":{"message":"cost \$5 \#tag \"quoted\" a\\b A"}}"#;
    let activity = StoredActivity::decode(raw).expect("decodes");
    assert_eq!(
        activity.config["message"],
        json!("cost $5 #tag \"quoted\" a\\b A")
    );
}

#[test]
fn test_escaped_line_break() {
    let raw = "{\"id\":\"a\",\"kind\":\"debug\",\"config\":{\"message\":\"x\\\ny\"}}";
    let activity = StoredActivity::decode(raw).expect("decodes");
    assert_eq!(activity.config["message"], json!("x\ny"));
}

fn variables() -> HashMap<String, Variable> {
    let mut variables = HashMap::new();
    variables.insert("name".to_string(), Variable::native("Ada"));
    variables.insert("count".to_string(), Variable::native(3.0));
    variables.insert(
        "event".to_string(),
        Variable::json(&json!({ "args": { "who": "Grace", "tags": ["a", "b"] } })).unwrap(),
    );
    variables.insert(
        "fetch.outputs.body".to_string(),
        Variable::native("say \"hi\"\\"),
    );
    variables.insert(
        "fetch".to_string(),
        Variable::from_value(Value::from(json!({ "outputs": { "status": 200 } }))).unwrap(),
    );
    variables
}

#[test]
fn test_interpolation() {
    let vars = variables();
    assert_eq!(interpolate("hi ${name}, ${count} times", &vars), "hi Ada, 3 times");
    assert_eq!(interpolate("${event.args.who}", &vars), "Grace");
    assert_eq!(interpolate("${event.args.tags.1}", &vars), "b");
    assert_eq!(interpolate("${fetch.outputs.status}", &vars), "200");
    assert_eq!(interpolate("${ name }", &vars), "Ada");
}

#[test]
fn test_interpolation_escapes_for_json_strings() {
    let vars = variables();
    assert_eq!(
        interpolate("${fetch.outputs.body}", &vars),
        r#"say \"hi\"\\"#
    );
    assert_eq!(
        interpolate("${event.args.tags}", &vars),
        r#"[\"a\",\"b\"]"#
    );
}

#[test]
fn test_unresolved_placeholders_are_kept() {
    let vars = variables();
    assert_eq!(interpolate("${missing}", &vars), "${missing}");
    assert_eq!(interpolate("${event.args.nobody}", &vars), "${event.args.nobody}");
    assert_eq!(interpolate("${}", &vars), "${}");
    assert_eq!(interpolate("open ${name", &vars), "open ${name");
}

#[test]
fn test_interpolated_activity_decodes() {
    let stored = StoredActivity {
        id: "a".to_string(),
        kind: "debug".to_string(),
        config: json!({ "message": "${fetch.outputs.body}" }),
    };
    let text = interpolate(&stored.encode().unwrap(), &variables());
    let decoded = StoredActivity::decode(&text).expect("decodes");
    assert_eq!(decoded.config["message"], json!("say \"hi\"\\"));
}

#[test]
fn test_control_characters_survive_interpolation() {
    let mut vars = HashMap::new();
    vars.insert("note".to_string(), Variable::native("bell\u{7}form\u{c}back\u{8}"));
    let stored = StoredActivity {
        id: "a".to_string(),
        kind: "debug".to_string(),
        config: json!({ "message": "${note}" }),
    };

    let text = interpolate(&stored.encode().unwrap(), &vars);
    assert!(text.contains("\\u0007"), "bell is escaped: {}", text);

    let decoded = StoredActivity::decode(&text).expect("decodes");
    assert_eq!(decoded.config["message"], json!("bell\u{7}form\u{c}back\u{8}"));
}
