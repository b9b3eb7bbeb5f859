use proptest::prelude::*;
use reagent::react::{parse, repair, StructuredResponse};
use serde_json::{Map, Value};

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,10}"
}

/// 合法 JSON 对象：字符串值任意（含引号、反斜杠、控制字符、非 ASCII）
fn valid_object() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<String>().prop_map(Value::String),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ];
    let value = leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    });
    prop::collection::btree_map(key_strategy(), value, 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

proptest! {
    #[test]
    fn repair_is_idempotent(text in any::<String>()) {
        let once = repair(&text);
        prop_assert_eq!(repair(&once), once);
    }

    #[test]
    fn repair_is_idempotent_on_near_json(
        thought in "[a-z \"\\\\\n\t{}:,]{0,40}",
        answer in "[a-z \"\\\\\n\t{}:,]{0,40}",
        fenced in any::<bool>(),
    ) {
        let body = format!("{{\"thought\": \"{}\", \"final_answer\": \"{}\"}}", thought, answer);
        let text = if fenced { format!("```json\n{}\n```", body) } else { body };
        let once = repair(&text);
        prop_assert_eq!(repair(&once), once);
    }

    #[test]
    fn repair_preserves_valid_json(value in valid_object(), pretty in any::<bool>()) {
        let text = if pretty {
            serde_json::to_string_pretty(&value).unwrap()
        } else {
            serde_json::to_string(&value).unwrap()
        };
        let repaired = repair(&text);
        let decoded: Value = serde_json::from_str(&repaired).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn classification_is_total(text in any::<String>()) {
        match parse(&repair(&text)) {
            StructuredResponse::FinalAnswer { .. }
            | StructuredResponse::Action { .. }
            | StructuredResponse::Malformed { .. } => {}
        }
    }

    #[test]
    fn raw_control_chars_and_quotes_are_recovered(
        thought in "[a-z \n\t\"]{0,30}",
        answer in "[a-z \n\t\"]{1,30}",
    ) {
        let text = format!("{{\"thought\": \"{}\", \"final_answer\": \"{}\"}}", thought, answer);
        match parse(&repair(&text)) {
            StructuredResponse::FinalAnswer { thought: t, final_answer, .. } => {
                prop_assert_eq!(t.as_deref(), Some(thought.as_str()));
                prop_assert_eq!(final_answer, answer);
            }
            other => prop_assert!(false, "unexpected classification: {:?}", other),
        }
    }
}
