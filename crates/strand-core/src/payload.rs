//! Structural payload equality used for job deduplication.
//!
//! Two payloads are equal when they have the same shape and the same leaf
//! values. Object key order never matters and numbers compare by numeric
//! value, so `1` and `1.0` are the same payload. The functions here are
//! pure and do not allocate.

use serde_json::{Number, Value as JsonValue};

/// Deep value equality over two job payloads.
pub fn payloads_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::Number(x), JsonValue::Number(y)) => numbers_equal(x, y),
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Array(xs), JsonValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| payloads_equal(x, y))
        }
        (JsonValue::Object(xs), JsonValue::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| payloads_equal(x, y)))
        }
        _ => false,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    // Integers compare exactly; f64 would conflate large neighbours.
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_equal_objects_with_different_key_order() {
        let a: JsonValue = serde_json::from_str(r#"{"strandId":"a","count":3}"#).unwrap();
        let b: JsonValue = serde_json::from_str(r#"{"count":3,"strandId":"a"}"#).unwrap();
        assert!(payloads_equal(&a, &b));
    }

    #[test]
    fn test_integer_and_float_with_same_value_are_equal() {
        assert!(payloads_equal(&json!({"n": 1}), &json!({"n": 1.0})));
        assert!(!payloads_equal(&json!({"n": 1}), &json!({"n": 1.5})));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let a = json!(9_007_199_254_740_993u64);
        let b = json!(9_007_199_254_740_992u64);
        assert!(!payloads_equal(&a, &b));
        assert!(payloads_equal(&a, &a.clone()));
    }

    #[test]
    fn test_nested_values() {
        let a = json!({"strandIds": ["a", "b"], "opts": {"depth": 2, "tags": null}});
        let b = json!({"opts": {"tags": null, "depth": 2}, "strandIds": ["a", "b"]});
        assert!(payloads_equal(&a, &b));

        let reordered = json!({"strandIds": ["b", "a"], "opts": {"depth": 2, "tags": null}});
        assert!(!payloads_equal(&a, &reordered));
    }

    #[test]
    fn test_missing_key_is_not_equal_to_null() {
        assert!(!payloads_equal(&json!({"a": null}), &json!({})));
        assert!(!payloads_equal(&json!({}), &json!({"a": null})));
    }

    #[test]
    fn test_different_kinds_are_not_equal() {
        assert!(!payloads_equal(&json!("1"), &json!(1)));
        assert!(!payloads_equal(&json!(null), &json!(false)));
        assert!(!payloads_equal(&json!([]), &json!({})));
    }

    fn arb_payload() -> impl Strategy<Value = JsonValue> {
        let leaf = prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(JsonValue::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| JsonValue::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every payload equals itself and its clone.
        #[test]
        fn payload_equality_is_reflexive(a in arb_payload()) {
            prop_assert!(payloads_equal(&a, &a));
            prop_assert!(payloads_equal(&a, &a.clone()));
        }

        /// Property: equality does not depend on argument order.
        #[test]
        fn payload_equality_is_symmetric(a in arb_payload(), b in arb_payload()) {
            prop_assert_eq!(payloads_equal(&a, &b), payloads_equal(&b, &a));
        }

        /// Property: without floats, structural equality agrees with serde_json's.
        #[test]
        fn payload_equality_matches_serde_without_floats(a in arb_payload(), b in arb_payload()) {
            prop_assert_eq!(payloads_equal(&a, &b), a == b);
        }
    }
}
