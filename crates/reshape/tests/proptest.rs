//! Property-based tests for reshape using proptest.

use std::collections::BTreeSet;

use proptest::prelude::*;
use reshape::{sort_cmp, Dir, FilterRule, JsonOptions, Logic, Pipeline, Record};
use serde_json::{json, Value};

// ============================================================================
// Test helpers
// ============================================================================

#[derive(Debug, Clone)]
struct Row {
    id: usize,
    n: i64,
    word: String,
    items: Vec<i64>,
}

fn row_strategy() -> impl Strategy<Value = (i64, String, Vec<i64>)> {
    (
        -20i64..20,
        "[a-c]{0,3}",
        prop::collection::vec(any::<i64>(), 0..4),
    )
}

fn rows_strategy() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(row_strategy(), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(id, (n, word, items))| Row { id, n, word, items })
            .collect()
    })
}

/// Loosely-typed values whose loose comparison is not transitive.
fn mixed_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("")),
        Just(json!("9")),
        Just(json!("10a")),
        any::<bool>().prop_map(Value::from),
        (-20i64..20).prop_map(Value::from),
        (-20i64..20).prop_map(|n| Value::from(n.to_string())),
        (-20.0f64..20.0).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::from),
        prop::collection::vec(-3i64..3, 0..3).prop_map(|v| json!(v)),
    ]
}

fn record(row: &Row) -> Record {
    match json!({
        "id": row.id,
        "n": row.n.to_string(),
        "word": row.word,
        "nested": {"items": row.items}
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn pipeline(rows: &[Row]) -> Pipeline {
    Pipeline::new(rows.iter().map(record).collect())
}

fn ids(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .map(|r| r["id"].as_u64().expect("id is projected"))
        .collect()
}

fn id_set(records: &[Record]) -> BTreeSet<u64> {
    ids(records).into_iter().collect()
}

/// P: `n > threshold` (on the string column, compared numerically).
fn p_rule(threshold: i64) -> FilterRule {
    FilterRule::new("n", "greaterThan", threshold).expect("valid rule")
}

/// Q: `word` starts with a prefix.
fn q_rule(prefix: &str) -> FilterRule {
    FilterRule::new("word", "startsWith", prefix).expect("valid rule")
}

fn run_with(rows: &[Row], rules: Vec<(&str, FilterRule)>, logic: Logic) -> Vec<Record> {
    let mut p = pipeline(rows);
    p.set_filters(rules).expect("valid fields").set_logic(logic);
    p.to_array().expect("no callbacks")
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// AND of two rules is the intersection of each rule alone.
    #[test]
    fn and_is_intersection(rows in rows_strategy(), threshold in -20i64..20, prefix in "[a-c]{0,1}") {
        let p_only = id_set(&run_with(&rows, vec![("n", p_rule(threshold))], Logic::And));
        let q_only = id_set(&run_with(&rows, vec![("word", q_rule(&prefix))], Logic::And));
        let both = id_set(&run_with(
            &rows,
            vec![("n", p_rule(threshold)), ("word", q_rule(&prefix))],
            Logic::And,
        ));
        let expected: BTreeSet<u64> = p_only.intersection(&q_only).copied().collect();
        prop_assert_eq!(both, expected);
    }

    /// OR of two rules is the union of each rule alone.
    #[test]
    fn or_is_union(rows in rows_strategy(), threshold in -20i64..20, prefix in "[a-c]{0,1}") {
        let p_only = id_set(&run_with(&rows, vec![("n", p_rule(threshold))], Logic::Or));
        let q_only = id_set(&run_with(&rows, vec![("word", q_rule(&prefix))], Logic::Or));
        let either = id_set(&run_with(
            &rows,
            vec![("n", p_rule(threshold)), ("word", q_rule(&prefix))],
            Logic::Or,
        ));
        let expected: BTreeSet<u64> = p_only.union(&q_only).copied().collect();
        prop_assert_eq!(either, expected);
    }

    /// Filtering never grows the dataset and keeps input order.
    #[test]
    fn filter_keeps_order(rows in rows_strategy(), threshold in -20i64..20) {
        let out = ids(&run_with(&rows, vec![("n", p_rule(threshold))], Logic::And));
        prop_assert!(out.len() <= rows.len());
        prop_assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    /// Records with equal sort keys keep their input order.
    #[test]
    fn sort_is_stable(rows in rows_strategy(), desc in any::<bool>()) {
        let mut p = pipeline(&rows);
        p.cast("n", "int")
            .unwrap()
            .order_by("n", if desc { Dir::Desc } else { Dir::Asc })
            .unwrap();
        let out = p.to_array().unwrap();

        for pair in out.windows(2) {
            let (a, b) = (pair[0]["n"].as_i64().unwrap(), pair[1]["n"].as_i64().unwrap());
            if desc {
                prop_assert!(a >= b);
            } else {
                prop_assert!(a <= b);
            }
            if a == b {
                prop_assert!(pair[0]["id"].as_u64() < pair[1]["id"].as_u64());
            }
        }
    }

    /// Mixed-type columns sort into a consistent, stable order.
    #[test]
    fn mixed_sort_is_ordered(values in prop::collection::vec(mixed_value(), 0..200), desc in any::<bool>()) {
        let data: Vec<Record> = values
            .iter()
            .enumerate()
            .map(|(id, v)| match json!({"id": id, "v": v}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect();
        let direction = if desc { Dir::Desc } else { Dir::Asc };
        let mut p = Pipeline::new(data);
        p.order_by("v", direction).unwrap();
        let out = p.to_array().unwrap();

        prop_assert_eq!(out.len(), values.len());
        for pair in out.windows(2) {
            let ordering = direction.apply(sort_cmp(&pair[0]["v"], &pair[1]["v"]));
            prop_assert_ne!(ordering, std::cmp::Ordering::Greater);
            if ordering.is_eq() {
                prop_assert!(pair[0]["id"].as_u64() < pair[1]["id"].as_u64());
            }
        }
    }

    /// With a limit, the page is the matching slice of the unpaginated result.
    #[test]
    fn pagination_slices(rows in rows_strategy(), offset in 0usize..50, limit in 0usize..50) {
        let mut p = pipeline(&rows);
        let all = ids(&p.to_array().unwrap());

        p.limit(limit as i64).unwrap().offset(offset as i64).unwrap();
        let page = ids(&p.to_array().unwrap());

        let expected: Vec<u64> = all.iter().copied().skip(offset).take(limit).collect();
        prop_assert_eq!(&page, &expected);
        if offset >= rows.len() {
            prop_assert!(page.is_empty());
        }
    }

    /// Expansion yields one record per list element and drops empty lists.
    #[test]
    fn expansion_counts(rows in rows_strategy()) {
        let mut data: Vec<Record> = rows.iter().map(record).collect();
        for (record, row) in data.iter_mut().zip(&rows) {
            record.insert("items".into(), json!(row.items));
        }
        let mut p = Pipeline::new(data);
        p.expand("items", Vec::<(String, String)>::new()).unwrap();

        let expected: usize = rows.iter().map(|row| row.items.len()).sum();
        prop_assert_eq!(p.count().unwrap(), expected);

        let survivors: BTreeSet<u64> = id_set(&p.to_array().unwrap());
        let non_empty: BTreeSet<u64> = rows
            .iter()
            .filter(|row| !row.items.is_empty())
            .map(|row| row.id as u64)
            .collect();
        prop_assert_eq!(survivors, non_empty);
    }

    /// Terminal calls do not change what the next call sees.
    #[test]
    fn repeated_reads_are_identical(rows in rows_strategy(), threshold in -20i64..20) {
        let mut p = pipeline(&rows);
        p.add_filter("n", p_rule(threshold))
            .unwrap()
            .sort_by("word", "desc")
            .unwrap()
            .fields(["id", "word", "nested.items.*"])
            .unwrap();
        let first = p.to_array().unwrap();
        let _ = p.count().unwrap();
        let second = p.to_array().unwrap();
        prop_assert_eq!(first, second);
    }

    /// JSON output parses back to the array output.
    #[test]
    fn json_round_trip(rows in rows_strategy(), pretty in any::<bool>(), escape in any::<bool>()) {
        let mut p = pipeline(&rows);
        let array = Value::Array(p.to_array().unwrap().into_iter().map(Value::Object).collect());
        let text = p
            .to_json(JsonOptions { pretty, escape_slashes: escape })
            .unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(parsed, array);
    }

    /// Every requested field is present in every projected record, and nothing else.
    #[test]
    fn projection_is_complete(rows in rows_strategy()) {
        let fields = ["word", "nested.items.0", "missing.path", "id"];
        let mut p = pipeline(&rows);
        p.fields(fields).unwrap();
        for record in p.to_array().unwrap() {
            let keys: Vec<&str> = record.keys().map(String::as_str).collect();
            prop_assert_eq!(keys, fields.to_vec());
            prop_assert_eq!(&record["missing.path"], &Value::Null);
        }
    }
}
