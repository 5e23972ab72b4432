//! End-to-end pipeline scenarios.

use reshape::{
    resolve, ConfigError, CsvOptions, Dir, FilterRule, JsonOptions, Logic, NamedCast, Pipeline,
    PipelineConfig, PipelineError, Record, Sample,
};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

fn pipeline(value: Value) -> Pipeline {
    Pipeline::from_value(value).expect("valid dataset")
}

fn to_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

fn posts() -> Pipeline {
    pipeline(json!([
        {
            "id": "1",
            "title": "Intro",
            "status": "published",
            "stats": {"views": "120", "likes": 4},
            "meta": "{\"author\":\"ann\",\"tags\":[\"rust\",\"intro\"]}",
            "comments": [{"by": "bob", "score": 2}, {"by": "cy", "score": 5}]
        },
        {
            "id": "2",
            "title": "Draft",
            "status": "draft",
            "stats": {"views": "3"},
            "meta": "{\"author\":\"bob\",\"tags\":[]}",
            "comments": []
        },
        {
            "id": "3",
            "title": "Deep dive",
            "status": "published",
            "stats": {"views": "300", "likes": 10},
            "meta": "{\"author\":\"ann\",\"tags\":[\"rust\"]}",
            "comments": [{"by": "dee", "score": 1}]
        }
    ]))
}

// ============================================================================
// Path resolution
// ============================================================================

#[test]
fn path_resolution_handles_missing_levels() {
    let record = json!({"a": {"b": {"c": 5}}});
    assert_eq!(resolve(&record, "a.b.c"), json!(5));
    assert_eq!(resolve(&record, "a.b.d"), Value::Null);
    assert_eq!(resolve(&record, "a.x.c"), Value::Null);
}

#[test]
fn literal_dotted_key_wins_over_traversal() {
    let record = json!({"a.b": 1, "a": {"b": 2}});
    assert_eq!(resolve(&record, "a.b"), json!(1));
}

#[test]
fn wildcard_fields_collect_lists() {
    let mut p = pipeline(json!([{"tags": ["x", "y"], "items": [{"v": 1}, {"v": 2}]}]));
    p.fields(["tags.*", "items.*.v"]).unwrap();
    assert_eq!(
        to_value(p.to_array().unwrap()),
        json!([{"tags.*": ["x", "y"], "items.*.v": [1, 2]}])
    );
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn concrete_cast_alias_sort_scenario() {
    let mut p = pipeline(json!([
        {"id": "1", "views": "10"},
        {"id": "2", "views": "20"}
    ]));
    p.cast("id", NamedCast::Int)
        .unwrap()
        .cast("views", NamedCast::Int)
        .unwrap()
        .alias("views", "view_count")
        .unwrap()
        .fields(["id", "view_count"])
        .unwrap()
        .order_by("view_count", Dir::Desc)
        .unwrap();

    assert_eq!(
        to_value(p.to_array().unwrap()),
        json!([{"id": 2, "view_count": 20}, {"id": 1, "view_count": 10}])
    );
}

#[test]
fn projection_is_complete_over_heterogeneous_records() {
    let mut p = posts();
    p.cast("meta", NamedCast::Json)
        .unwrap()
        .fields(["id", "stats.likes", "meta.author", "meta.tags.0", "nope"])
        .unwrap();

    let rows = p.to_array().unwrap();
    for row in &rows {
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "stats.likes", "meta.author", "meta.tags.0", "nope"]);
        assert_eq!(row["nope"], Value::Null);
    }
    assert_eq!(rows[1]["stats.likes"], Value::Null);
    assert_eq!(rows[1]["meta.tags.0"], Value::Null);
    assert_eq!(rows[0]["meta.tags.0"], json!("rust"));
    assert_eq!(rows[2]["meta.author"], json!("ann"));
}

#[test]
fn flattening_applies_casts_and_aliases() {
    let mut p = pipeline(json!([{"id": 1, "stats": {"views": "9", "extra": {"x": true}}}]));
    p.cast("stats.views", "int")
        .unwrap()
        .alias("stats.views", "views")
        .unwrap();
    assert_eq!(
        to_value(p.to_array().unwrap()),
        json!([{"id": 1, "views": 9, "stats.extra.x": true}])
    );
}

#[test]
fn enum_and_date_casts() {
    let mut p = pipeline(json!([
        {"state": 1, "at": "2024-03-05T10:20:30Z"},
        {"state": "2", "at": 1_700_000_000},
        {"state": 9, "at": "garbage"}
    ]));
    p.enum_map("state", [("1", "open"), ("2", "closed")])
        .unwrap()
        .cast("state", NamedCast::Enum)
        .unwrap()
        .cast("at", NamedCast::Date)
        .unwrap();
    assert_eq!(
        to_value(p.to_array().unwrap()),
        json!([
            {"state": "open", "at": "2024-03-05"},
            {"state": "closed", "at": "2023-11-14"},
            {"state": 9, "at": null}
        ])
    );
}

#[test]
fn custom_cast_function() {
    let mut p = pipeline(json!([{"name": "ann"}]));
    p.cast_fn("name", |v| Ok(json!(v.as_str().unwrap_or_default().to_uppercase())))
        .unwrap();
    assert_eq!(to_value(p.to_array().unwrap()), json!([{"name": "ANN"}]));
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn declarative_filters_on_nested_cast_fields() {
    let mut p = posts();
    p.cast("stats.views", NamedCast::Int)
        .unwrap()
        .add_filter("stats.views", FilterRule::new("stats.views", "gte", 100).unwrap())
        .unwrap()
        .add_filter("status", FilterRule::equals("published"))
        .unwrap()
        .fields(["id"])
        .unwrap();
    assert_eq!(to_value(p.to_array().unwrap()), json!([{"id": "1"}, {"id": "3"}]));
}

#[test]
fn or_logic_and_regex() {
    let mut p = posts();
    p.filter_by("title", "regex", "^Dr")
        .unwrap()
        .filter_by("id", "in", json!(["3"]))
        .unwrap()
        .set_logic(Logic::Or)
        .fields(["id"])
        .unwrap();
    assert_eq!(to_value(p.to_array().unwrap()), json!([{"id": "2"}, {"id": "3"}]));
}

#[test]
fn equals_is_loose_but_in_is_strict() {
    let mut p = pipeline(json!([{"n": 1}, {"n": "1"}]));
    p.filter_by("n", "equals", "1").unwrap();
    assert_eq!(p.count().unwrap(), 2);

    // Replaces the rule on `n`.
    p.filter_by("n", "in", json!(["1"])).unwrap();
    assert_eq!(p.pluck("n").unwrap(), vec![json!("1")]);
}

#[test]
fn field_named_grouped_is_an_ordinary_rule() {
    let mut p = pipeline(json!([
        {"a": 2, "grouped": 1},
        {"a": 1, "grouped": 1},
        {"a": 2, "grouped": 0}
    ]));
    p.filter_by("a", "equals", 2)
        .unwrap()
        .filter_by("grouped", "equals", 1)
        .unwrap();
    assert_eq!(p.count().unwrap(), 1);

    p.set_logic(Logic::Or);
    assert_eq!(p.count().unwrap(), 3);

    assert!(p.remove_filter("grouped"));
    assert_eq!(p.pluck("a").unwrap(), vec![json!(2), json!(2)]);
}

#[test]
fn callback_errors_surface_from_terminal_calls() {
    let mut p = posts();
    p.add_filter_fn(Some("explode"), |record| {
        if record.get("id") == Some(&json!("2")) {
            anyhow::bail!("cannot judge record 2");
        }
        Ok(true)
    });
    let err = p.to_json(JsonOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Callback(_)));
    assert!(err.to_string().contains("cannot judge record 2"));

    // Configuration survives the failed call.
    assert!(p.remove_filter("explode"));
    assert_eq!(p.count().unwrap(), 3);
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn configuration_errors_are_recorded_not_raised() {
    let mut p = posts();
    assert_eq!(
        p.sort_by("id", "up").unwrap_err(),
        ConfigError::InvalidDirection("up".into())
    );
    assert_eq!(p.offset(-3).unwrap_err(), ConfigError::NegativeOffset(-3));
    assert!(matches!(
        p.fields(["id", ""]).unwrap_err(),
        ConfigError::InvalidFieldList(_)
    ));
    assert!(matches!(
        p.alias(".x", "y").unwrap_err(),
        ConfigError::InvalidField(_)
    ));

    assert_eq!(p.last_error(), Some("invalid field name: '.x'"));
    let warnings = p
        .log()
        .iter()
        .filter(|entry| entry.starts_with("invalid"))
        .count();
    assert_eq!(warnings, 3);

    // Nothing was applied.
    assert_eq!(p.config(), PipelineConfig::default());
    assert_eq!(p.count().unwrap(), 3);
}

#[test]
fn group_by_validates_its_key() {
    let mut p = posts();
    assert!(matches!(
        p.group_by(""),
        Err(PipelineError::Config(ConfigError::InvalidGroupKey(_)))
    ));
    assert!(p.last_error().is_some());
}

// ============================================================================
// Sorting and pagination
// ============================================================================

#[test]
fn multi_key_sort_is_stable() {
    let mut p = pipeline(json!([
        {"g": "b", "n": 1, "i": 0},
        {"g": "a", "n": 2, "i": 1},
        {"g": "b", "n": 1, "i": 2},
        {"g": "a", "n": 1, "i": 3}
    ]));
    p.sort_by("g", "ASC").unwrap().sort_by("n", "asc").unwrap();
    assert_eq!(p.pluck("i").unwrap(), vec![json!(3), json!(1), json!(0), json!(2)]);
}

#[test]
fn pagination_bounds() {
    let mut p = pipeline(json!([{"i": 0}, {"i": 1}, {"i": 2}]));
    p.limit(2).unwrap().offset(1).unwrap();
    assert_eq!(p.pluck("i").unwrap(), vec![json!(1), json!(2)]);

    p.offset(3).unwrap();
    assert!(p.to_array().unwrap().is_empty());

    p.clear_limit();
    assert_eq!(p.count().unwrap(), 3);
}

// ============================================================================
// Expansion
// ============================================================================

#[test]
fn expansion_then_aggregation() {
    let mut p = posts();
    p.expand("comments", [("commenter", "by"), ("score", "score")])
        .unwrap()
        .fields(["id", "commenter", "score"])
        .unwrap();

    assert_eq!(
        to_value(p.to_array().unwrap()),
        json!([
            {"id": "1", "commenter": "bob", "score": 2},
            {"id": "1", "commenter": "cy", "score": 5},
            {"id": "3", "commenter": "dee", "score": 1}
        ])
    );
    assert_eq!(p.sum("score").unwrap().to_i64(), 8);

    p.reset();
    assert_eq!(p.count().unwrap(), 3);
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn group_by_preserves_first_occurrence_order() {
    let mut p = pipeline(json!([{"category": "A"}, {"category": "B"}, {"category": "A"}]));
    let groups = p.group_by("category").unwrap();
    assert_eq!(groups.keys().collect::<Vec<_>>(), ["A", "B"]);
    assert_eq!(to_value(groups["A"].clone()), json!([{"category": "A"}, {"category": "A"}]));
    assert_eq!(to_value(groups["B"].clone()), json!([{"category": "B"}]));
}

#[test]
fn csv_of_empty_result_is_empty_string() {
    let mut p = pipeline(json!([]));
    assert_eq!(p.to_csv(CsvOptions::default()).unwrap(), "");

    let mut filtered = posts();
    filtered.filter_by("id", "equals", "nope").unwrap();
    assert_eq!(filtered.to_csv(CsvOptions::default()).unwrap(), "");
    assert!(filtered.csv_headers().unwrap().is_empty());
}

#[test]
fn csv_output_with_custom_options() {
    let mut p = posts();
    p.fields(["id", "title"]).unwrap().limit(2).unwrap();
    let csv = p
        .to_csv(CsvOptions {
            delimiter: ';',
            enclosure: '\'',
        })
        .unwrap();
    assert_eq!(csv, "'id';'title'\n'1';'Intro'\n'2';'Draft'");
    assert_eq!(p.csv_headers().unwrap(), vec!["id", "title"]);
}

#[test]
fn csv_options_are_rejected_before_running() {
    let mut p = posts();
    p.add_filter_fn(Some("never"), |_| Err(anyhow::anyhow!("should not run")));
    let err = p
        .to_csv(CsvOptions {
            delimiter: '→',
            ..Default::default()
        })
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::InvalidCsvChar { .. })
    ));
    assert_eq!(
        p.last_error(),
        Some("invalid CSV delimiter '→': must be a single ASCII character")
    );
    assert_eq!(p.log().last().map(String::as_str), p.last_error());
}

#[test]
fn output_calls_log_their_format() {
    let mut p = posts();
    p.to_json(JsonOptions::pretty()).unwrap();
    p.to_csv(CsvOptions {
        delimiter: ';',
        enclosure: '|',
    })
    .unwrap();
    p.csv_headers().unwrap();

    let outputs: Vec<&str> = p
        .log()
        .iter()
        .map(String::as_str)
        .filter(|entry| entry.starts_with("output"))
        .collect();
    assert_eq!(
        outputs,
        vec![
            "output json (pretty=true, escape_slashes=false)",
            "output csv (delimiter ';', enclosure '|')",
            "output csv headers",
        ]
    );
}

#[test]
fn json_output_round_trips() {
    let mut p = posts();
    p.cast("meta", NamedCast::Json).unwrap();
    let array = to_value(p.to_array().unwrap());
    let text = p.to_json(JsonOptions::pretty()).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), array);
}

#[test]
fn repeated_reads_are_identical() {
    let mut p = posts();
    p.cast("stats.views", NamedCast::Int)
        .unwrap()
        .order_by("stats.views", Dir::Desc)
        .unwrap();
    let first = p.to_array().unwrap();
    let second = p.to_array().unwrap();
    assert_eq!(first, second);
}

#[test]
fn random_sampling_shapes() {
    let mut p = posts();
    assert!(matches!(p.random(1).unwrap(), Sample::One(Some(_))));
    assert_eq!(p.random(2).unwrap().into_vec().len(), 2);
    assert_eq!(p.random(0).unwrap(), Sample::Many(vec![]));
}

// ============================================================================
// Declarative configuration
// ============================================================================

#[test]
fn yaml_configuration_drives_a_pipeline() {
    let config = PipelineConfig::from_yaml_str(
        r#"
fields: [id, views, author]
aliases:
  stats.views: views
  meta.author: author
casts:
  stats.views: int
  meta: json
filters:
  status: published
sort:
  - field: views
    direction: desc
limit: 1
"#,
    )
    .unwrap();

    let mut p = posts();
    p.apply_config(&config).unwrap();
    assert_eq!(
        p.to_json(JsonOptions::default()).unwrap(),
        r#"[{"id":"3","views":300,"author":"ann"}]"#
    );
}
