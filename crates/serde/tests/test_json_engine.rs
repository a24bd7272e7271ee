mod common;

use std::collections::HashMap;

use common::fixtures::*;
use common::{decode, encode, round_trip};
use trellis_serde::{
    Dynamic, Error, Format, MismatchError, Options, from_json_str, to_json_string,
};

#[test]
fn test_book_json_layout() {
    let json = to_json_string(&sample_book()).unwrap();
    assert_eq!(
        json,
        concat!(
            r#"{"id":"00000000-0000-0000-0000-000000000001","Title":"Notes","#,
            r#""Published":"1843-10-01","Price":19.99,"Genre":"Science","#,
            r#""Tags":["math","history"],"#,
            r#""Author":[{"Name":"Ada","Born":1815},{"Name":"Charles"}],"#,
            r#""Ratings":{"goodreads":4},"Extra":"note"}"#
        )
    );
}

#[test]
fn test_book_json_round_trip() {
    let book = sample_book();
    let back = round_trip(&book, Format::Json, Options::new()).unwrap();
    assert_eq!(back, book);
}

#[test]
fn test_absent_members_are_omitted() {
    let json = to_json_string(&Holder::default()).unwrap();
    assert_eq!(json, "{}");
    let back: Holder = from_json_str(&json).unwrap();
    assert_eq!(back, Holder::default());

    let json = encode(
        &Holder::default(),
        Format::Json,
        Options::new().with_null_members(true),
    )
    .unwrap();
    assert_eq!(json, r#"{"Value":null}"#);
    let back: Holder = from_json_str(&json).unwrap();
    assert_eq!(back, Holder::default());
}

#[test]
fn test_json_roots_are_not_name_checked() {
    let holder: Holder = from_json_str(r#"{"Value":"x"}"#).unwrap();
    assert_eq!(holder.value.as_deref(), Some("x"));
}

#[test]
fn test_camel_case_names() {
    let chapter = Chapter {
        title: "One".to_string(),
        summary: Some(Summary {
            chapter: "One".to_string(),
            text: "short".to_string(),
        }),
    };
    let options = Options::new().use_camel_case_names();
    let json = encode(&chapter, Format::Json, options.clone()).unwrap();
    assert_eq!(json, r#"{"title":"One","summary":{"text":"short"}}"#);

    let back: Chapter = decode(&json, Format::Json, options.clone()).unwrap();
    assert_eq!(back, chapter);

    let xml = encode(&chapter, Format::Xml, options.with_omit_declaration(true)).unwrap();
    assert_eq!(
        xml,
        "<chapter><title>One</title><summary><text>short</text></summary></chapter>"
    );
}

#[test]
fn test_explicit_names_survive_case_rules() {
    let json = encode(
        &Author::new("Ada", Some(1815)),
        Format::Json,
        Options::new().use_camel_case_names(),
    )
    .unwrap();
    assert_eq!(json, r#"{"Name":"Ada","born":1815}"#);
}

#[test]
fn test_node_kind_mismatch() {
    let err = from_json_str::<Book>(r#"{"Tags":"math"}"#).unwrap_err();
    match err {
        Error::Mismatch(MismatchError::NodeKind {
            expected,
            actual,
            path,
        }) => {
            assert_eq!(expected, "array");
            assert_eq!(actual, "value");
            assert_eq!(path, "$.Tags");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = from_json_str::<Book>(r#"{"Title":{"text":"x"}}"#).unwrap_err();
    assert!(matches!(
        err,
        Error::Mismatch(MismatchError::NodeKind { ref expected, .. }) if expected == "value"
    ));
}

#[test]
fn test_null_list_items_are_skipped() {
    let basket: Basket = from_json_str(r#"{"Items":[1,null,3]}"#).unwrap();
    assert_eq!(basket.items, vec![1, 3]);
}

#[test]
fn test_dynamic_numbers_round_trip() {
    let mut book = sample_book();
    book.extra = Some(Dynamic::new(42_i64));
    let back = round_trip(&book, Format::Json, Options::new()).unwrap();
    assert_eq!(back.extra, Some(Dynamic::new(42_i64)));
}

#[test]
fn test_dynamic_structures_are_inferred() {
    let book: Book = from_json_str(r#"{"Extra":{"a":1.5,"b":[true,null,"x"]}}"#).unwrap();
    let extra = book.extra.unwrap();
    let map = extra.downcast_ref::<HashMap<String, Dynamic>>().unwrap();
    assert_eq!(map.get("a"), Some(&Dynamic::new(1.5_f64)));

    let list = map
        .get("b")
        .and_then(|b| b.downcast_ref::<Vec<Dynamic>>())
        .unwrap();
    assert_eq!(
        list,
        &vec![Dynamic::new(true), Dynamic::new("x".to_string())]
    );
}

#[test]
fn test_parse_errors_surface() {
    let err = from_json_str::<Holder>(r#"{"Value": "#).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}
