mod common;

use common::fixtures::*;
use common::{compact, decode, encode, round_trip};
use trellis_serde::{Format, NameContext, Options};

fn lowercase_enums() -> Options {
    let mut options = compact();
    options
        .naming
        .enums
        .transform(|name, _| name.to_lowercase());
    options
}

#[test]
fn test_enum_names_follow_pipeline() {
    let book = sample_book();
    let xml = encode(&book, Format::Xml, lowercase_enums()).unwrap();
    assert!(xml.contains("<Genre>science</Genre>"));

    let back = round_trip(&book, Format::Xml, lowercase_enums()).unwrap();
    assert_eq!(back.genre, Some(Genre::Science));
}

#[test]
fn test_item_names_can_be_replaced() {
    let mut options = compact();
    options.naming.items.replace_when(
        |_| Some("Keyword".to_string()),
        |context: &NameContext| {
            context
                .member
                .as_ref()
                .is_some_and(|member| member.name() == "Tags")
        },
    );

    let book = sample_book();
    let xml = encode(&book, Format::Xml, options.clone()).unwrap();
    assert!(xml.contains("<Tags><Keyword>math</Keyword><Keyword>history</Keyword></Tags>"));

    let back: Book = decode(&xml, Format::Xml, options).unwrap();
    assert_eq!(back.tags, book.tags);
}

#[test]
fn test_rules_can_depend_on_format() {
    let mut options = Options::new().with_omit_declaration(true);
    options.naming.members.transform_when(
        |name, _| name.to_uppercase(),
        |_, context: &NameContext| context.format == Format::Json,
    );
    let holder = Holder {
        value: Some("x".to_string()),
    };

    let json = encode(&holder, Format::Json, options.clone()).unwrap();
    assert_eq!(json, r#"{"VALUE":"x"}"#);
    let xml = encode(&holder, Format::Xml, options.clone()).unwrap();
    assert_eq!(xml, "<Holder><Value>x</Value></Holder>");

    let back: Holder = decode(&json, Format::Json, options).unwrap();
    assert_eq!(back, holder);
}

#[test]
fn test_root_name_from_type_pipeline() {
    let mut options = compact();
    options
        .naming
        .types
        .replace_when(|_| Some("Container".to_string()), |context: &NameContext| {
            context.ty.name() == "Holder"
        });

    let xml = encode(&Holder::default(), Format::Xml, options.clone()).unwrap();
    assert_eq!(xml, "<Container/>");

    let back: Holder = decode(&xml, Format::Xml, options).unwrap();
    assert_eq!(back, Holder::default());
}
