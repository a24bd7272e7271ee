//! Registered test types and sample values.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trellis_serde::{Dynamic, MemberMeta, Reflect, ReflectAny, Shared, TypeInfo};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Genre {
    Fiction,
    Science,
    History,
}

impl Reflect for Genre {
    fn type_info() -> TypeInfo {
        TypeInfo::enumeration(
            "Genre",
            &[
                ("Fiction", Genre::Fiction),
                ("Science", Genre::Science),
                ("History", Genre::History),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub name: String,
    pub born: Option<i32>,
}

impl Author {
    pub fn new(name: &str, born: Option<i32>) -> Self {
        Self {
            name: name.to_string(),
            born,
        }
    }
}

impl Reflect for Author {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Author")
            .member_with(
                "Name",
                |a| Some(&a.name),
                |a, v| a.name = v,
                MemberMeta::new().as_attribute(),
            )
            .member("Born", |a| a.born.as_ref(), |a, v| a.born = Some(v))
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub published: Option<NaiveDate>,
    pub price: Option<Decimal>,
    pub genre: Option<Genre>,
    pub tags: Vec<String>,
    pub authors: Vec<Author>,
    pub ratings: BTreeMap<String, i32>,
    pub extra: Option<Dynamic>,
}

impl Reflect for Book {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Book")
            .member_with(
                "Id",
                |b| Some(&b.id),
                |b, v| b.id = v,
                MemberMeta::new().attribute("id"),
            )
            .member("Title", |b| Some(&b.title), |b, v| b.title = v)
            .member("Published", |b| b.published.as_ref(), |b, v| b.published = Some(v))
            .member("Price", |b| b.price.as_ref(), |b, v| b.price = Some(v))
            .member("Genre", |b| b.genre.as_ref(), |b, v| b.genre = Some(v))
            .member_with(
                "Tags",
                |b| Some(&b.tags),
                |b, v| b.tags = v,
                MemberMeta::new().item_name("Tag"),
            )
            .member_with(
                "Authors",
                |b| Some(&b.authors),
                |b, v| b.authors = v,
                MemberMeta::new().siblings("Author"),
            )
            .member("Ratings", |b| Some(&b.ratings), |b, v| b.ratings = v)
            .member("Extra", |b| b.extra.as_ref(), |b, v| b.extra = Some(v))
            .build()
    }
}

pub fn sample_book() -> Book {
    Book {
        id: Uuid::from_u128(1),
        title: "Notes".to_string(),
        published: NaiveDate::from_ymd_opt(1843, 10, 1),
        price: Some(dec!(19.99)),
        genre: Some(Genre::Science),
        tags: vec!["math".to_string(), "history".to_string()],
        authors: vec![Author::new("Ada", Some(1815)), Author::new("Charles", None)],
        ratings: BTreeMap::from([("goodreads".to_string(), 4)]),
        extra: Some(Dynamic::new("note".to_string())),
    }
}

/// Shelf whose books can only be filled in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shelf {
    pub label: String,
    pub books: Vec<Book>,
    pub sealed: Vec<String>,
}

impl Reflect for Shelf {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Shelf")
            .member("Label", |s| Some(&s.label), |s, v| s.label = v)
            .readonly_member(
                "Books",
                |s| Some(&s.books),
                Some(books_mut),
                MemberMeta::new(),
            )
            .readonly_member("Sealed", |s| Some(&s.sealed), None, MemberMeta::new())
            .build()
    }
}

fn books_mut(shelf: &mut Shelf) -> Option<&mut Vec<Book>> {
    Some(&mut shelf.books)
}

/// A node of a possibly circular chain.
#[derive(Debug, Clone, Default)]
pub struct Link {
    pub name: String,
    pub next: Option<Shared<Link>>,
}

impl Reflect for Link {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Link")
            .member("Name", |l| Some(&l.name), |l, v| l.name = v)
            .member("Next", |l| l.next.as_ref(), |l, v| l.next = Some(v))
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub summary: Option<Summary>,
}

impl Reflect for Chapter {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Chapter")
            .member("Title", |c| Some(&c.title), |c, v| c.title = v)
            .member("Summary", |c| c.summary.as_ref(), |c, v| c.summary = Some(v))
            .build()
    }
}

/// Built by a factory that sees the enclosing chapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub chapter: String,
    pub text: String,
}

impl Reflect for Summary {
    fn type_info() -> TypeInfo {
        TypeInfo::object_with_factory::<Self>("Summary", |parent| Summary {
            chapter: parent
                .and_then(|p| p.as_any().downcast_ref::<Chapter>())
                .map(|c| c.title.clone())
                .unwrap_or_default(),
            text: String::new(),
        })
        .member("Text", |s| Some(&s.text), |s, v| s.text = v)
        .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Basket {
    pub items: Vec<i32>,
}

impl Reflect for Basket {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Basket")
            .member_with(
                "Items",
                |b| Some(&b.items),
                |b, v| b.items = v,
                MemberMeta::new().item_name("item"),
            )
            .build()
    }
}

/// Siblings member without an explicit item name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bag {
    pub names: Vec<String>,
}

impl Reflect for Bag {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Bag")
            .member_with(
                "Names",
                |b| Some(&b.names),
                |b, v| b.names = v,
                MemberMeta::new().siblings(""),
            )
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plain {
    pub items: Vec<i32>,
}

impl Reflect for Plain {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Plain")
            .member("Items", |p| Some(&p.items), |p, v| p.items = v)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holder {
    pub value: Option<String>,
}

impl Reflect for Holder {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Holder")
            .member("Value", |h| h.value.as_ref(), |h, v| h.value = Some(v))
            .build()
    }
}

/// Catalog entry living in an XML namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub code: String,
    pub note: Option<String>,
}

impl Reflect for Entry {
    fn type_info() -> TypeInfo {
        TypeInfo::object::<Self>("Entry")
            .namespace("urn:catalog")
            .member_with(
                "Code",
                |e| Some(&e.code),
                |e, v| e.code = v,
                MemberMeta::new().namespace("urn:codes"),
            )
            .member("Note", |e| e.note.as_ref(), |e, v| e.note = Some(v))
            .build()
    }
}
