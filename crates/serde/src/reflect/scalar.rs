//! Scalar content and the built-in simple types.

use std::borrow::Cow;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

use super::{Reflect, ScalarInfo, TypeInfo};

/// Scalar content exchanged between values, writers, readers and nodes.
///
/// Numbers keep their textual form so no precision is lost between the
/// wire and the destination type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(String),
    Text(String),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }

    pub fn number(value: impl fmt::Display) -> Self {
        Scalar::Number(value.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Textual form; `Null` is empty.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Scalar::Null => Cow::Borrowed(""),
            Scalar::Bool(true) => Cow::Borrowed("true"),
            Scalar::Bool(false) => Cow::Borrowed("false"),
            Scalar::Number(text) | Scalar::Text(text) => Cow::Borrowed(text),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

fn downcast<T: Reflect>(value: &dyn Reflect) -> Option<&T> {
    value.resolve().as_any().downcast_ref::<T>()
}

fn eq_scalar<T: Reflect + PartialEq>(this: &T, other: &dyn Reflect) -> Option<bool> {
    Some(downcast::<T>(other).is_some_and(|other| other == this))
}

fn write_text<T: Reflect + fmt::Display>(value: &dyn Reflect) -> Option<Scalar> {
    downcast::<T>(value).map(|v| Scalar::Text(v.to_string()))
}

fn write_number<T: Reflect + fmt::Display>(value: &dyn Reflect) -> Option<Scalar> {
    downcast::<T>(value).map(|v| Scalar::Number(v.to_string()))
}

fn write_float<T>(value: &dyn Reflect) -> Option<Scalar>
where
    T: Reflect + fmt::Display + Copy + Into<f64>,
{
    downcast::<T>(value).map(|v| {
        if Into::<f64>::into(*v).is_finite() {
            Scalar::Number(v.to_string())
        } else {
            Scalar::Text(v.to_string())
        }
    })
}

fn write_bool(value: &dyn Reflect) -> Option<Scalar> {
    downcast::<bool>(value).map(|v| Scalar::Bool(*v))
}

fn write_datetime(value: &dyn Reflect) -> Option<Scalar> {
    downcast::<DateTime<Utc>>(value)
        .map(|v| Scalar::Text(v.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn write_local_datetime(value: &dyn Reflect) -> Option<Scalar> {
    downcast::<NaiveDateTime>(value)
        .map(|v| Scalar::Text(v.format(LOCAL_DATETIME_FORMAT).to_string()))
}

fn non_null(scalar: &Scalar) -> Result<Cow<'_, str>, String> {
    match scalar {
        Scalar::Null => Err("null is not a value".to_string()),
        other => Ok(other.as_text()),
    }
}

fn read_parsed<T>(scalar: &Scalar) -> Result<Box<dyn Reflect>, String>
where
    T: Reflect + FromStr,
    T::Err: fmt::Display,
{
    let text = non_null(scalar)?;
    text.trim()
        .parse::<T>()
        .map(|v| Box::new(v) as Box<dyn Reflect>)
        .map_err(|e| e.to_string())
}

fn read_string(scalar: &Scalar) -> Result<Box<dyn Reflect>, String> {
    Ok(Box::new(non_null(scalar)?.into_owned()))
}

fn read_bool(scalar: &Scalar) -> Result<Box<dyn Reflect>, String> {
    match scalar {
        Scalar::Bool(value) => Ok(Box::new(*value)),
        other => match non_null(other)?.trim() {
            "true" | "1" => Ok(Box::new(true)),
            "false" | "0" => Ok(Box::new(false)),
            text => Err(format!("'{text}' is not a boolean")),
        },
    }
}

fn read_datetime(scalar: &Scalar) -> Result<Box<dyn Reflect>, String> {
    let text = non_null(scalar)?;
    DateTime::parse_from_rfc3339(text.trim())
        .map(|v| Box::new(v.with_timezone(&Utc)) as Box<dyn Reflect>)
        .map_err(|e| e.to_string())
}

fn read_local_datetime(scalar: &Scalar) -> Result<Box<dyn Reflect>, String> {
    let text = non_null(scalar)?;
    NaiveDateTime::parse_from_str(text.trim(), LOCAL_DATETIME_FORMAT)
        .map(|v| Box::new(v) as Box<dyn Reflect>)
        .map_err(|e| e.to_string())
}

macro_rules! impl_scalar {
    ($ty:ty, $name:literal, $write:expr, $read:expr) => {
        impl Reflect for $ty {
            fn type_info() -> TypeInfo {
                TypeInfo::scalar::<Self>($name, ScalarInfo::new($write, $read))
            }

            fn reflect_eq(&self, other: &dyn Reflect) -> Option<bool> {
                eq_scalar(self, other)
            }
        }
    };
}

macro_rules! impl_numbers {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(impl_scalar!($ty, $name, write_number::<$ty>, read_parsed::<$ty>);)*
    };
}

impl_numbers! {
    i8 => "Int8",
    i16 => "Int16",
    i32 => "Int32",
    i64 => "Int64",
    i128 => "Int128",
    isize => "IntPtr",
    u8 => "UInt8",
    u16 => "UInt16",
    u32 => "UInt32",
    u64 => "UInt64",
    u128 => "UInt128",
    usize => "UIntPtr",
    Decimal => "Decimal",
}

impl_scalar!(f32, "Single", write_float::<f32>, read_parsed::<f32>);
impl_scalar!(f64, "Double", write_float::<f64>, read_parsed::<f64>);
impl_scalar!(bool, "Boolean", write_bool, read_bool);
impl_scalar!(char, "Char", write_text::<char>, read_parsed::<char>);
impl_scalar!(String, "String", write_text::<String>, read_string);
impl_scalar!(DateTime<Utc>, "DateTime", write_datetime, read_datetime);
impl_scalar!(NaiveDateTime, "LocalDateTime", write_local_datetime, read_local_datetime);
impl_scalar!(NaiveDate, "Date", write_text::<NaiveDate>, read_parsed::<NaiveDate>);
impl_scalar!(NaiveTime, "Time", write_text::<NaiveTime>, read_parsed::<NaiveTime>);
impl_scalar!(Uuid, "Guid", write_text::<Uuid>, read_parsed::<Uuid>);
impl_scalar!(Url, "Uri", write_text::<Url>, read_parsed::<Url>);
impl_scalar!(IpAddr, "IPAddress", write_text::<IpAddr>, read_parsed::<IpAddr>);
