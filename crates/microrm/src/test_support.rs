//! Shared fixtures for unit tests.

use crate::coercion::DEFAULT_TIMESTAMP_FORMAT;
use crate::entity::{Accessor, Entity};
use crate::mapper::{AttributeMapping, DataMapper, MappingConfig};
use crate::value::{FromValue, IntoValue};
use chrono::{NaiveDate, NaiveDateTime};

macro_rules! accessor {
    ($ty:ty, $field:ident) => {
        Accessor::<Self>::new(
            stringify!($field),
            <$ty as IntoValue>::KIND,
            |e| e.$field.clone().into_value(),
            |e, v| {
                e.$field = FromValue::from_value(v)?;
                Ok(())
            },
        )
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub score: f64,
    pub active: bool,
    pub created: Option<NaiveDateTime>,
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn accessors() -> Vec<Accessor<Self>> {
        vec![
            accessor!(Option<i64>, id),
            accessor!(String, name),
            accessor!(Option<String>, email),
            accessor!(f64, score),
            accessor!(bool, active),
            accessor!(Option<NaiveDateTime>, created),
        ]
    }
}

/// `users` table with `name -> user_name` and `created -> created_at`.
pub fn user_mapping() -> MappingConfig {
    MappingConfig::new("User")
        .table_name("users")
        .timestamp_format(DEFAULT_TIMESTAMP_FORMAT)
        .attribute("name", AttributeMapping::new().column("user_name"))
        .attribute(
            "created",
            AttributeMapping::new().column("created_at").kind("timestamp"),
        )
}

pub fn user_mapper() -> DataMapper<User> {
    DataMapper::new(user_mapping()).unwrap()
}

pub fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn alice() -> User {
    User {
        id: None,
        name: "alice".into(),
        email: Some("alice@example.com".into()),
        score: 4.5,
        active: true,
        created: Some(ts(9, 30, 0)),
    }
}
