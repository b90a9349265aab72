use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Row, ToSql,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{Error, Result},
    sqlite::{ColumnConstraint, ColumnDefinition, DataType, DefaultValue, Schema, TableDefinition},
};

pub const PRODUCTS_TABLE: &str = "products";

/// Monetary amount stored as `NUMERIC(10,2)`.
///
/// Always carries exactly two fractional digits; there is no currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    pub const PRECISION: u32 = 10;
    pub const SCALE: u32 = 2;

    pub fn new(value: Decimal) -> Result<Self> {
        let mut value = if value.scale() > Self::SCALE {
            value.normalize()
        } else {
            value
        };
        if value.scale() > Self::SCALE {
            return Err(Error::InvalidPrice(format!(
                "{} has more than {} fractional digits",
                value,
                Self::SCALE
            )));
        }
        let limit = Decimal::from(10u64.pow(Self::PRECISION - Self::SCALE));
        if value.abs() >= limit {
            return Err(Error::InvalidPrice(format!(
                "{} does not fit in {} digits",
                value,
                Self::PRECISION
            )));
        }
        value.rescale(Self::SCALE);
        Ok(Self(value))
    }

    /// Price from an amount in minor units, e.g. `from_cents(999)` is `9.99`.
    pub fn from_cents(cents: i64) -> Result<Self> {
        Self::new(Decimal::new(cents, Self::SCALE))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| Error::InvalidPrice(format!("{:?}: {}", s, e)))?;
        Self::new(value)
    }
}

// Bound as text so SQLite's own parser produces the stored number.
impl ToSql for Price {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Price {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let parsed = match value {
            ValueRef::Integer(i) => Price::new(Decimal::from(i)),
            ValueRef::Real(f) => format!("{:.2}", f).parse(),
            ValueRef::Text(t) => std::str::from_utf8(t)
                .map_err(|e| FromSqlError::Other(Box::new(e)))?
                .parse(),
            _ => return Err(FromSqlError::InvalidType),
        };
        parsed.map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A product that has not been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub category: String,
    pub description: Option<String>,
}

impl NewProduct {
    pub fn new(name: &str, price: Price, category: &str, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            price,
            category: category.to_string(),
            description: description.map(str::to_string),
        }
    }
}

/// A persisted row of the `products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Price,
    pub category: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Product {
    pub const COLUMNS: &'static str = "id, name, price, category, description, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            price: row.get("price")?,
            category: row.get("category")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }

    /// True when this row holds the same data as `record`, ignoring id and
    /// creation time.
    pub fn matches(&self, record: &NewProduct) -> bool {
        self.name == record.name
            && self.price == record.price
            && self.category == record.category
            && self.description == record.description
    }
}

pub fn products_table() -> TableDefinition {
    TableDefinition::new(PRODUCTS_TABLE)
        .with_column(
            ColumnDefinition::new("id", DataType::Integer)
                .with_constraint(ColumnConstraint::PrimaryKey)
                .with_constraint(ColumnConstraint::AutoIncrement),
        )
        .with_column(
            ColumnDefinition::new("name", DataType::VarChar(255))
                .with_constraint(ColumnConstraint::NotNull)
                .with_constraint(ColumnConstraint::Check("length(name) > 0".to_string())),
        )
        .with_column(
            ColumnDefinition::new(
                "price",
                DataType::Decimal {
                    precision: Price::PRECISION,
                    scale: Price::SCALE,
                },
            )
            .with_constraint(ColumnConstraint::NotNull)
            .with_constraint(ColumnConstraint::Check("price > 0".to_string())),
        )
        .with_column(
            ColumnDefinition::new("category", DataType::VarChar(100))
                .with_constraint(ColumnConstraint::NotNull)
                .with_constraint(ColumnConstraint::Check("length(category) > 0".to_string())),
        )
        .with_column(ColumnDefinition::new("description", DataType::Text))
        .with_column(
            ColumnDefinition::new("created_at", DataType::Timestamp)
                .with_default(DefaultValue::CurrentTimestamp),
        )
}

pub fn catalog_schema() -> Schema {
    Schema::new().add_table(products_table())
}

const SEED: [(&str, i64, &str, &str); 6] = [
    (
        "iPhone 15 Pro",
        9_999_999,
        "Смартфоны",
        "Флагманский смартфон Apple с камерой 48 МП",
    ),
    (
        "MacBook Air M2",
        12_499_999,
        "Ноутбуки",
        "Ультратонкий ноутбук с чипом Apple M2",
    ),
    (
        "Samsung Galaxy S24",
        7_999_999,
        "Смартфоны",
        "Android-смартфон с AI функциями",
    ),
    (
        "iPad Air",
        6_599_999,
        "Планшеты",
        "Мощный планшет для работы и творчества",
    ),
    (
        "AirPods Pro",
        2_499_999,
        "Аксессуары",
        "Наушники с шумоподавлением",
    ),
    (
        "Gaming PC",
        18_999_999,
        "Компьютеры",
        "Игровой компьютер с RTX 4080",
    ),
];

/// The fixed seed records, in insertion order.
pub fn catalog() -> Result<Vec<NewProduct>> {
    SEED.iter()
        .map(|&(name, cents, category, description)| {
            Ok(NewProduct::new(
                name,
                Price::from_cents(cents)?,
                category,
                Some(description),
            ))
        })
        .collect()
}
