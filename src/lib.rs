//! Schema and seed initializer for the TechStore product catalog.
//!
//! # Intention
//!
//! - Bring a SQLite database into a known, reproducible state: one
//!   `products` table holding the fixed six-product catalog.
//! - Re-running is idempotent: rows are wiped and the id counter restarts,
//!   so every run ends with ids `1..=6` assigned to the same records.
//!
//! # Architectural Boundaries
//!
//! - Only schema creation, reset and seeding belong here.
//! - No query API, no CRUD service, no migrations.

pub mod error;
pub mod product;
pub mod seed;
pub mod sqlite;

pub use error::{Error, Result};
pub use product::{
    catalog, catalog_schema, products_table, NewProduct, Price, Product, PRODUCTS_TABLE,
};
pub use seed::{ensure_table, reset, seed, Initializer, SeedReport};
pub use sqlite::{Schema, SqliteConfig};
