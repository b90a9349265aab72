//! Schema initializer for the product catalog.
//!
//! Brings the database to a known state in three strictly ordered steps:
//! ensure the table, reset it, seed it. [`Initializer::run`] performs all
//! three inside one `IMMEDIATE` transaction so a failed run leaves the
//! previous contents in place. The individual steps are exposed as free
//! functions for callers that manage their own transaction.

use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    error::Result,
    product::{catalog, catalog_schema, NewProduct, Product, PRODUCTS_TABLE},
    sqlite::SqliteConfig,
};

/// Outcome of a completed initialization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub database: String,
    /// Rows that existed before the reset.
    pub removed: usize,
    pub products: Vec<Product>,
}

/// Create the `products` table if it is missing. An existing table is not
/// altered.
pub fn ensure_table(conn: &Connection) -> Result<()> {
    catalog_schema().initialize(conn)
}

/// Delete every product and restart the id counter, so the next insert gets
/// id 1. Returns the number of rows removed.
pub fn reset(conn: &Connection) -> Result<usize> {
    let removed = conn.execute(&format!("DELETE FROM {}", PRODUCTS_TABLE), [])?;

    // sqlite_sequence only exists once some AUTOINCREMENT table was created.
    let has_sequence: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence')",
        [],
        |row| row.get(0),
    )?;
    if has_sequence {
        conn.execute(
            "DELETE FROM sqlite_sequence WHERE name = ?1",
            [PRODUCTS_TABLE],
        )?;
    }
    info!(removed, table = PRODUCTS_TABLE, "table reset");
    Ok(removed)
}

/// Insert the fixed catalog in order and return the stored rows.
pub fn seed(conn: &Connection) -> Result<Vec<Product>> {
    insert_all(conn, &catalog()?)
}

fn insert_all(conn: &Connection, records: &[NewProduct]) -> Result<Vec<Product>> {
    let sql = format!(
        "INSERT INTO {} (name, price, category, description) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
        PRODUCTS_TABLE,
        Product::COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut products = Vec::with_capacity(records.len());
    for record in records {
        let product = stmt.query_row(
            params![
                record.name,
                record.price,
                record.category,
                record.description
            ],
            Product::from_row,
        )?;
        debug!(
            id = product.id,
            name = %product.name,
            price = %product.price,
            "seeded product"
        );
        products.push(product);
    }
    info!(count = products.len(), table = PRODUCTS_TABLE, "catalog seeded");
    Ok(products)
}

/// Owns the connection and runs ensure → reset → seed.
#[derive(Debug)]
pub struct Initializer {
    conn: Connection,
    database: String,
}

impl Initializer {
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let conn = config.open()?;
        Ok(Self {
            conn,
            database: config.db_path.clone(),
        })
    }

    pub fn with_connection(conn: Connection) -> Self {
        let database = conn.path().unwrap_or_default().to_string();
        Self { conn, database }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    #[instrument(skip(self), fields(database = %self.database))]
    pub fn run(&mut self) -> Result<SeedReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_table(&tx)?;
        info!("schema ensured");
        let removed = reset(&tx)?;
        let products = seed(&tx)?;

        tx.commit()?;
        info!(count = products.len(), "initialization complete");

        Ok(SeedReport {
            database: self.database.clone(),
            removed,
            products,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::sqlite::IN_MEMORY;

    use super::*;

    #[test]
    fn steps_compose_without_a_transaction() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn).unwrap();
        assert_eq!(reset(&conn).unwrap(), 0);

        let products = seed(&conn).unwrap();
        assert_eq!(products.len(), 6);
        assert_eq!(products.first().map(|p| p.id), Some(1));
        assert_eq!(products.last().map(|p| p.id), Some(6));

        assert_eq!(reset(&conn).unwrap(), 6);
        let again = seed(&conn).unwrap();
        assert_eq!(again.first().map(|p| p.id), Some(1));
    }

    #[test]
    fn reset_without_sequence_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute("INSERT INTO products (name) VALUES ('legacy')", [])
            .unwrap();
        assert_eq!(reset(&conn).unwrap(), 1);
    }

    #[test]
    fn run_reports_seeded_rows() {
        let mut init = Initializer::with_connection(Connection::open_in_memory().unwrap());
        let report = init.run().unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(report.products.len(), 6);

        let catalog = catalog().unwrap();
        for (product, record) in report.products.iter().zip(&catalog) {
            assert!(product.matches(record), "{:?} != {:?}", product, record);
        }

        let report = init.run().unwrap();
        assert_eq!(report.removed, 6);
    }

    #[test]
    fn opened_initializer_creates_its_own_table() {
        let config = SqliteConfig::new(IN_MEMORY);
        let mut init = Initializer::open(&config).unwrap();
        let report = init.run().unwrap();
        assert_eq!(report.database, IN_MEMORY);
        assert_eq!(report.products.len(), 6);
        assert_eq!(report.products.last().map(|p| p.id), Some(6));
    }
}
