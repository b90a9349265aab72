use std::{env, fmt, time::Duration};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Path used when neither `--db` nor `DB_PATH` is given.
pub const DEFAULT_DB_PATH: &str = "techstore.db";

/// Special path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// Create every table that does not exist yet. Existing tables are left
    /// as they are, so this is safe to call on every start.
    pub fn initialize(&self, conn: &Connection) -> Result<()> {
        for table in &self.tables {
            table.ensure(conn)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Render the `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDefinition::to_sql)
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name, columns
        )
    }

    pub fn ensure(&self, conn: &Connection) -> Result<()> {
        let sql = self.create_sql();
        debug!(table = %self.name, %sql, "ensuring table");
        conn.execute_batch(&sql)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default_value = Some(default);
        self
    }

    /// Render the column clause used inside `CREATE TABLE`.
    ///
    /// SQLite ignores declared lengths and precisions, so `VARCHAR` and
    /// `NUMERIC` columns get an extra `CHECK` that enforces them.
    pub fn to_sql(&self) -> String {
        let mut parts = vec![self.name.clone(), self.data_type.to_string()];
        for constraint in &self.constraints {
            parts.push(constraint.to_sql());
        }
        if let Some(default) = &self.default_value {
            parts.push(format!("DEFAULT {}", default.to_sql()));
        }
        if let Some(check) = self.data_type.check_for(&self.name) {
            parts.push(format!("CHECK ({})", check));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    /// Text limited to the given number of characters.
    VarChar(u32),
    /// Fixed-point number: `precision` total digits, `scale` of them fractional.
    Decimal {
        precision: u32,
        scale: u32,
    },
    Timestamp,
}

impl DataType {
    fn check_for(&self, column: &str) -> Option<String> {
        match *self {
            DataType::VarChar(max) => Some(format!("length({}) <= {}", column, max)),
            DataType::Decimal { precision, scale } => {
                let mut check = format!(
                    "typeof({col}) IN ('integer', 'real') AND {col} = round({col}, {scale})",
                    col = column,
                    scale = scale,
                );
                // Integer parts wider than u64 have no magnitude bound.
                if let Some(limit) = 10u64.checked_pow(precision.saturating_sub(scale)) {
                    check.push_str(&format!(" AND abs({}) < {}", column, limit));
                }
                Some(format!("{} IS NULL OR ({})", column, check))
            }
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => f.write_str("INTEGER"),
            DataType::Text => f.write_str("TEXT"),
            DataType::VarChar(max) => write!(f, "VARCHAR({})", max),
            DataType::Decimal { precision, scale } => write!(f, "NUMERIC({},{})", precision, scale),
            DataType::Timestamp => f.write_str("TIMESTAMP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    /// Only valid right after `PrimaryKey` on an `INTEGER` column.
    AutoIncrement,
    NotNull,
    Check(String),
}

impl ColumnConstraint {
    fn to_sql(&self) -> String {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY".to_string(),
            ColumnConstraint::AutoIncrement => "AUTOINCREMENT".to_string(),
            ColumnConstraint::NotNull => "NOT NULL".to_string(),
            ColumnConstraint::Check(expr) => format!("CHECK ({})", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    CurrentTimestamp,
}

impl DefaultValue {
    fn to_sql(&self) -> String {
        match self {
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

/// SQLite configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// How long a connection waits for another writer's lock
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new SQLite config for the given path
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Build the config from `DB_PATH`, loading a `.env` file first if one is
    /// present. Falls back to [`DEFAULT_DB_PATH`].
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let db_path = env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        if db_path.trim().is_empty() {
            return Err(Error::Config("DB_PATH is set but empty".to_string()));
        }
        Ok(Self::new(db_path))
    }

    /// An explicit path wins over the environment.
    pub fn resolve(db_path: Option<String>) -> Result<Self> {
        match db_path {
            Some(path) if path.trim().is_empty() => {
                Err(Error::Config("database path is empty".to_string()))
            }
            Some(path) => Ok(Self::new(path)),
            None => Self::from_env(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }

    pub fn open(&self) -> Result<Connection> {
        let conn = if self.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&self.db_path)?
        };
        conn.busy_timeout(self.busy_timeout)?;
        info!(path = %self.db_path, "connected to database");
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use super::*;

    fn widgets() -> TableDefinition {
        TableDefinition::new("widgets")
            .with_column(
                ColumnDefinition::new("id", DataType::Integer)
                    .with_constraint(ColumnConstraint::PrimaryKey)
                    .with_constraint(ColumnConstraint::AutoIncrement),
            )
            .with_column(
                ColumnDefinition::new("label", DataType::VarChar(8))
                    .with_constraint(ColumnConstraint::NotNull),
            )
            .with_column(ColumnDefinition::new(
                "cost",
                DataType::Decimal {
                    precision: 4,
                    scale: 2,
                },
            ))
            .with_column(
                ColumnDefinition::new("added", DataType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
            )
    }

    fn table_count(conn: &Connection, name: &str) -> i64 {
        let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
        conn.query_row(sql, [name], |row| row.get(0)).unwrap()
    }

    #[test]
    fn renders_create_table_if_not_exists() {
        let sql = widgets().create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS widgets ("));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("label VARCHAR(8) NOT NULL CHECK (length(label) <= 8)"));
        assert!(sql.contains("cost NUMERIC(4,2) CHECK (cost IS NULL OR"));
        assert!(sql.contains("abs(cost) < 100)"));
        assert!(sql.contains("added TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn wide_decimal_has_no_magnitude_bound() {
        let column = ColumnDefinition::new(
            "total",
            DataType::Decimal {
                precision: 40,
                scale: 2,
            },
        );
        let sql = column.to_sql();
        assert!(sql.starts_with("total NUMERIC(40,2) CHECK (total IS NULL OR"));
        assert!(sql.contains("total = round(total, 2)"));
        assert!(!sql.contains("abs(total)"));

        let conn = Connection::open_in_memory().unwrap();
        TableDefinition::new("ledger")
            .with_column(column)
            .ensure(&conn)
            .unwrap();
        conn.execute("INSERT INTO ledger (total) VALUES ('1e30')", [])
            .unwrap();
    }

    #[test]
    fn ensure_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = Schema::new().add_table(widgets());

        assert_eq!(table_count(&conn, "widgets"), 0);
        schema.initialize(&conn).unwrap();
        schema.initialize(&conn).unwrap();
        assert_eq!(table_count(&conn, "widgets"), 1);
    }

    #[test]
    fn length_and_precision_checks_are_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        widgets().ensure(&conn).unwrap();
        let insert = |label: &str, cost: Option<&str>| {
            conn.execute(
                "INSERT INTO widgets (label, cost) VALUES (?1, ?2)",
                params![label, cost],
            )
        };

        insert("ok", Some("12.34")).unwrap();
        insert("null", None).unwrap();
        assert!(insert("too-long-label", None).is_err());
        assert!(insert("x", Some("1.234")).is_err());
        assert!(insert("x", Some("100.00")).is_err());
        assert!(insert("x", Some("abc")).is_err());
    }

    #[test]
    fn config_path_resolution() {
        env::set_var("DB_PATH", "  ");
        assert!(matches!(SqliteConfig::from_env(), Err(Error::Config(_))));

        env::set_var("DB_PATH", "/tmp/from-env.db");
        let config = SqliteConfig::from_env().unwrap();
        assert_eq!(config.db_path, "/tmp/from-env.db");
        assert!(!config.is_in_memory());

        let config = SqliteConfig::resolve(Some("cli.db".to_string())).unwrap();
        assert_eq!(config.db_path, "cli.db");
        let config = SqliteConfig::resolve(None).unwrap();
        assert_eq!(config.db_path, "/tmp/from-env.db");
        let empty = SqliteConfig::resolve(Some(String::new()));
        assert!(matches!(empty, Err(Error::Config(_))));

        env::remove_var("DB_PATH");
    }

    #[test]
    fn in_memory_config_opens() {
        let config = SqliteConfig::new(IN_MEMORY);
        assert!(config.is_in_memory());
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        let conn = config.open().unwrap();
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}
