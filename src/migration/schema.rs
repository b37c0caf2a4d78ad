//! Schema handle passed to migration steps.
//!
//! Every statement issued through a [`Schema`] runs inside the transaction the
//! executor opened for the migration, so a failing step leaves nothing
//! behind. The builders here only render SQL; identifiers are always quoted.

use super::types::MigrationError;
use crate::database::{Dialect, Transaction};
use crate::utils::{quote_identifier, quote_literal};

/// Column types understood by the table builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInteger,
    Text,
    /// `VARCHAR(n)`
    String(u32),
    Boolean,
    Timestamp,
    Json,
    Uuid,
    /// `NUMERIC(precision, scale)`
    Decimal(u8, u8),
}

impl ColumnType {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::Integer, _) => "INTEGER".to_string(),
            (ColumnType::BigInteger, _) => "BIGINT".to_string(),
            (ColumnType::Text, _) => "TEXT".to_string(),
            (ColumnType::String(len), _) => format!("VARCHAR({})", len),
            (ColumnType::Boolean, _) => "BOOLEAN".to_string(),
            (ColumnType::Timestamp, dialect) => dialect.timestamp_type().to_string(),
            (ColumnType::Json, Dialect::Postgres) => "JSONB".to_string(),
            (ColumnType::Json, Dialect::Sqlite) => "TEXT".to_string(),
            (ColumnType::Uuid, Dialect::Postgres) => "UUID".to_string(),
            (ColumnType::Uuid, Dialect::Sqlite) => "TEXT".to_string(),
            (ColumnType::Decimal(precision, scale), _) => {
                format!("NUMERIC({}, {})", precision, scale)
            }
        }
    }
}

/// A column definition.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    primary_key: bool,
    unique: bool,
    default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Default given as a raw SQL expression, e.g. `0` or `CURRENT_TIMESTAMP`.
    pub fn default_raw(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Default given as a string value; quoted as a literal.
    pub fn default_text(mut self, value: &str) -> Self {
        self.default = Some(quote_literal(value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!(
            "{} {}",
            quote_identifier(&self.name),
            self.column_type.to_sql(dialect)
        );
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// Builder for `CREATE TABLE` statements.
pub struct TableBuilder {
    table_name: String,
    dialect: Dialect,
    columns: Vec<String>,
    constraints: Vec<String>,
}

impl TableBuilder {
    pub fn new(table_name: &str, dialect: Dialect) -> Self {
        Self {
            table_name: table_name.to_string(),
            dialect,
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Auto-incrementing integer primary key.
    pub fn id(&mut self, name: &str) -> &mut Self {
        let column_type = match self.dialect {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
        };
        self.columns
            .push(format!("{} {}", quote_identifier(name), column_type));
        self
    }

    pub fn column(&mut self, column: ColumnDef) -> &mut Self {
        self.columns.push(column.to_sql(self.dialect));
        self
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDef::new(name, ColumnType::Integer))
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDef::new(name, ColumnType::Text))
    }

    pub fn string(&mut self, name: &str, length: u32) -> &mut Self {
        self.column(ColumnDef::new(name, ColumnType::String(length)))
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDef::new(name, ColumnType::Boolean))
    }

    pub fn timestamp(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDef::new(name, ColumnType::Timestamp))
    }

    /// `created_at` and `updated_at`, both defaulting to now.
    pub fn timestamps(&mut self) -> &mut Self {
        let now = self.dialect.current_timestamp();
        for name in ["created_at", "updated_at"] {
            self.column(
                ColumnDef::new(name, ColumnType::Timestamp)
                    .not_null()
                    .default_raw(now),
            );
        }
        self
    }

    /// Composite primary key.
    pub fn primary_key(&mut self, columns: &[&str]) -> &mut Self {
        self.constraints
            .push(format!("PRIMARY KEY ({})", quote_list(columns)));
        self
    }

    /// Composite unique constraint.
    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.constraints
            .push(format!("UNIQUE ({})", quote_list(columns)));
        self
    }

    pub fn to_sql(&self) -> String {
        let body: Vec<&str> = self
            .columns
            .iter()
            .chain(self.constraints.iter())
            .map(String::as_str)
            .collect();
        format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_identifier(&self.table_name),
            body.join(",\n    ")
        )
    }
}

fn quote_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Schema-manipulation handle bound to one open transaction.
pub struct Schema<'a> {
    tx: &'a mut dyn Transaction,
    dialect: Dialect,
}

impl<'a> Schema<'a> {
    pub fn new(tx: &'a mut dyn Transaction, dialect: Dialect) -> Self {
        Self { tx, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Execute one statement, returning the affected row count.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, MigrationError> {
        Ok(self.tx.execute(sql, &[]).await?)
    }

    /// Execute one statement with positional parameters.
    pub async fn execute_with(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<u64, MigrationError> {
        Ok(self.tx.execute(sql, params).await?)
    }

    /// Execute several `;`-separated statements.
    pub async fn execute_script(&mut self, sql: &str) -> Result<(), MigrationError> {
        if sql.trim().is_empty() {
            return Ok(());
        }
        Ok(self.tx.execute_script(sql).await?)
    }

    pub async fn create_table<F>(
        &mut self,
        table_name: &str,
        build: F,
    ) -> Result<(), MigrationError>
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table = TableBuilder::new(table_name, self.dialect);
        build(&mut table);
        let sql = table.to_sql();
        self.execute(&sql).await?;
        Ok(())
    }

    pub async fn drop_table(&mut self, table_name: &str) -> Result<(), MigrationError> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(table_name));
        self.execute(&sql).await?;
        Ok(())
    }

    pub async fn add_column(
        &mut self,
        table_name: &str,
        column: ColumnDef,
    ) -> Result<(), MigrationError> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table_name),
            column.to_sql(self.dialect)
        );
        self.execute(&sql).await?;
        Ok(())
    }

    pub async fn drop_column(
        &mut self,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), MigrationError> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(table_name),
            quote_identifier(column_name)
        );
        self.execute(&sql).await?;
        Ok(())
    }

    /// Create an index, named `idx_<table>_<columns>` unless `index_name` is
    /// given.
    pub async fn create_index(
        &mut self,
        table_name: &str,
        columns: &[&str],
        index_name: Option<&str>,
    ) -> Result<(), MigrationError> {
        let sql = index_sql(table_name, columns, index_name, false);
        self.execute(&sql).await?;
        Ok(())
    }

    pub async fn create_unique_index(
        &mut self,
        table_name: &str,
        columns: &[&str],
        index_name: Option<&str>,
    ) -> Result<(), MigrationError> {
        let sql = index_sql(table_name, columns, index_name, true);
        self.execute(&sql).await?;
        Ok(())
    }

    pub async fn drop_index(&mut self, index_name: &str) -> Result<(), MigrationError> {
        let sql = format!("DROP INDEX IF EXISTS {}", quote_identifier(index_name));
        self.execute(&sql).await?;
        Ok(())
    }
}

fn index_sql(table_name: &str, columns: &[&str], index_name: Option<&str>, unique: bool) -> String {
    let default_name = format!("idx_{}_{}", table_name.replace('.', "_"), columns.join("_"));
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if unique { "UNIQUE " } else { "" },
        quote_identifier(index_name.unwrap_or(&default_name)),
        quote_identifier(table_name),
        quote_list(columns)
    )
}
