use serde::Serialize;

/// Kind of migration file to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Sql,
    Rust,
}

impl TemplateKind {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateKind::Sql => "sql",
            TemplateKind::Rust => "rs",
        }
    }

    /// File name of a custom template overriding the built-in one
    pub fn template_file_name(&self) -> &'static str {
        match self {
            TemplateKind::Sql => "sql.hbs",
            TemplateKind::Rust => "rust.hbs",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            TemplateKind::Sql => SQL_TEMPLATE,
            TemplateKind::Rust => RUST_TEMPLATE,
        }
    }
}

/// Context for migration templates
/// Placeholders: {{name}}, {{slug}}, {{timestamp}}, {{filename}}, {{struct_name}}, {{created_at}}
#[derive(Debug, Clone, Serialize)]
pub struct MigrationTemplateContext {
    pub name: String,
    pub slug: String,
    pub timestamp: String,
    pub filename: String,
    pub struct_name: String,
    pub created_at: String,
}

const SQL_TEMPLATE: &str = "\
-- Migration: {{name}}
-- Created: {{created_at}}

-- up


-- down

";

const RUST_TEMPLATE: &str = "\
//! Migration: {{name}}
//! Created: {{created_at}}
//!
//! Register with `registry.register_migration(\"{{filename}}\", {{struct_name}})`.

use async_trait::async_trait;
use schema_migrator::{Migration, MigrationError, Schema};

pub struct {{struct_name}};

#[async_trait]
impl Migration for {{struct_name}} {
    async fn up(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        let _ = schema;
        Ok(())
    }

    async fn down(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        let _ = schema;
        Ok(())
    }
}
";
