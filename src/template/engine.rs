use handlebars::Handlebars;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use super::types::{MigrationTemplateContext, TemplateKind};
use crate::utils::{now_iso, now_timestamp};

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Render error: {0}")]
    RenderError(#[from] handlebars::RenderError),

    #[error("Invalid migration name: {0:?}")]
    InvalidName(String),

    #[error("Migration file already exists: {0}")]
    AlreadyExists(PathBuf),
}

pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    templates_path: Option<PathBuf>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Output is source code, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        Self {
            handlebars,
            templates_path: None,
        }
    }

    /// Look for custom templates in `path` before falling back to the
    /// built-in ones
    pub fn with_templates_path(mut self, path: Option<PathBuf>) -> Self {
        self.templates_path = path;
        self
    }

    /// Load the template for `kind`
    /// Looks for "{kind}.hbs" in the templates folder, then uses the built-in template
    pub async fn load_template(&self, kind: TemplateKind) -> Result<String, TemplateError> {
        if let Some(dir) = &self.templates_path {
            let template_path = dir.join(kind.template_file_name());
            if template_path.exists() {
                return Ok(fs::read_to_string(&template_path).await?);
            }
        }
        Ok(kind.builtin().to_string())
    }

    pub async fn render(
        &self,
        kind: TemplateKind,
        context: &MigrationTemplateContext,
    ) -> Result<String, TemplateError> {
        let template_content = self.load_template(kind).await?;

        self.handlebars
            .render_template(&template_content, context)
            .map_err(TemplateError::from)
    }

    /// Write a new `<timestamp>-<slug>.<ext>` migration into `migrations_path`
    pub async fn create_migration(
        &self,
        migrations_path: &Path,
        name: &str,
        kind: TemplateKind,
    ) -> Result<PathBuf, TemplateError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(TemplateError::InvalidName(name.to_string()));
        }

        let timestamp = now_timestamp();
        let filename = format!("{}-{}.{}", timestamp, slug, kind.extension());
        let path = migrations_path.join(&filename);

        if path.exists() {
            return Err(TemplateError::AlreadyExists(path));
        }

        let context = MigrationTemplateContext {
            name: name.trim().to_string(),
            struct_name: struct_name(&slug),
            slug,
            timestamp,
            filename,
            created_at: now_iso(),
        };
        let content = self.render(kind, &context).await?;

        fs::create_dir_all(migrations_path).await?;
        fs::write(&path, content).await?;

        info!(path = %path.display(), "Created migration");
        Ok(path)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, dash-separated name made only of ASCII word characters and
/// dashes, so the file always matches the discovery pattern
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// `add-user-index` -> `AddUserIndex`
fn struct_name(slug: &str) -> String {
    let name: String = slug
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Migration{}", name)
    } else {
        name
    }
}
