//! Prompt template persistence
//!
//! Read-mostly catalog of curated prompt presets. The gateway ships a
//! seeded set; deployments with a durable store can swap the
//! implementation behind the trait.

use crate::core::types::{Quality, TransformationSettings};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A curated prompt preset selectable by clients
#[derive(Debug, Clone, serde::Serialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub prompt: String,
    pub settings: TransformationSettings,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a template
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub settings: Option<TransformationSettings>,
}

/// Catalog of prompt templates; listings return active entries only
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn create(&self, input: NewTemplate) -> Result<Template>;
    async fn get(&self, id: &str) -> Result<Option<Template>>;
    async fn list_active(&self) -> Result<Vec<Template>>;
    async fn list_by_category(&self, category: &str) -> Result<Vec<Template>>;
}

/// In-memory catalog seeded with the built-in presets
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, Template>>,
    order: RwLock<Vec<String>>,
}

impl InMemoryTemplateStore {
    /// An empty catalog, for tests that control their own contents
    pub fn empty() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    pub fn seeded() -> Self {
        let mut templates = HashMap::new();
        let mut order = Vec::new();
        for template in default_templates() {
            order.push(template.id.clone());
            templates.insert(template.id.clone(), template);
        }
        Self {
            templates: RwLock::new(templates),
            order: RwLock::new(order),
        }
    }
}

impl Default for InMemoryTemplateStore {
    fn default() -> Self {
        Self::seeded()
    }
}

fn template(
    name: &str,
    description: &str,
    category: &str,
    prompt: &str,
    settings: TransformationSettings,
) -> Template {
    Template {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        category: category.to_string(),
        thumbnail_url: None,
        prompt: prompt.to_string(),
        settings,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn default_templates() -> Vec<Template> {
    vec![
        template(
            "Professional Headshot",
            "Studio lighting, clean background, business professional",
            "professional",
            "Transform into a professional headshot with studio lighting, clean white or gray background, business attire, professional lighting setup",
            TransformationSettings {
                quality: Quality::High,
                ..Default::default()
            },
        ),
        template(
            "Product Showcase",
            "Clean backgrounds, perfect lighting, e-commerce ready",
            "product",
            "Create a product photography setup with clean white background, professional lighting, shadow removal, e-commerce ready format",
            TransformationSettings {
                quality: Quality::High,
                speed: 9,
                ..Default::default()
            },
        ),
        template(
            "Social Media",
            "Square format, vibrant colors, trending styles",
            "social",
            "Optimize for social media with vibrant colors, trendy aesthetic, square aspect ratio, engaging composition",
            TransformationSettings {
                quality: Quality::Medium,
                speed: 5,
                ..Default::default()
            },
        ),
        template(
            "Artistic Style",
            "Creative artistic transformations",
            "artistic",
            "Apply artistic style transformation with enhanced colors, creative composition, artistic filters",
            TransformationSettings {
                quality: Quality::High,
                speed: 8,
                ..Default::default()
            },
        ),
    ]
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn create(&self, input: NewTemplate) -> Result<Template> {
        if input.name.trim().is_empty() || input.prompt.trim().is_empty() {
            return Err(EngineError::Validation(
                "template name and prompt are required".to_string(),
            ));
        }

        let template = Template {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            category: input.category,
            thumbnail_url: input.thumbnail_url,
            prompt: input.prompt,
            settings: input.settings.unwrap_or_default(),
            is_active: true,
            created_at: Utc::now(),
        };

        self.order.write().await.push(template.id.clone());
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template.clone());
        Ok(template)
    }

    async fn get(&self, id: &str) -> Result<Option<Template>> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Template>> {
        let templates = self.templates.read().await;
        Ok(self
            .order
            .read()
            .await
            .iter()
            .filter_map(|id| templates.get(id))
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Template>> {
        let templates = self.templates.read().await;
        Ok(self
            .order
            .read()
            .await
            .iter()
            .filter_map(|id| templates.get(id))
            .filter(|t| t.is_active && t.category == category)
            .cloned()
            .collect())
    }
}
