//! Product model and the admin form it is edited through.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::AppError;

/// A product as stored in `products.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Older documents carry a single `categoryId` string.
    #[serde(default, alias = "categoryId", deserialize_with = "one_or_many")]
    pub category_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Product {
    /// Build a freshly created, published product.
    pub fn new(id: String, input: &ProductInput, now: &str) -> Self {
        Self {
            id,
            name: input.name.clone(),
            category_ids: input.category_ids.clone(),
            description: input.description.clone(),
            content: input.content.clone(),
            images: input.images.clone(),
            is_published: true,
            sort_order: input.sort_order.unwrap_or(0),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Replace the editable fields; publish state and creation time are kept.
    pub fn apply(&mut self, input: &ProductInput, now: &str) {
        self.name = input.name.clone();
        self.category_ids = input.category_ids.clone();
        self.description = input.description.clone();
        self.content = input.content.clone();
        self.images = input.images.clone();
        if let Some(sort_order) = input.sort_order {
            self.sort_order = sort_order;
        }
        self.updated_at = now.to_string();
    }

    pub fn in_category(&self, category_id: &str) -> bool {
        self.category_ids.iter().any(|c| c == category_id)
    }

    /// Creation time for ordering; unparsable timestamps sort last.
    pub fn created_at_ts(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// The `products.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductsDocument {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Validated product fields accepted by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub category_ids: Vec<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub images: Vec<String>,
    pub sort_order: Option<i32>,
}

impl ProductInput {
    pub fn new(name: impl Into<String>, category_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            category_ids,
            description: None,
            content: None,
            images: Vec::new(),
            sort_order: None,
        }
    }
}

/// Raw admin form submission for a product.
///
/// `categoryIds` is repeated once per selected category and `images` is a
/// JSON-encoded array of URLs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub images: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

impl ProductForm {
    /// The target product id, if this submission edits an existing record.
    pub fn target_id(&self) -> Option<String> {
        non_blank(self.id.as_deref())
    }

    /// Validate the submission into repository input.
    pub fn validate(&self) -> Result<ProductInput, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Product name is required".to_string()));
        }

        let mut category_ids: Vec<String> = Vec::new();
        for id in self.category_ids.iter().map(|c| c.trim()) {
            if !id.is_empty() && !category_ids.iter().any(|c| c == id) {
                category_ids.push(id.to_string());
            }
        }
        if category_ids.is_empty() {
            return Err(AppError::Validation(
                "At least one category is required".to_string(),
            ));
        }

        let images = match non_blank(self.images.as_deref()) {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).map_err(|_| {
                AppError::Validation("images must be a JSON array of URLs".to_string())
            })?,
            None => Vec::new(),
        };

        let sort_order = match non_blank(self.sort_order.as_deref()) {
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                AppError::Validation(format!("sortOrder must be an integer, got '{}'", raw))
            })?),
            None => None,
        };

        Ok(ProductInput {
            name: name.to_string(),
            category_ids,
            description: non_blank(self.description.as_deref()),
            content: non_blank(self.content.as_deref()),
            images,
            sort_order,
        })
    }
}

/// Current time in the stored timestamp format (`2024-05-01T08:00:00.000Z`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
        None => Vec::new(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
