//! Site configuration singleton.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Identifier of the one and only site configuration record.
pub const SITE_CONFIG_ID: &str = "default";

/// Company and contact details shown across the public pages.
///
/// Fields missing from a stored document take their built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub id: String,
    pub brand_name: String,
    pub company_name: String,
    pub tel: String,
    pub contact: String,
    pub email: String,
    pub address: String,
    pub about_us: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            id: SITE_CONFIG_ID.to_string(),
            brand_name: "康备尔净水".to_string(),
            company_name: "杭州康备尔设计咨询有限公司".to_string(),
            tel: String::new(),
            contact: String::new(),
            email: String::new(),
            address: String::new(),
            about_us: String::new(),
        }
    }
}

/// Admin form submission for the site configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfigForm {
    #[serde(default)]
    pub brand_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub tel: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub about_us: String,
}

impl SiteConfigForm {
    /// Validate the submission into the full singleton record.
    pub fn validate(&self) -> Result<SiteConfig, AppError> {
        let brand_name = self.brand_name.trim();
        if brand_name.is_empty() {
            return Err(AppError::Validation("Brand name is required".to_string()));
        }

        let email = self.email.trim();
        if !email.is_empty() && !email.contains('@') {
            return Err(AppError::Validation(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        Ok(SiteConfig {
            id: SITE_CONFIG_ID.to_string(),
            brand_name: brand_name.to_string(),
            company_name: self.company_name.trim().to_string(),
            tel: self.tel.trim().to_string(),
            contact: self.contact.trim().to_string(),
            email: email.to_string(),
            address: self.address.trim().to_string(),
            about_us: self.about_us.clone(),
        })
    }
}
