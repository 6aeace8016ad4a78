//! Store configuration.
//!
//! Collection names and page sizes are plain data. [`StoreConfig::from_env`] loads a
//! `.env` file if one exists and overrides the defaults with `FIRELAYER_*` variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FIRELAYER_BLOGS_COLLECTION` | `blogs` |
//! | `FIRELAYER_IMAGES_COLLECTION` | `images` |
//! | `FIRELAYER_BLOG_PAGE_SIZE` | `10` |
//! | `FIRELAYER_IMAGE_PAGE_SIZE` | `24` |
//! | `FIRELAYER_MAX_PAGE_SIZE` | `100` |

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use firelayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    page::PaginationParams,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub blogs_collection: String,
    pub images_collection: String,
    pub blog_page_size: usize,
    pub image_page_size: usize,
    pub max_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            blogs_collection: "blogs".to_string(),
            images_collection: "images".to_string(),
            blog_page_size: 10,
            image_page_size: 24,
            max_page_size: 100,
        }
    }
}

impl StoreConfig {
    /// Loads `.env` (if present) and reads the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if a numeric variable does not parse
    /// or a page size is zero.
    pub fn from_env() -> DocumentStoreResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded environment file");
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocumentStoreResult<Self> {
        let defaults = Self::default();

        let config = Self {
            blogs_collection: lookup("FIRELAYER_BLOGS_COLLECTION").unwrap_or(defaults.blogs_collection),
            images_collection: lookup("FIRELAYER_IMAGES_COLLECTION").unwrap_or(defaults.images_collection),
            blog_page_size: parse_var(&lookup, "FIRELAYER_BLOG_PAGE_SIZE", defaults.blog_page_size)?,
            image_page_size: parse_var(&lookup, "FIRELAYER_IMAGE_PAGE_SIZE", defaults.image_page_size)?,
            max_page_size: parse_var(&lookup, "FIRELAYER_MAX_PAGE_SIZE", defaults.max_page_size)?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> DocumentStoreResult<()> {
        for (name, size) in [
            ("blog_page_size", self.blog_page_size),
            ("image_page_size", self.image_page_size),
            ("max_page_size", self.max_page_size),
        ] {
            if size == 0 {
                return Err(DocumentStoreError::Configuration(format!("{name} must be greater than zero")));
            }
        }

        Ok(())
    }

    /// Clamps requested pagination to `1..=max_page_size` items and a page of at least 1.
    pub fn clamp(&self, params: &PaginationParams) -> PaginationParams {
        PaginationParams::new(params.page.max(1), params.per_page.clamp(1, self.max_page_size.max(1)))
    }

    /// Pagination for blog listings. Without a request, the first page of `blog_page_size`.
    pub fn blog_params(&self, params: Option<&PaginationParams>) -> PaginationParams {
        self.resolve(params, self.blog_page_size)
    }

    /// Pagination for image listings. Without a request, the first page of `image_page_size`.
    pub fn image_params(&self, params: Option<&PaginationParams>) -> PaginationParams {
        self.resolve(params, self.image_page_size)
    }

    fn resolve(&self, params: Option<&PaginationParams>, default_per_page: usize) -> PaginationParams {
        match params {
            Some(params) => self.clamp(params),
            None => self.clamp(&PaginationParams::new(1, default_per_page)),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> DocumentStoreResult<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            DocumentStoreError::Configuration(format!("{key} must be a non-negative integer, got `{raw}`"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        assert_eq!(StoreConfig::from_lookup(lookup(&[])).unwrap(), StoreConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("FIRELAYER_BLOGS_COLLECTION", "posts"),
            ("FIRELAYER_IMAGE_PAGE_SIZE", " 12 "),
        ]))
        .unwrap();

        assert_eq!(config.blogs_collection, "posts");
        assert_eq!(config.images_collection, "images");
        assert_eq!(config.image_page_size, 12);
    }

    #[test]
    fn bad_numbers_are_configuration_errors() {
        for vars in [[("FIRELAYER_MAX_PAGE_SIZE", "lots")], [("FIRELAYER_BLOG_PAGE_SIZE", "0")]] {
            assert!(matches!(
                StoreConfig::from_lookup(lookup(&vars)),
                Err(DocumentStoreError::Configuration(_))
            ));
        }
    }

    #[test]
    fn clamps_pagination() {
        let config = StoreConfig { max_page_size: 50, ..StoreConfig::default() };

        assert_eq!(config.clamp(&PaginationParams::new(0, 500)), PaginationParams::new(1, 50));
        assert_eq!(config.clamp(&PaginationParams::new(3, 0)), PaginationParams::new(3, 1));
    }

    #[test]
    fn listings_default_to_their_page_sizes() {
        let config = StoreConfig { image_page_size: 200, ..StoreConfig::default() };

        assert_eq!(config.blog_params(None), PaginationParams::new(1, 10));
        assert_eq!(config.image_params(None), PaginationParams::new(1, 100));
        assert_eq!(config.image_params(Some(&PaginationParams::new(2, 5))), PaginationParams::new(2, 5));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: StoreConfig = serde_json::from_str(r#"{ "images_collection": "gallery" }"#).unwrap();

        assert_eq!(config.images_collection, "gallery");
        assert_eq!(config.max_page_size, 100);
    }
}
