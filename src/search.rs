use crate::platform::Platform;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Text some models emit in place of a missing product image.
pub const NO_IMAGE_SENTINEL: &str = "No Image URL Available";

/// One discovered product. `url` is the identity key everywhere downstream.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub title: String,
    pub url: String,
    pub rating: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
}

impl Hit {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            rating: None,
            price: None,
            image_url: None,
        }
    }

    pub fn with_rating(mut self, rating: impl Into<String>) -> Self {
        self.rating = Some(rating.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

impl std::fmt::Display for Hit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title, self.url)?;
        if let Some(price) = &self.price {
            write!(f, " {}", price)?;
        }
        if let Some(rating) = &self.rating {
            write!(f, " rated {}", rating)?;
        }
        Ok(())
    }
}

/// The hits one platform contributed to a search.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct PlatformResult {
    pub platform: Platform,
    pub hits: Vec<Hit>,
}

impl PlatformResult {
    pub fn new(platform: Platform, hits: Vec<Hit>) -> Self {
        Self { platform, hits }
    }
}

/// Answer shape for a single agent run covering several platforms at once.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct CombinedSearchResponse {
    pub platforms: Vec<PlatformResult>,
}
