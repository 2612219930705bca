//! Catalog: categories, products and product images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use tasfiya_core::{
    CategoryId, LocalizedText, Money, ProductId, ProductImageId, ProductStatus,
};

/// Maximum length of a product title in either language.
const MAX_TITLE_LENGTH: usize = 200;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: LocalizedText,
    pub slug: String,
    pub display_order: i32,
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: LocalizedText,
    pub slug: String,
    #[serde(default)]
    pub display_order: i32,
}

impl CategoryInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns a message when a name is missing or the slug is malformed.
    pub fn normalized(self) -> Result<Self, String> {
        let name = self.name.trimmed();
        if !name.is_complete() {
            return Err("category name is required in English and Arabic".to_owned());
        }
        let slug = self.slug.trim().to_ascii_lowercase();
        let slug_ok = !slug.is_empty()
            && slug.len() <= 100
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !slug_ok {
            return Err("slug must be lower-case letters, digits and dashes".to_owned());
        }
        Ok(Self {
            name,
            slug,
            display_order: self.display_order,
        })
    }
}

/// A product listed on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    pub status: ProductStatus,
    /// URL of the main image, kept in sync by the image operations.
    pub image_url: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a product.
///
/// `image_url` is only honored on create, where it becomes the first (main)
/// gallery image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    #[serde(default)]
    pub status: ProductStatus,
    pub display_order: Option<i32>,
    pub image_url: Option<String>,
}

impl ProductInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn normalized(self) -> Result<Self, String> {
        let title = self.title.trimmed();
        if !title.is_complete() {
            return Err("title is required in English and Arabic".to_owned());
        }
        if title.en.chars().count() > MAX_TITLE_LENGTH || title.ar.chars().count() > MAX_TITLE_LENGTH
        {
            return Err(format!("title must be at most {MAX_TITLE_LENGTH} characters"));
        }
        if self.price.is_negative() {
            return Err("price cannot be negative".to_owned());
        }
        let image_url = self
            .image_url
            .map(|u| validate_image_url(&u))
            .transpose()?;
        Ok(Self {
            title,
            description: self.description.trimmed(),
            image_url,
            ..self
        })
    }
}

/// A product together with its gallery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ProductImage>,
}

/// A gallery image. At most one image per product has `is_main` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub url: String,
    pub alt: LocalizedText,
    pub is_main: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Payload for adding an image to a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductImage {
    pub url: String,
    #[serde(default)]
    pub alt: LocalizedText,
    #[serde(default)]
    pub is_main: bool,
    pub sort_order: Option<i32>,
}

impl NewProductImage {
    /// # Errors
    ///
    /// Returns a message when the URL is not acceptable.
    pub fn normalized(self) -> Result<Self, String> {
        Ok(Self {
            url: validate_image_url(&self.url)?,
            alt: self.alt.trimmed(),
            ..self
        })
    }
}

/// Storefront listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(rename = "category")]
    pub category_id: Option<CategoryId>,
    pub status: Option<ProductStatus>,
    #[serde(rename = "q")]
    pub search: Option<String>,
}

impl ProductFilter {
    /// Whether `product` passes every filter that is set.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if self.category_id.is_some() && product.category_id != self.category_id {
            return false;
        }
        if self.status.is_some_and(|s| s != product.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => product.title.matches(q),
            _ => true,
        }
    }
}

/// Accept absolute http(s) URLs or site-relative paths.
fn validate_image_url(raw: &str) -> Result<String, String> {
    let url = raw.trim();
    if url.starts_with('/') && !url.starts_with("//") {
        return Ok(url.to_owned());
    }
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url.to_owned()),
        _ => Err(format!("invalid image URL: {url}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(title: &str, status: ProductStatus, category: Option<i32>) -> Product {
        Product {
            id: ProductId::new(1),
            title: LocalizedText::new(title, "منتج"),
            description: LocalizedText::default(),
            category_id: category.map(CategoryId::new),
            price: Money::new(1000),
            status,
            image_url: None,
            display_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_image_url_validation() {
        assert!(validate_image_url("https://cdn.example.com/a.jpg").is_ok());
        assert!(validate_image_url("/uploads/a.jpg").is_ok());
        assert!(validate_image_url("//evil.example/a.jpg").is_err());
        assert!(validate_image_url("javascript:alert(1)").is_err());
        assert!(validate_image_url("not a url").is_err());
    }

    #[test]
    fn test_product_input_requires_both_titles() {
        let input = ProductInput {
            title: LocalizedText::new("Blender", "  "),
            description: LocalizedText::default(),
            category_id: None,
            price: Money::new(100),
            status: ProductStatus::Available,
            display_order: None,
            image_url: None,
        };
        assert!(input.normalized().is_err());
    }

    #[test]
    fn test_product_input_rejects_negative_price() {
        let input = ProductInput {
            title: LocalizedText::new("Blender", "خلاط"),
            description: LocalizedText::default(),
            category_id: None,
            price: Money::new(-1),
            status: ProductStatus::Available,
            display_order: None,
            image_url: None,
        };
        assert_eq!(
            input.normalized().unwrap_err(),
            "price cannot be negative"
        );
    }

    #[test]
    fn test_category_slug_normalized() {
        let input = CategoryInput {
            name: LocalizedText::new("Electronics", "إلكترونيات"),
            slug: " Electronics ".to_owned(),
            display_order: 0,
        };
        assert_eq!(input.normalized().unwrap().slug, "electronics");

        let bad = CategoryInput {
            name: LocalizedText::new("Electronics", "إلكترونيات"),
            slug: "elec tronics".to_owned(),
            display_order: 0,
        };
        assert!(bad.normalized().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let p = product("Office Chair", ProductStatus::Limited, Some(3));
        assert!(ProductFilter::default().matches(&p));
        assert!(ProductFilter {
            category_id: Some(CategoryId::new(3)),
            status: Some(ProductStatus::Limited),
            search: Some("chair".to_owned()),
        }
        .matches(&p));
        assert!(!ProductFilter {
            category_id: Some(CategoryId::new(4)),
            ..ProductFilter::default()
        }
        .matches(&p));
        assert!(!ProductFilter {
            status: Some(ProductStatus::SoldOut),
            ..ProductFilter::default()
        }
        .matches(&p));
    }
}
