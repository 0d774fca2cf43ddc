use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Represents a book in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "The Master and Margarita")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "9780141180144")]
    pub isbn13: String,
    #[schema(example = 1967)]
    pub publication_year: Option<i32>,
    #[schema(example = "English")]
    pub language: String,
    pub cover_url: Option<String>,
    pub price: Decimal,
    #[schema(example = 12)]
    pub stock_quantity: i32,
    /// Average review rating from 0.00 to 5.00
    pub rating: Decimal,
}

/// Represents a stationery item in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Stationery {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Gel pen, black")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "Pens")]
    pub category: Option<String>,
    pub price: Decimal,
    #[schema(example = 240)]
    pub stock_quantity: i32,
}

/// Discriminates the two product families the storefront sells
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Book,
    Stationery,
}

impl ProductType {
    /// Convert product type to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Book => "book",
            ProductType::Stationery => "stationery",
        }
    }

    /// Parse product type from string
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "book" => Ok(ProductType::Book),
            "stationery" => Ok(ProductType::Stationery),
            _ => Err(format!("Unknown product type: {}", s)),
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of a product used to build cart lines and
/// order item snapshots. Prices captured here never track later
/// catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_type: ProductType,
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
}

impl From<&Book> for ProductSnapshot {
    fn from(book: &Book) -> Self {
        Self {
            product_type: ProductType::Book,
            product_id: book.id,
            name: book.title.clone(),
            unit_price: book.price,
            image_url: book.cover_url.clone(),
        }
    }
}

impl From<&Stationery> for ProductSnapshot {
    fn from(item: &Stationery) -> Self {
        Self {
            product_type: ProductType::Stationery,
            product_id: item.id,
            name: item.name.clone(),
            unit_price: item.price,
            image_url: None,
        }
    }
}
