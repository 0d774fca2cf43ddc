// Product lookup feeding the cart: (type, id) -> snapshot or NotFound

use sqlx::PgPool;

use crate::cart::error::CartError;
use crate::models::{Book, ProductSnapshot, ProductType, Stationery};

/// Repository resolving products across both catalog tables
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new ProductRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a book by ID
    pub async fn find_book(&self, id: i32) -> Result<Option<Book>, CartError> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT id, title, description, isbn13, publication_year, language, cover_url, \
             price, stock_quantity, rating FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Find a stationery item by ID
    pub async fn find_stationery(&self, id: i32) -> Result<Option<Stationery>, CartError> {
        let item = sqlx::query_as::<_, Stationery>(
            "SELECT id, name, description, category, price, stock_quantity \
             FROM stationery WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Resolve a product reference into a point-in-time snapshot
    pub async fn find_snapshot(
        &self,
        product_type: ProductType,
        product_id: i32,
    ) -> Result<ProductSnapshot, CartError> {
        let snapshot = match product_type {
            ProductType::Book => self
                .find_book(product_id)
                .await?
                .map(|book| ProductSnapshot::from(&book)),
            ProductType::Stationery => self
                .find_stationery(product_id)
                .await?
                .map(|item| ProductSnapshot::from(&item)),
        };

        snapshot.ok_or(CartError::ProductNotFound {
            product_type,
            product_id,
        })
    }
}
