use rust_decimal::Decimal;
use serde::Deserialize;

/// SQL query builder for the book catalog listing
/// Builds a single parameterized query with filters, sorting, and pagination
pub struct BookQueryBuilder {
    base_query: String,
    where_clauses: Vec<String>,
    params: Vec<String>,
    order_clause: Option<String>,
    limit: u32,
    offset: u32,
}

impl BookQueryBuilder {
    /// Creates a new BookQueryBuilder with default values
    pub fn new() -> Self {
        Self {
            base_query: "SELECT id, title, description, isbn13, publication_year, language, \
                         cover_url, price, stock_quantity, rating FROM books"
                .to_string(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            order_clause: None,
            limit: 10,
            offset: 0,
        }
    }

    /// Adds a search filter for partial title matching (case-insensitive)
    pub fn add_search_filter(&mut self, search: &str) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("title ILIKE ${}", param_index));
        self.params.push(format!("%{}%", search));
    }

    /// Adds a language filter (case-insensitive exact match)
    pub fn add_language_filter(&mut self, language: &str) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("language ILIKE ${}", param_index));
        self.params.push(language.to_string());
    }

    /// Adds price range filters (inclusive bounds)
    /// Parameters are bound as text and cast to numeric in the query
    pub fn add_price_range(&mut self, min: Option<Decimal>, max: Option<Decimal>) {
        if let Some(min_price) = min {
            let param_index = self.params.len() + 1;
            self.where_clauses
                .push(format!("price >= ${}::numeric", param_index));
            self.params.push(min_price.to_string());
        }

        if let Some(max_price) = max {
            let param_index = self.params.len() + 1;
            self.where_clauses
                .push(format!("price <= ${}::numeric", param_index));
            self.params.push(max_price.to_string());
        }
    }

    /// Sets the sort order for the query
    pub fn set_sort(&mut self, field: SortField, order: SortOrder) {
        let field_name = match field {
            SortField::Price => "price",
            SortField::Rating => "rating",
            SortField::Title => "title",
        };

        let order_str = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        self.order_clause = Some(format!("{} {}", field_name, order_str));
    }

    /// Sets pagination parameters from a 1-indexed page number
    pub fn set_pagination(&mut self, page: u32, limit: u32) {
        self.limit = limit;
        self.offset = (page - 1) * limit;
    }

    /// Builds the final SQL query string with all parameters
    /// Returns a tuple of (query_string, parameters)
    pub fn build(&self) -> (String, Vec<String>) {
        let mut query = self.base_query.clone();

        if !self.where_clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.where_clauses.join(" AND "));
        }

        if let Some(ref order) = self.order_clause {
            query.push_str(" ORDER BY ");
            query.push_str(order);
        }

        // LIMIT and OFFSET go into the query string directly;
        // PostgreSQL requires integers there, not text parameters
        query.push_str(&format!(" LIMIT {}", self.limit));
        query.push_str(&format!(" OFFSET {}", self.offset));

        (query, self.params.clone())
    }
}

impl Default for BookQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Query parameters extracted from the HTTP request
/// All fields are optional to support flexible querying
#[derive(Debug, Deserialize)]
pub struct BookQueryParams {
    /// Search term for partial title matching (case-insensitive)
    pub search: Option<String>,
    /// Filter by language (case-insensitive exact match)
    pub language: Option<String>,
    /// Minimum price filter (inclusive)
    pub min_price: Option<Decimal>,
    /// Maximum price filter (inclusive)
    pub max_price: Option<Decimal>,
    /// Sort field: "price", "rating" or "title"
    pub sort: Option<String>,
    /// Sort order: "asc" or "desc"
    pub order: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<u32>,
    /// Items per page (defaults to 10)
    pub limit: Option<u32>,
}

/// Sort field options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Rating,
    Title,
}

/// Sort order options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Validated and normalized query parameters
#[derive(Debug)]
pub struct ValidatedBookQuery {
    pub search: Option<String>,
    pub language: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_field: Option<SortField>,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

/// Validation error type for catalog query parameters
#[derive(Debug)]
pub struct QueryValidationError {
    pub message: String,
}

impl std::fmt::Display for QueryValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for QueryValidationError {}

/// Query parameter validator
pub struct BookQueryValidator;

impl BookQueryValidator {
    /// Validates and normalizes query parameters
    pub fn validate(params: BookQueryParams) -> Result<ValidatedBookQuery, QueryValidationError> {
        let search = Self::normalize_string(params.search);
        let language = Self::normalize_string(params.language);

        let min_price = match params.min_price {
            Some(price) => {
                Self::validate_price(price, "min_price")?;
                Some(price)
            }
            None => None,
        };

        let max_price = match params.max_price {
            Some(price) => {
                Self::validate_price(price, "max_price")?;
                Some(price)
            }
            None => None,
        };

        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err(QueryValidationError {
                    message: "min_price cannot be greater than max_price".to_string(),
                });
            }
        }

        let sort_field = match params.sort {
            Some(ref sort_str) => Some(Self::parse_sort_field(sort_str)?),
            None => None,
        };

        // Default order depends on the sort field: cheap first, best first
        let sort_order = match params.order {
            Some(ref order_str) => Self::parse_sort_order(order_str)?,
            None => match sort_field {
                Some(SortField::Rating) => SortOrder::Desc,
                _ => SortOrder::Asc,
            },
        };

        let page = match params.page {
            Some(p) => {
                Self::validate_pagination_param(p, "page")?;
                p
            }
            None => 1,
        };

        let limit = match params.limit {
            Some(l) => {
                Self::validate_pagination_param(l, "limit")?;
                l
            }
            None => 10,
        };

        Ok(ValidatedBookQuery {
            search,
            language,
            min_price,
            max_price,
            sort_field,
            sort_order,
            page,
            limit,
        })
    }

    /// Normalizes string parameters by trimming whitespace
    /// Returns None if the string is empty or whitespace-only
    fn normalize_string(s: Option<String>) -> Option<String> {
        s.and_then(|s| {
            let trimmed = s.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
    }

    /// Validates that a price bound is positive
    fn validate_price(price: Decimal, param_name: &str) -> Result<(), QueryValidationError> {
        if price <= Decimal::ZERO {
            return Err(QueryValidationError {
                message: format!("{} must be a positive number", param_name),
            });
        }
        Ok(())
    }

    /// Parses sort field string to SortField enum
    fn parse_sort_field(s: &str) -> Result<SortField, QueryValidationError> {
        match s.to_lowercase().as_str() {
            "price" => Ok(SortField::Price),
            "rating" => Ok(SortField::Rating),
            "title" => Ok(SortField::Title),
            _ => Err(QueryValidationError {
                message: format!(
                    "Invalid sort field '{}'. Must be 'price', 'rating' or 'title'",
                    s
                ),
            }),
        }
    }

    /// Parses sort order string to SortOrder enum
    fn parse_sort_order(s: &str) -> Result<SortOrder, QueryValidationError> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(QueryValidationError {
                message: format!("Invalid sort order '{}'. Must be 'asc' or 'desc'", s),
            }),
        }
    }

    /// Validates pagination parameters (page and limit must be positive)
    fn validate_pagination_param(value: u32, param_name: &str) -> Result<(), QueryValidationError> {
        if value == 0 {
            return Err(QueryValidationError {
                message: format!("{} must be a positive number (greater than 0)", param_name),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn empty_params() -> BookQueryParams {
        BookQueryParams {
            search: None,
            language: None,
            min_price: None,
            max_price: None,
            sort: None,
            order: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn test_builder_basic_query() {
        let builder = BookQueryBuilder::new();
        let (query, params) = builder.build();

        assert!(query.starts_with("SELECT id, title"));
        assert!(query.contains("FROM books"));
        assert!(query.contains("LIMIT 10"));
        assert!(query.contains("OFFSET 0"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_builder_with_search() {
        let mut builder = BookQueryBuilder::new();
        builder.add_search_filter("margarita");
        let (query, params) = builder.build();

        assert!(query.contains("WHERE"));
        assert!(query.contains("title ILIKE $1"));
        assert_eq!(params[0], "%margarita%");
    }

    #[test]
    fn test_builder_with_price_range_casts_to_numeric() {
        let mut builder = BookQueryBuilder::new();
        builder.add_price_range(Some(dec!(100)), Some(dec!(500)));
        let (query, params) = builder.build();

        assert!(query.contains("price >= $1::numeric"));
        assert!(query.contains("price <= $2::numeric"));
        assert_eq!(params[0], "100");
        assert_eq!(params[1], "500");
    }

    #[test]
    fn test_builder_combined_filters_number_params_in_order() {
        let mut builder = BookQueryBuilder::new();
        builder.add_search_filter("pen");
        builder.add_language_filter("English");
        builder.add_price_range(Some(dec!(50)), None);
        builder.set_sort(SortField::Rating, SortOrder::Desc);
        builder.set_pagination(2, 20);

        let (query, params) = builder.build();

        assert!(query.contains("title ILIKE $1"));
        assert!(query.contains("language ILIKE $2"));
        assert!(query.contains("price >= $3::numeric"));
        assert!(query.contains("ORDER BY rating DESC"));
        assert!(query.contains("LIMIT 20"));
        assert!(query.contains("OFFSET 20"));
        assert_eq!(params, vec!["%pen%", "English", "50"]);
    }

    #[test]
    fn test_validator_defaults() {
        let validated = BookQueryValidator::validate(empty_params()).unwrap();
        assert_eq!(validated.page, 1);
        assert_eq!(validated.limit, 10);
        assert_eq!(validated.sort_order, SortOrder::Asc);
        assert!(validated.sort_field.is_none());
    }

    #[test]
    fn test_validator_rating_defaults_to_desc() {
        let mut params = empty_params();
        params.sort = Some("rating".to_string());
        let validated = BookQueryValidator::validate(params).unwrap();
        assert_eq!(validated.sort_field, Some(SortField::Rating));
        assert_eq!(validated.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_validator_rejects_inverted_price_range() {
        let mut params = empty_params();
        params.min_price = Some(dec!(500));
        params.max_price = Some(dec!(100));
        assert!(BookQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_validator_rejects_non_positive_prices() {
        let mut params = empty_params();
        params.min_price = Some(dec!(0));
        assert!(BookQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_validator_rejects_zero_pagination() {
        let mut params = empty_params();
        params.page = Some(0);
        assert!(BookQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_validator_normalizes_whitespace_search() {
        let mut params = empty_params();
        params.search = Some("   ".to_string());
        let validated = BookQueryValidator::validate(params).unwrap();
        assert!(validated.search.is_none());
    }

    #[test]
    fn test_validator_rejects_unknown_sort() {
        let mut params = empty_params();
        params.sort = Some("isbn".to_string());
        assert!(BookQueryValidator::validate(params).is_err());
    }
}
