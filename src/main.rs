mod audit;
mod auth;
mod cart;
mod db;
mod error;
mod loyalty;
mod models;
mod orders;
mod query;
mod validation;
mod wishlist;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use audit::models::{AuditAction, NewAuditEntry, RequestMeta};
use audit::recorder::{AuditPolicy, AuditSink, PgAuditRecorder};
use auth::repository::{TokenRepository, UserRepository};
use auth::service::AuthService;
use auth::token::TokenService;
use cart::repository::ProductRepository;
use cart::service::CartService;
use cart::store::CartStore;
use error::ApiError;
use loyalty::repository::LoyaltyRepository;
use loyalty::service::LoyaltyService;
use models::{Book, ProductType, Stationery};
use orders::repository::{
    DeliveryOptionsRepository, OrderItemsRepository, OrdersRepository, PaymentCardsRepository,
    PickupPointsRepository, SavedAddressesRepository,
};
use orders::service::OrderService;
use query::{BookQueryBuilder, BookQueryParams, BookQueryValidator};
use wishlist::WishlistRepository;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        get_books,
        get_book_by_id,
        get_stationery_items,
        get_stationery_by_id,
    ),
    components(
        schemas(Book, Stationery, ProductType)
    ),
    tags(
        (name = "catalog", description = "Book and stationery catalog endpoints")
    ),
    info(
        title = "Bookshop API",
        version = "1.0.0",
        description = "RESTful API for an online book and stationery storefront"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub products: ProductRepository,
    pub cart: CartService,
    pub loyalty: LoyaltyService,
    pub orders: OrderService,
    pub auth: AuthService,
    pub users: UserRepository,
    pub audit: Arc<PgAuditRecorder>,
    pub delivery_options: DeliveryOptionsRepository,
    pub pickup_points: PickupPointsRepository,
    pub wishlist: WishlistRepository,
}

/// Handler for GET /api/books
/// Lists books with search, filtering, sorting, and pagination
#[utoipa::path(
    get,
    path = "/api/books",
    responses(
        (status = 200, description = "List of books", body = Vec<Book>),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    ),
    tag = "catalog"
)]
async fn get_books(
    Query(params): Query<BookQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Book>>, ApiError> {
    tracing::debug!("Fetching books with query parameters: {:?}", params);

    let validated =
        BookQueryValidator::validate(params).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut builder = BookQueryBuilder::new();
    if let Some(ref search) = validated.search {
        builder.add_search_filter(search);
    }
    if let Some(ref language) = validated.language {
        builder.add_language_filter(language);
    }
    builder.add_price_range(validated.min_price, validated.max_price);
    if let Some(sort_field) = validated.sort_field {
        builder.set_sort(sort_field, validated.sort_order);
    }
    builder.set_pagination(validated.page, validated.limit);

    let (query_str, params) = builder.build();

    let mut query = sqlx::query_as::<_, Book>(&query_str);
    for param in params {
        query = query.bind(param);
    }

    let books = query.fetch_all(&state.db).await?;

    tracing::debug!("Query returned {} books", books.len());
    Ok(Json(books))
}

/// Handler for GET /api/books/:id
/// Retrieves a specific book; views are logged to the audit trail
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book found", body = Book),
        (status = 404, description = "Book not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "catalog"
)]
async fn get_book_by_id(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(id): Path<i32>,
) -> Result<Json<Book>, ApiError> {
    tracing::debug!("Fetching book with id: {}", id);

    let book = sqlx::query_as::<_, Book>(
        "SELECT id, title, description, isbn13, publication_year, language, cover_url, \
         price, stock_quantity, rating FROM books WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound {
        resource: "Book".to_string(),
        id: id.to_string(),
    })?;

    state
        .audit
        .record(
            NewAuditEntry::new(AuditAction::View)
                .subject("Book", book.id, &book.title)
                .describe(format!("Viewed book: {}", book.title))
                .with_meta(&meta),
        )
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(book))
}

/// Handler for GET /api/stationery
/// Lists all stationery items
#[utoipa::path(
    get,
    path = "/api/stationery",
    responses(
        (status = 200, description = "List of stationery items", body = Vec<Stationery>),
        (status = 500, description = "Internal server error")
    ),
    tag = "catalog"
)]
async fn get_stationery_items(
    State(state): State<AppState>,
) -> Result<Json<Vec<Stationery>>, ApiError> {
    let items = sqlx::query_as::<_, Stationery>(
        "SELECT id, name, description, category, price, stock_quantity \
         FROM stationery ORDER BY id",
    )
    .fetch_all(&state.db)
    .await?;

    tracing::debug!("Retrieved {} stationery items", items.len());
    Ok(Json(items))
}

/// Handler for GET /api/stationery/:id
#[utoipa::path(
    get,
    path = "/api/stationery/{id}",
    params(
        ("id" = i32, Path, description = "Stationery item ID")
    ),
    responses(
        (status = 200, description = "Stationery item found", body = Stationery),
        (status = 404, description = "Stationery item not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "catalog"
)]
async fn get_stationery_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Stationery>, ApiError> {
    let item = sqlx::query_as::<_, Stationery>(
        "SELECT id, name, description, category, price, stock_quantity \
         FROM stationery WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound {
        resource: "Stationery".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(item))
}

/// Creates and configures the application router
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Catalog
        .route("/api/books", get(get_books))
        .route("/api/books/:id", get(get_book_by_id))
        .route("/api/stationery", get(get_stationery_items))
        .route("/api/stationery/:id", get(get_stationery_by_id))
        // Cart
        .route("/api/cart", get(cart::handlers::get_cart_handler))
        .route("/api/cart/items", post(cart::handlers::add_cart_item_handler))
        .route(
            "/api/cart/items/:key",
            patch(cart::handlers::update_cart_item_handler)
                .delete(cart::handlers::remove_cart_item_handler),
        )
        // Checkout and orders
        .route("/api/checkout", post(orders::handlers::checkout_handler))
        .route("/api/orders", get(orders::handlers::get_order_history_handler))
        .route(
            "/api/orders/:order_id",
            get(orders::handlers::get_order_by_id_handler),
        )
        .route(
            "/api/delivery-options",
            get(orders::handlers::list_delivery_options_handler),
        )
        .route(
            "/api/pickup-points",
            get(orders::handlers::list_pickup_points_handler),
        )
        // Accounts
        .route("/api/auth/register", post(auth::handlers::register_handler))
        .route("/api/auth/login", post(auth::handlers::login_handler))
        .route("/api/auth/refresh", post(auth::handlers::refresh_handler))
        .route("/api/auth/logout", post(auth::handlers::logout_handler))
        .route("/api/auth/me", get(auth::handlers::me_handler))
        .route("/api/auth/profile", put(auth::handlers::update_profile_handler))
        // Loyalty
        .route(
            "/api/loyalty/card",
            get(loyalty::handlers::get_loyalty_card_handler),
        )
        // Wishlist
        .route("/api/wishlist", get(wishlist::get_wishlist_handler))
        .route("/api/wishlist/toggle", post(wishlist::toggle_wishlist_handler))
        // Manager back office
        .route(
            "/api/manager/orders",
            get(orders::handlers::list_orders_handler),
        )
        .route(
            "/api/manager/orders/:order_id/status",
            patch(orders::handlers::update_order_status_handler),
        )
        // Admin back office
        .route("/api/admin/audit", get(audit::handlers::list_audit_handler))
        .route(
            "/api/admin/audit/:id",
            delete(audit::handlers::delete_audit_handler),
        )
        .route(
            "/api/admin/loyalty/:user_id/repair",
            post(loyalty::handlers::repair_loyalty_handler),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Bookshop API - Starting...");

    // Get configuration from environment variables
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Connect the cart session store
    let cart_store = CartStore::connect(&redis_url)
        .await
        .expect("Failed to connect to Redis");

    // Wire repositories and services
    let audit = Arc::new(PgAuditRecorder::new(db_pool.clone(), AuditPolicy::from_env()));
    let audit_sink: Arc<dyn AuditSink> = audit.clone();

    let users = UserRepository::new(db_pool.clone());
    let auth_service = AuthService::new(
        users.clone(),
        TokenRepository::new(db_pool.clone()),
        TokenService::new(jwt_secret),
        audit_sink.clone(),
    );

    let products = ProductRepository::new(db_pool.clone());
    let cart_service = CartService::new(cart_store, products.clone());

    let loyalty_service = LoyaltyService::new(
        LoyaltyRepository::new(db_pool.clone()),
        audit_sink.clone(),
    );

    let delivery_options = DeliveryOptionsRepository::new(db_pool.clone());
    let pickup_points = PickupPointsRepository::new(db_pool.clone());
    let order_service = OrderService::new(
        db_pool.clone(),
        OrdersRepository::new(db_pool.clone()),
        OrderItemsRepository::new(db_pool.clone()),
        delivery_options.clone(),
        pickup_points.clone(),
        SavedAddressesRepository::new(db_pool.clone()),
        PaymentCardsRepository::new(db_pool.clone()),
        loyalty_service.clone(),
        cart_service.clone(),
        audit_sink,
    );

    let state = AppState {
        db: db_pool.clone(),
        products,
        cart: cart_service,
        loyalty: loyalty_service,
        orders: order_service,
        auth: auth_service,
        users,
        audit,
        delivery_options,
        pickup_points,
        wishlist: WishlistRepository::new(db_pool),
    };

    // Create the application router
    let app = create_router(state);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Bookshop API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
