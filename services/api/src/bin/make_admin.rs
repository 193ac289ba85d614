//! services/api/src/bin/make_admin.rs
//!
//! Promotes an existing account to the admin role. Usage: `make_admin <email>`.

use api_lib::{adapters::DbAdapter, config::Config, error::ApiError};
use sqlx::postgres::PgPoolOptions;
use storefront_core::domain::Role;
use storefront_core::ports::UserRepository;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let email = std::env::args()
        .nth(1)
        .ok_or_else(|| ApiError::BadRequest("usage: make_admin <email>".to_string()))?;

    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| ApiError::Internal("DATABASE_URL is required".to_string()))?;
    let db_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;
    let db_adapter = DbAdapter::new(db_pool);
    db_adapter.run_migrations().await?;

    let user = db_adapter
        .set_role(&email.trim().to_lowercase(), Role::Admin)
        .await?;
    println!("{} <{}> is now an admin", user.name, user.email);
    Ok(())
}
