use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Product, ProductRef};
use crate::ports::{CatalogRepository, PortResult, WishlistRepository};
use crate::services::catalog::CatalogService;

#[derive(Clone)]
pub struct WishlistService {
    wishlists: Arc<dyn WishlistRepository>,
    catalog_repo: Arc<dyn CatalogRepository>,
    catalog: CatalogService,
}

impl WishlistService {
    pub fn new(
        wishlists: Arc<dyn WishlistRepository>,
        catalog_repo: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            wishlists,
            catalog: CatalogService::new(catalog_repo.clone()),
            catalog_repo,
        }
    }

    /// Wishlisted products in the order they were added; deleted products are pruned.
    pub async fn get(&self, user_id: Uuid) -> PortResult<Vec<Product>> {
        let ids = self.wishlists.load_wishlist(user_id).await?;
        let found = self.catalog_repo.get_products_by_ids(&ids).await?;

        let products: Vec<Product> = ids
            .iter()
            .filter_map(|id| found.iter().find(|p| p.id == *id).cloned())
            .collect();
        if products.len() != ids.len() {
            let kept: Vec<Uuid> = products.iter().map(|p| p.id).collect();
            self.wishlists.save_wishlist(user_id, &kept).await?;
        }
        Ok(products)
    }

    /// Adds the product when absent, removes it when present.
    pub async fn toggle(&self, user_id: Uuid, product: &ProductRef) -> PortResult<Vec<Product>> {
        let product = self.catalog.resolve(product).await?;
        let mut ids = self.wishlists.load_wishlist(user_id).await?;
        match ids.iter().position(|id| *id == product.id) {
            Some(index) => {
                ids.remove(index);
            }
            None => ids.push(product.id),
        }
        self.wishlists.save_wishlist(user_id, &ids).await?;
        self.get(user_id).await
    }
}
