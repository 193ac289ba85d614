//! Catalog reads for shoppers and the admin-side product/category upkeep.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    slugify, Category, NewProduct, Product, ProductChanges, ProductPatch, ProductRef,
};
use crate::ports::{CatalogRepository, PortError, PortResult};
use crate::validation;

#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> PortResult<Vec<Product>> {
        self.repo.list_products().await
    }

    pub async fn featured(&self) -> PortResult<Vec<Product>> {
        self.repo.list_featured_products().await
    }

    pub async fn by_slug(&self, slug: &str) -> PortResult<Product> {
        self.repo.get_product_by_slug(slug).await
    }

    /// Resolves an id-or-slug reference to a live product.
    pub async fn resolve(&self, product: &ProductRef) -> PortResult<Product> {
        let found = match product {
            ProductRef::Id(id) => self.repo.get_product(*id).await,
            ProductRef::Slug(slug) => self.repo.get_product_by_slug(slug).await,
        };
        found.map_err(|e| match e {
            PortError::NotFound(_) => PortError::NotFound(format!("Product {} not found", product)),
            other => other,
        })
    }

    pub async fn create_product(&self, input: NewProduct) -> PortResult<Product> {
        let name = validation::required("name", &input.name)?;
        check_price(input.price)?;
        let images = check_images(input.images)?;
        self.repo.get_category(input.category_id).await?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            slug: slug_for(&name)?,
            name,
            description: input.description.trim().to_string(),
            price: input.price,
            stock: input.stock,
            images,
            category_id: input.category_id,
            is_featured: input.is_featured,
            created_at: now,
            updated_at: now,
        };
        let product = self.repo.insert_product(product).await?;
        info!(product_id = %product.id, slug = %product.slug, "Product created");
        Ok(product)
    }

    /// Applies only the fields present in `patch`; stock is untouched unless given.
    pub async fn update_product(
        &self,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> PortResult<Product> {
        let mut changes = ProductChanges {
            description: patch.description.map(|d| d.trim().to_string()),
            stock: patch.stock,
            is_featured: patch.is_featured,
            ..ProductChanges::default()
        };
        if let Some(name) = patch.name {
            let name = validation::required("name", &name)?;
            changes.slug = Some(slug_for(&name)?);
            changes.name = Some(name);
        }
        if let Some(price) = patch.price {
            check_price(price)?;
            changes.price = Some(price);
        }
        if let Some(images) = patch.images {
            changes.images = Some(check_images(images)?);
        }
        if let Some(category_id) = patch.category_id {
            self.repo.get_category(category_id).await?;
            changes.category_id = Some(category_id);
        }

        let product = self.repo.update_product(product_id, changes).await?;
        info!(product_id = %product.id, stock = product.stock, "Product updated");
        Ok(product)
    }

    /// Historical orders keep their snapshots; carts and wishlists prune on next read.
    pub async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
        self.repo.delete_product(product_id).await?;
        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    pub async fn categories(&self) -> PortResult<Vec<Category>> {
        self.repo.list_categories().await
    }

    pub async fn create_category(&self, name: &str) -> PortResult<Category> {
        let name = validation::required("name", name)?;
        let category = Category {
            id: Uuid::new_v4(),
            slug: slug_for(&name)?,
            name,
        };
        self.repo.insert_category(category).await
    }
}

/// Names without a single ASCII letter or digit would leave the record unreachable by slug.
fn slug_for(name: &str) -> PortResult<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(PortError::Validation(format!(
            "name '{}' must contain at least one letter or digit",
            name
        )));
    }
    Ok(slug)
}

fn check_price(price: Decimal) -> PortResult<()> {
    if price <= Decimal::ZERO {
        return Err(PortError::Validation("price must be greater than zero".to_string()));
    }
    Ok(())
}

fn check_images(images: Vec<String>) -> PortResult<Vec<String>> {
    let images: Vec<String> = images
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if images.is_empty() {
        return Err(PortError::Validation("at least one image is required".to_string()));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::NewOrder;
    use crate::memory::InMemoryStore;
    use crate::ports::OrderRepository;
    use crate::services::test_support::{new_order, product, stock_of};

    async fn service_with_category() -> (CatalogService, Category) {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        let category = catalog.create_category("Apparel").await.unwrap();
        (catalog, category)
    }

    fn tee(category_id: Uuid) -> NewProduct {
        NewProduct {
            name: "Classic Tee".to_string(),
            description: "Heavyweight cotton".to_string(),
            price: dec!(29),
            stock: 10,
            images: vec!["https://cdn.example.com/tee.jpg".to_string()],
            category_id,
            is_featured: true,
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_resolves_both_ways() {
        let (catalog, category) = service_with_category().await;
        let product = catalog.create_product(tee(category.id)).await.unwrap();

        assert_eq!(product.slug, "classic-tee");
        let by_id = catalog.resolve(&ProductRef::Id(product.id)).await.unwrap();
        let by_slug = catalog
            .resolve(&ProductRef::Slug("classic-tee".to_string()))
            .await
            .unwrap();
        assert_eq!(by_id, by_slug);
        assert_eq!(catalog.featured().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let (catalog, category) = service_with_category().await;
        catalog.create_product(tee(category.id)).await.unwrap();

        let result = catalog.create_product(tee(category.id)).await;
        assert!(matches!(result, Err(PortError::Conflict(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn rename_rederives_slug() {
        let (catalog, category) = service_with_category().await;
        let product = catalog.create_product(tee(category.id)).await.unwrap();

        let updated = catalog
            .update_product(
                product.id,
                ProductPatch {
                    name: Some("Oversized Tee".to_string()),
                    ..ProductPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "oversized-tee");
        assert!(matches!(
            catalog.by_slug("classic-tee").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn names_without_a_slug_are_rejected() {
        let (catalog, category) = service_with_category().await;
        let mut punctuation = tee(category.id);
        punctuation.name = "!!!".to_string();
        assert!(matches!(
            catalog.create_product(punctuation).await,
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            catalog.create_category("***").await,
            Err(PortError::Validation(_))
        ));

        let product = catalog.create_product(tee(category.id)).await.unwrap();
        let renamed = catalog
            .update_product(
                product.id,
                ProductPatch {
                    name: Some("¡¿".to_string()),
                    ..ProductPatch::default()
                },
            )
            .await;
        assert!(matches!(renamed, Err(PortError::Validation(_))), "got {renamed:?}");
        assert_eq!(catalog.by_slug("classic-tee").await.unwrap().id, product.id);
    }

    /// Lets a checkout land after the admin's edit starts but before it is written.
    struct CheckoutMidEdit {
        store: Arc<InMemoryStore>,
        pending: Mutex<Option<NewOrder>>,
    }

    #[async_trait]
    impl CatalogRepository for CheckoutMidEdit {
        async fn list_products(&self) -> PortResult<Vec<Product>> {
            self.store.list_products().await
        }

        async fn list_featured_products(&self) -> PortResult<Vec<Product>> {
            self.store.list_featured_products().await
        }

        async fn get_product(&self, product_id: Uuid) -> PortResult<Product> {
            self.store.get_product(product_id).await
        }

        async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product> {
            self.store.get_product_by_slug(slug).await
        }

        async fn get_products_by_ids(&self, product_ids: &[Uuid]) -> PortResult<Vec<Product>> {
            self.store.get_products_by_ids(product_ids).await
        }

        async fn insert_product(&self, product: Product) -> PortResult<Product> {
            self.store.insert_product(product).await
        }

        async fn update_product(
            &self,
            product_id: Uuid,
            changes: ProductChanges,
        ) -> PortResult<Product> {
            let pending = self.pending.lock().unwrap().take();
            if let Some(order) = pending {
                self.store.commit_order(order).await?;
            }
            self.store.update_product(product_id, changes).await
        }

        async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
            self.store.delete_product(product_id).await
        }

        async fn list_categories(&self) -> PortResult<Vec<Category>> {
            self.store.list_categories().await
        }

        async fn get_category(&self, category_id: Uuid) -> PortResult<Category> {
            self.store.get_category(category_id).await
        }

        async fn insert_category(&self, category: Category) -> PortResult<Category> {
            self.store.insert_category(category).await
        }
    }

    #[tokio::test]
    async fn editing_a_product_keeps_stock_sold_meanwhile() {
        let store = Arc::new(InMemoryStore::new());
        let tee = product(&store, "tee-001", dec!(29), 5).await;
        let sale = new_order(&store, &tee, 5, None).await;
        let catalog = CatalogService::new(Arc::new(CheckoutMidEdit {
            store: store.clone(),
            pending: Mutex::new(Some(sale)),
        }));

        let updated = catalog
            .update_product(
                tee.id,
                ProductPatch {
                    description: Some("  Now in organic cotton ".to_string()),
                    ..ProductPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.description, "Now in organic cotton");
        assert_eq!(updated.stock, 0);
        assert_eq!(stock_of(&store, tee.id).await, 0);

        let restocked = catalog
            .update_product(
                tee.id,
                ProductPatch {
                    stock: Some(12),
                    ..ProductPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(restocked.stock, 12);
        assert_eq!(restocked.description, "Now in organic cotton");
    }

    #[tokio::test]
    async fn rejects_free_products_and_unknown_categories() {
        let (catalog, category) = service_with_category().await;
        let mut free = tee(category.id);
        free.price = Decimal::ZERO;
        assert!(matches!(
            catalog.create_product(free).await,
            Err(PortError::Validation(_))
        ));

        let orphan = tee(Uuid::new_v4());
        assert!(matches!(
            catalog.create_product(orphan).await,
            Err(PortError::NotFound(_))
        ));
    }
}
