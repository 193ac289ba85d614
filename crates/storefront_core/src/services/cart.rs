//! The per-user cart aggregate.
//!
//! Lines reference catalog products by id; prices are never stored on the cart, so the
//! total always reflects the live catalog.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::domain::{Cart, CartLine, ProductRef, ResolvedCartLine, SelectedColor};
use crate::ports::{CartRepository, CatalogRepository, PortError, PortResult};
use crate::services::catalog::CatalogService;

/// Identifies one cart line from the client's point of view.
#[derive(Debug, Clone)]
pub struct LineKey {
    pub product: ProductRef,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    catalog_repo: Arc<dyn CatalogRepository>,
    catalog: CatalogService,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, catalog_repo: Arc<dyn CatalogRepository>) -> Self {
        Self {
            carts,
            catalog: CatalogService::new(catalog_repo.clone()),
            catalog_repo,
        }
    }

    /// Current cart with products resolved. Lines whose product disappeared are dropped
    /// and the cleaned cart is written back.
    pub async fn get(&self, user_id: Uuid) -> PortResult<Cart> {
        let lines = self.carts.load_cart_lines(user_id).await?;
        self.resolve(user_id, lines).await
    }

    pub async fn add(
        &self,
        user_id: Uuid,
        product: &ProductRef,
        quantity: Option<u32>,
        selected_size: Option<String>,
        selected_color: Option<SelectedColor>,
    ) -> PortResult<Cart> {
        let quantity = quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(PortError::Validation("quantity must be at least 1".to_string()));
        }
        let product = self.catalog.resolve(product).await?;

        let mut lines = self.carts.load_cart_lines(user_id).await?;
        add_line(
            &mut lines,
            CartLine {
                product_id: product.id,
                quantity,
                selected_size,
                selected_color,
            },
        );
        self.carts.save_cart_lines(user_id, &lines).await?;
        debug!(user_id = %user_id, product_id = %product.id, quantity, "Added to cart");
        self.resolve(user_id, lines).await
    }

    /// Sets the quantity of a line; zero or less removes it.
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        key: &LineKey,
        new_quantity: i64,
    ) -> PortResult<Cart> {
        let product = self.catalog.resolve(&key.product).await?;
        let mut lines = self.carts.load_cart_lines(user_id).await?;
        if set_line_quantity(
            &mut lines,
            product.id,
            key.selected_size.as_deref(),
            key.selected_color.as_deref(),
            new_quantity,
        ) {
            self.carts.save_cart_lines(user_id, &lines).await?;
        }
        self.resolve(user_id, lines).await
    }

    /// Removes a line. A line that is not in the cart is not an error.
    pub async fn remove(&self, user_id: Uuid, key: &LineKey) -> PortResult<Cart> {
        let product = self.catalog.resolve(&key.product).await?;
        let mut lines = self.carts.load_cart_lines(user_id).await?;
        if remove_line(
            &mut lines,
            product.id,
            key.selected_size.as_deref(),
            key.selected_color.as_deref(),
        ) {
            self.carts.save_cart_lines(user_id, &lines).await?;
        }
        self.resolve(user_id, lines).await
    }

    pub async fn clear(&self, user_id: Uuid) -> PortResult<Cart> {
        self.carts.save_cart_lines(user_id, &[]).await?;
        Ok(Cart::default())
    }

    async fn resolve(&self, user_id: Uuid, lines: Vec<CartLine>) -> PortResult<Cart> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products = self.catalog_repo.get_products_by_ids(&ids).await?;

        let before = lines.len();
        let mut kept = Vec::with_capacity(before);
        let mut resolved = Vec::with_capacity(before);
        for line in lines {
            if let Some(product) = products.iter().find(|p| p.id == line.product_id) {
                resolved.push(ResolvedCartLine {
                    product: product.clone(),
                    quantity: line.quantity,
                    selected_size: line.selected_size.clone(),
                    selected_color: line.selected_color.clone(),
                });
                kept.push(line);
            }
        }

        if kept.len() != before {
            debug!(user_id = %user_id, dropped = before - kept.len(), "Pruned dangling cart lines");
            self.carts.save_cart_lines(user_id, &kept).await?;
        }
        Ok(Cart { lines: resolved })
    }
}

//=========================================================================================
// Line algebra
//=========================================================================================

/// Merges `line` into `lines`: same identity increments, otherwise appends.
pub fn add_line(lines: &mut Vec<CartLine>, line: CartLine) {
    let existing = lines.iter_mut().find(|l| {
        l.matches(
            line.product_id,
            line.selected_size.as_deref(),
            line.color_name(),
        )
    });
    match existing {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
        None => lines.push(line),
    }
}

/// Returns whether anything changed.
pub fn set_line_quantity(
    lines: &mut Vec<CartLine>,
    product_id: Uuid,
    size: Option<&str>,
    color_name: Option<&str>,
    new_quantity: i64,
) -> bool {
    let Some(index) = lines
        .iter()
        .position(|l| l.matches(product_id, size, color_name))
    else {
        return false;
    };
    if new_quantity > 0 {
        lines[index].quantity = u32::try_from(new_quantity).unwrap_or(u32::MAX);
    } else {
        lines.remove(index);
    }
    true
}

/// Returns whether a line was removed.
pub fn remove_line(
    lines: &mut Vec<CartLine>,
    product_id: Uuid,
    size: Option<&str>,
    color_name: Option<&str>,
) -> bool {
    let before = lines.len();
    lines.retain(|l| !l.matches(product_id, size, color_name));
    lines.len() != before
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{Category, Product, ProductChanges};
    use crate::memory::InMemoryStore;

    fn line(product_id: Uuid, quantity: u32, size: Option<&str>, color: Option<&str>) -> CartLine {
        CartLine {
            product_id,
            quantity,
            selected_size: size.map(str::to_string),
            selected_color: color.map(|name| SelectedColor {
                name: name.to_string(),
                hex: None,
            }),
        }
    }

    async fn seeded() -> (CartService, Arc<InMemoryStore>, Product) {
        let store = Arc::new(InMemoryStore::new());
        let category = Category {
            id: Uuid::new_v4(),
            name: "Apparel".to_string(),
            slug: "apparel".to_string(),
        };
        store.insert_category(category.clone()).await.unwrap();
        let now = Utc::now();
        let product = store
            .insert_product(Product {
                id: Uuid::new_v4(),
                slug: "tee-001".to_string(),
                name: "Classic Tee".to_string(),
                description: String::new(),
                price: dec!(29),
                stock: 10,
                images: vec!["tee.jpg".to_string()],
                category_id: category.id,
                is_featured: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let service = CartService::new(store.clone(), store.clone());
        (service, store, product)
    }

    fn key(slug: &str, size: Option<&str>, color: Option<&str>) -> LineKey {
        LineKey {
            product: ProductRef::Slug(slug.to_string()),
            selected_size: size.map(str::to_string),
            selected_color: color.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn repeated_adds_merge_into_one_line() {
        let (carts, _, product) = seeded().await;
        let user = Uuid::new_v4();
        let red = || Some(SelectedColor { name: "Red".to_string(), hex: Some("#f00".to_string()) });

        carts
            .add(user, &ProductRef::Id(product.id), Some(2), Some("M".to_string()), red())
            .await
            .unwrap();
        let cart = carts
            .add(
                user,
                &ProductRef::Slug("tee-001".to_string()),
                Some(3),
                Some("M".to_string()),
                red(),
            )
            .await
            .unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
        assert_eq!(cart.total(), dec!(145));
    }

    #[tokio::test]
    async fn different_variants_are_distinct_lines() {
        let (carts, _, product) = seeded().await;
        let user = Uuid::new_v4();
        let by_id = ProductRef::Id(product.id);

        carts.add(user, &by_id, None, Some("M".to_string()), None).await.unwrap();
        let cart = carts.add(user, &by_id, None, Some("L".to_string()), None).await.unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert!(cart.lines.iter().all(|l| l.quantity == 1));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (carts, _, _) = seeded().await;
        let result = carts
            .add(Uuid::new_v4(), &ProductRef::Slug("nope".to_string()), Some(1), None, None)
            .await;
        assert!(matches!(result, Err(PortError::NotFound(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn zero_quantity_update_removes_line() {
        let (carts, _, product) = seeded().await;
        let user = Uuid::new_v4();
        carts
            .add(user, &ProductRef::Id(product.id), Some(2), Some("M".to_string()), None)
            .await
            .unwrap();

        let cart = carts
            .update_quantity(user, &key("tee-001", Some("M"), None), 7)
            .await
            .unwrap();
        assert_eq!(cart.lines[0].quantity, 7);

        let cart = carts
            .update_quantity(user, &key("tee-001", Some("M"), None), 0)
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn removing_absent_line_is_a_no_op() {
        let (carts, _, product) = seeded().await;
        let user = Uuid::new_v4();
        carts
            .add(user, &ProductRef::Id(product.id), Some(1), Some("M".to_string()), None)
            .await
            .unwrap();

        let cart = carts.remove(user, &key("tee-001", Some("XL"), None)).await.unwrap();
        assert_eq!(cart.lines.len(), 1);

        let cart = carts.remove(user, &key("tee-001", Some("M"), None)).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn total_tracks_live_price_and_dangling_lines_are_pruned() {
        let (carts, store, product) = seeded().await;
        let user = Uuid::new_v4();
        carts
            .add(user, &ProductRef::Id(product.id), Some(2), None, None)
            .await
            .unwrap();

        store
            .update_product(
                product.id,
                ProductChanges {
                    price: Some(dec!(31)),
                    ..ProductChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(carts.get(user).await.unwrap().total(), dec!(62));

        store.delete_product(product.id).await.unwrap();
        assert!(carts.get(user).await.unwrap().is_empty());
        assert!(store.load_cart_lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_empties_the_cart() {
        let (carts, _, product) = seeded().await;
        let user = Uuid::new_v4();
        carts
            .add(user, &ProductRef::Id(product.id), Some(2), None, None)
            .await
            .unwrap();
        assert!(carts.clear(user).await.unwrap().is_empty());
        assert!(carts.get(user).await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn adds_with_same_identity_sum(quantities in proptest::collection::vec(1u32..50, 1..10)) {
            let product_id = Uuid::new_v4();
            let mut lines = Vec::new();
            for q in &quantities {
                add_line(&mut lines, line(product_id, *q, Some("M"), Some("Red")));
            }
            prop_assert_eq!(lines.len(), 1);
            prop_assert_eq!(lines[0].quantity, quantities.iter().sum::<u32>());
        }

        #[test]
        fn updates_never_leave_non_positive_lines(
            start in 1u32..100,
            updates in proptest::collection::vec(-20i64..20, 1..10),
        ) {
            let product_id = Uuid::new_v4();
            let mut lines = vec![line(product_id, start, None, None)];
            for update in updates {
                set_line_quantity(&mut lines, product_id, None, None, update);
                prop_assert!(lines.iter().all(|l| l.quantity > 0));
                if update <= 0 {
                    prop_assert!(lines.is_empty());
                }
            }
        }
    }
}
