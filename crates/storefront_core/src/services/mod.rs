//! Application services. Each one owns a slice of the storefront's rules and talks to
//! storage and external capabilities only through the traits in [`crate::ports`].

pub mod address_book;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payment_methods;
pub mod wishlist;

#[cfg(test)]
pub(crate) mod test_support;

pub use address_book::AddressBook;
pub use cart::{CartService, LineKey};
pub use catalog::CatalogService;
pub use checkout::{
    CheckoutEngine, CheckoutSettings, OrderLineRequest, PaymentOutcome, PlaceOrder, Quote,
};
pub use orders::{OrderService, OrderSettings, StatusPolicy};
pub use payment_methods::PaymentMethodBook;
pub use wishlist::WishlistService;
