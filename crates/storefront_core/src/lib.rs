pub mod domain;
pub mod gateway;
pub mod memory;
pub mod ports;
pub mod services;
pub mod validation;

pub use domain::{
    AuthUser, Order, OrderStatus, PaymentStatus, Product, ProductRef, Role, User, UserCredentials,
};
pub use gateway::{select_gateway, SimulatedGateway};
pub use memory::InMemoryStore;
pub use ports::{
    AddressRepository, CartRepository, CatalogRepository, OrderNotifier, OrderRepository,
    PaymentGateway, PaymentMethodRepository, PortError, PortResult, UserRepository,
    WishlistRepository,
};
