pub mod db;
pub mod notifier;
pub mod stripe;

pub use db::DbAdapter;
pub use notifier::LogNotifier;
pub use stripe::StripeGateway;
