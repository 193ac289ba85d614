//! Stored payment instruments. Deletion is hard: orders only keep a method label.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{PaymentInstrument, PaymentMethod};
use crate::ports::{PaymentMethodRepository, PortError, PortResult};
use crate::validation;

#[derive(Clone)]
pub struct PaymentMethodBook {
    repo: Arc<dyn PaymentMethodRepository>,
}

fn clean(instrument: PaymentInstrument) -> PortResult<PaymentInstrument> {
    match instrument {
        PaymentInstrument::Card {
            card_name,
            last4,
            expiry,
        } => Ok(PaymentInstrument::Card {
            card_name: validation::required("cardName", &card_name)?,
            last4: validation::card_last4(&last4)?,
            expiry: validation::card_expiry(&expiry)?,
        }),
        PaymentInstrument::Upi { upi_id } => Ok(PaymentInstrument::Upi {
            upi_id: validation::upi_id(&upi_id)?,
        }),
    }
}

impl PaymentMethodBook {
    pub fn new(repo: Arc<dyn PaymentMethodRepository>) -> Self {
        Self { repo }
    }

    /// Adds a method and returns the refreshed list, newest first.
    pub async fn add(
        &self,
        user_id: Uuid,
        instrument: PaymentInstrument,
        is_default: bool,
    ) -> PortResult<Vec<PaymentMethod>> {
        let method = self
            .repo
            .insert_payment_method(PaymentMethod {
                id: Uuid::new_v4(),
                user_id,
                instrument: clean(instrument)?,
                is_default: false,
                created_at: Utc::now(),
            })
            .await?;
        if is_default {
            self.repo
                .replace_default_payment_method(user_id, method.id)
                .await?;
        }
        self.list(user_id).await
    }

    pub async fn list(&self, user_id: Uuid) -> PortResult<Vec<PaymentMethod>> {
        self.repo.list_payment_methods(user_id).await
    }

    pub async fn set_default(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> PortResult<Vec<PaymentMethod>> {
        self.owned(user_id, method_id).await?;
        self.repo
            .replace_default_payment_method(user_id, method_id)
            .await?;
        self.list(user_id).await
    }

    pub async fn remove(&self, user_id: Uuid, method_id: Uuid) -> PortResult<Vec<PaymentMethod>> {
        self.owned(user_id, method_id).await?;
        self.repo.delete_payment_method(method_id).await?;
        self.list(user_id).await
    }

    async fn owned(&self, user_id: Uuid, method_id: Uuid) -> PortResult<PaymentMethod> {
        let method = self.repo.get_payment_method(method_id).await?;
        if method.user_id != user_id {
            return Err(PortError::Unauthorized);
        }
        Ok(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn card(last4: &str) -> PaymentInstrument {
        PaymentInstrument::Card {
            card_name: "Jane Doe".to_string(),
            last4: last4.to_string(),
            expiry: "08/29".to_string(),
        }
    }

    fn upi() -> PaymentInstrument {
        PaymentInstrument::Upi {
            upi_id: "jane@okbank".to_string(),
        }
    }

    #[tokio::test]
    async fn only_one_default_at_a_time() {
        let book = PaymentMethodBook::new(Arc::new(InMemoryStore::new()));
        let user = Uuid::new_v4();

        book.add(user, card("4242"), true).await.unwrap();
        let methods = book.add(user, upi(), true).await.unwrap();
        let defaults: Vec<_> = methods.iter().filter(|m| m.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].instrument.kind(), "upi");

        let card_id = methods
            .iter()
            .find(|m| m.instrument.kind() == "card")
            .map(|m| m.id)
            .unwrap();
        let methods = book.set_default(user, card_id).await.unwrap();
        let defaults: Vec<_> = methods.iter().filter(|m| m.is_default).map(|m| m.id).collect();
        assert_eq!(defaults, vec![card_id]);
    }

    #[tokio::test]
    async fn delete_is_hard_and_owner_only() {
        let book = PaymentMethodBook::new(Arc::new(InMemoryStore::new()));
        let user = Uuid::new_v4();
        let methods = book.add(user, card("4242"), false).await.unwrap();
        let id = methods[0].id;

        let stranger = book.remove(Uuid::new_v4(), id).await;
        assert!(matches!(stranger, Err(PortError::Unauthorized)), "got {stranger:?}");

        assert!(book.remove(user, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn incomplete_instruments_are_rejected() {
        let book = PaymentMethodBook::new(Arc::new(InMemoryStore::new()));
        let result = book.add(Uuid::new_v4(), card("42"), false).await;
        assert!(matches!(result, Err(PortError::Validation(_))), "got {result:?}");

        let result = book
            .add(
                Uuid::new_v4(),
                PaymentInstrument::Upi {
                    upi_id: String::new(),
                },
                false,
            )
            .await;
        assert!(matches!(result, Err(PortError::Validation(_))), "got {result:?}");
    }
}
