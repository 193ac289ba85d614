//! Per-user shipping addresses.
//!
//! At most one active address per user is the default. Promotion always goes through
//! [`AddressRepository::replace_default_address`], which clears the other defaults and
//! sets the target in one transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Address, AddressInput};
use crate::ports::{AddressRepository, PortError, PortResult};
use crate::validation;

#[derive(Clone)]
pub struct AddressBook {
    repo: Arc<dyn AddressRepository>,
}

struct CleanAddress {
    name: String,
    phone: String,
    address_line: String,
    city: String,
    state: String,
    pincode: String,
    landmark: Option<String>,
}

fn clean(input: &AddressInput) -> PortResult<CleanAddress> {
    Ok(CleanAddress {
        name: validation::required("name", &input.name)?,
        phone: validation::phone(&input.phone)?,
        address_line: validation::required("addressLine", &input.address_line)?,
        city: validation::required("city", &input.city)?,
        state: validation::required("state", &input.state)?,
        pincode: validation::pincode(&input.pincode)?,
        landmark: validation::optional(input.landmark.as_deref()),
    })
}

impl AddressBook {
    pub fn new(repo: Arc<dyn AddressRepository>) -> Self {
        Self { repo }
    }

    pub async fn add(&self, user_id: Uuid, input: AddressInput) -> PortResult<Address> {
        let fields = clean(&input)?;
        let now = Utc::now();
        let address = self
            .repo
            .insert_address(Address {
                id: Uuid::new_v4(),
                user_id,
                name: fields.name,
                phone: fields.phone,
                address_line: fields.address_line,
                city: fields.city,
                state: fields.state,
                pincode: fields.pincode,
                landmark: fields.landmark,
                label: input.label,
                is_default: false,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if input.is_default {
            return self.repo.replace_default_address(user_id, address.id).await;
        }
        Ok(address)
    }

    /// Active addresses, default first.
    pub async fn list(&self, user_id: Uuid) -> PortResult<Vec<Address>> {
        self.repo.list_active_addresses(user_id).await
    }

    /// Looks up an active address owned by `user_id`.
    pub async fn owned(&self, user_id: Uuid, address_id: Uuid) -> PortResult<Address> {
        let address = self.repo.get_address(address_id).await?;
        if address.user_id != user_id {
            return Err(PortError::Unauthorized);
        }
        if !address.is_active {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }
        Ok(address)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: AddressInput,
    ) -> PortResult<Address> {
        let mut address = self.owned(user_id, address_id).await?;
        let fields = clean(&input)?;
        address.name = fields.name;
        address.phone = fields.phone;
        address.address_line = fields.address_line;
        address.city = fields.city;
        address.state = fields.state;
        address.pincode = fields.pincode;
        address.landmark = fields.landmark;
        address.label = input.label;
        address.updated_at = Utc::now();
        // An explicit `false` un-defaults the address; `true` goes through the swap below.
        if !input.is_default {
            address.is_default = false;
        }

        let address = self.repo.update_address(address).await?;
        if input.is_default && !address.is_default {
            return self.repo.replace_default_address(user_id, address.id).await;
        }
        Ok(address)
    }

    pub async fn set_default(&self, user_id: Uuid, address_id: Uuid) -> PortResult<Address> {
        self.owned(user_id, address_id).await?;
        let address = self.repo.replace_default_address(user_id, address_id).await?;
        info!(user_id = %user_id, address_id = %address_id, "Default address changed");
        Ok(address)
    }

    /// Soft delete: the record stays for order history but disappears from listings.
    pub async fn remove(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        self.owned(user_id, address_id).await?;
        self.repo.deactivate_address(user_id, address_id).await
    }
}
