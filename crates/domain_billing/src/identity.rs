//! Identity and role context
//!
//! The ledger does not authenticate anyone; callers pass the current
//! [`Actor`] by value with each request. Roles are ranked so that a manual
//! payment can only be approved by someone above the person who entered it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::UserId;

use crate::document::Channel;
use crate::error::BillingError;

/// Roles known to the ledger, lowest rank first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// End customer buying a vehicle
    Customer,
    /// Dealership sales or cashier staff
    DealerStaff,
    /// Dealership manager
    DealerManager,
    /// Manufacturer (EVM) staff handling dealer accounts
    ManufacturerStaff,
    /// System administrator
    Admin,
}

impl Role {
    /// Position in the approval hierarchy
    pub fn rank(&self) -> u8 {
        match self {
            Role::Customer => 0,
            Role::DealerStaff => 1,
            Role::DealerManager => 2,
            Role::ManufacturerStaff => 3,
            Role::Admin => 4,
        }
    }

    /// Whether this role may confirm or reject manual payments on a channel
    ///
    /// Customer orders are settled at the dealership; dealer invoices are
    /// settled with the manufacturer.
    pub fn can_approve(&self, channel: Channel) -> bool {
        match channel {
            Channel::B2C => self.rank() >= Role::DealerManager.rank(),
            Channel::B2B => self.rank() >= Role::ManufacturerStaff.rank(),
        }
    }

    /// Whether this role may enter manual (cash/transfer) payments
    pub fn can_enter_manual_payments(&self) -> bool {
        self.rank() >= Role::DealerStaff.rank()
    }

    /// Whether this role may bypass the overpayment check
    pub fn can_override_overpayment(&self) -> bool {
        self.rank() >= Role::DealerManager.rank()
    }

    /// Whether this role may add or edit payment methods
    pub fn can_manage_methods(&self) -> bool {
        self.rank() >= Role::ManufacturerStaff.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::DealerStaff => "DEALER_STAFF",
            Role::DealerManager => "DEALER_MANAGER",
            Role::ManufacturerStaff => "MANUFACTURER_STAFF",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "DEALER_STAFF" => Ok(Role::DealerStaff),
            "DEALER_MANAGER" => Ok(Role::DealerManager),
            "MANUFACTURER_STAFF" | "EVM_STAFF" => Ok(Role::ManufacturerStaff),
            "ADMIN" => Ok(Role::Admin),
            other => Err(BillingError::validation(format!("unknown role: {}", other))),
        }
    }
}

/// The authenticated caller of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Checks that `approver` may settle a manual payment entered by `requester`
///
/// The approver must hold an approving role for the channel, rank strictly
/// above the requester, and be a different user.
pub fn authorize_approval(
    requester: &Actor,
    approver: &Actor,
    channel: Channel,
) -> Result<(), BillingError> {
    if !approver.role.can_approve(channel) {
        return Err(BillingError::unauthorized(format!(
            "role {} cannot approve {} payments",
            approver.role, channel
        )));
    }
    if approver.role.rank() <= requester.role.rank() {
        return Err(BillingError::unauthorized(format!(
            "approver role {} must rank above requester role {}",
            approver.role, requester.role
        )));
    }
    if approver.user_id == requester.user_id {
        return Err(BillingError::unauthorized(
            "a payment cannot be approved by the user who entered it",
        ));
    }
    Ok(())
}
