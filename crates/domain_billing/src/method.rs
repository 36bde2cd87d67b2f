//! Payment methods and the method registry
//!
//! Each configured method is tagged with a settlement kind, which decides the
//! initial state of every transaction recorded with it, and a scope, which
//! decides which sales channels may use it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::PaymentMethodId;

use crate::document::Channel;
use crate::error::BillingError;

/// How a payment made with a method gets settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementKind {
    /// Resolved asynchronously by an external payment gateway
    Gateway,
    /// Entered by staff and confirmed by an approver
    Manual,
}

impl SettlementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementKind::Gateway => "GATEWAY",
            SettlementKind::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GATEWAY" => Ok(SettlementKind::Gateway),
            "MANUAL" => Ok(SettlementKind::Manual),
            other => Err(BillingError::validation(format!("unknown settlement kind: {}", other))),
        }
    }
}

/// Channels a method may be used on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MethodScope {
    B2C,
    B2B,
    All,
}

impl MethodScope {
    pub fn covers(&self, channel: Channel) -> bool {
        matches!(
            (self, channel),
            (MethodScope::All, _)
                | (MethodScope::B2C, Channel::B2C)
                | (MethodScope::B2B, Channel::B2B)
        )
    }
}

/// A configured payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub settlement_kind: SettlementKind,
    pub scope: MethodScope,
    pub active: bool,
}

impl PaymentMethod {
    pub fn new(name: impl Into<String>, settlement_kind: SettlementKind, scope: MethodScope) -> Self {
        Self {
            id: PaymentMethodId::new_v7(),
            name: name.into(),
            settlement_kind,
            scope,
            active: true,
        }
    }

    pub fn with_id(mut self, id: PaymentMethodId) -> Self {
        self.id = id;
        self
    }

    /// Checks the method can take a new payment on `channel`
    pub fn ensure_usable_for(&self, channel: Channel) -> Result<(), BillingError> {
        if !self.active {
            return Err(BillingError::validation(format!(
                "payment method '{}' is inactive",
                self.name
            )));
        }
        if !self.scope.covers(channel) {
            return Err(BillingError::validation(format!(
                "payment method '{}' is not available for {} documents",
                self.name, channel
            )));
        }
        Ok(())
    }
}

/// Changes applied by [`PaymentMethodRegistry::update`]
///
/// Edits never touch existing transactions: each transaction keeps the
/// settlement kind it was recorded under.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodUpdate {
    pub name: Option<String>,
    pub settlement_kind: Option<SettlementKind>,
    pub scope: Option<MethodScope>,
    pub active: Option<bool>,
}

/// Well-known ids of the seeded methods
pub struct StandardMethods;

impl StandardMethods {
    pub const VNPAY: PaymentMethodId =
        PaymentMethodId::from_uuid(Uuid::from_u128(0x0192_0000_0000_7000_8000_0000_0000_0001));
    pub const CASH: PaymentMethodId =
        PaymentMethodId::from_uuid(Uuid::from_u128(0x0192_0000_0000_7000_8000_0000_0000_0002));
    pub const BANK_TRANSFER: PaymentMethodId =
        PaymentMethodId::from_uuid(Uuid::from_u128(0x0192_0000_0000_7000_8000_0000_0000_0003));

    pub fn all() -> Vec<PaymentMethod> {
        vec![
            PaymentMethod::new("VNPAY", SettlementKind::Gateway, MethodScope::All)
                .with_id(Self::VNPAY),
            PaymentMethod::new("Cash", SettlementKind::Manual, MethodScope::All)
                .with_id(Self::CASH),
            PaymentMethod::new("Bank transfer", SettlementKind::Manual, MethodScope::B2B)
                .with_id(Self::BANK_TRANSFER),
        ]
    }
}

/// Holds the configured payment methods
#[derive(Debug, Default)]
pub struct PaymentMethodRegistry {
    methods: HashMap<PaymentMethodId, PaymentMethod>,
    order: Vec<PaymentMethodId>,
}

impl PaymentMethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with VNPAY, cash, and bank transfer
    pub fn with_standard_methods() -> Self {
        let mut registry = Self::new();
        for method in StandardMethods::all() {
            registry.order.push(method.id);
            registry.methods.insert(method.id, method);
        }
        registry
    }

    /// Adds a method
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the name is blank or the id is taken
    pub fn register(&mut self, method: PaymentMethod) -> Result<(), BillingError> {
        if method.name.trim().is_empty() {
            return Err(BillingError::validation("payment method name is required"));
        }
        if self.methods.contains_key(&method.id) {
            return Err(BillingError::validation(format!(
                "payment method {} already registered",
                method.id
            )));
        }
        tracing::info!(
            method_id = %method.id,
            name = %method.name,
            settlement_kind = %method.settlement_kind,
            "Payment method registered"
        );
        self.order.push(method.id);
        self.methods.insert(method.id, method);
        Ok(())
    }

    pub fn update(
        &mut self,
        id: PaymentMethodId,
        update: MethodUpdate,
    ) -> Result<PaymentMethod, BillingError> {
        let method = self
            .methods
            .get_mut(&id)
            .ok_or_else(|| BillingError::MethodNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(BillingError::validation("payment method name is required"));
            }
            method.name = name;
        }
        if let Some(kind) = update.settlement_kind {
            method.settlement_kind = kind;
        }
        if let Some(scope) = update.scope {
            method.scope = scope;
        }
        if let Some(active) = update.active {
            method.active = active;
        }

        Ok(method.clone())
    }

    pub fn deactivate(&mut self, id: PaymentMethodId) -> Result<PaymentMethod, BillingError> {
        self.update(id, MethodUpdate { active: Some(false), ..Default::default() })
    }

    pub fn get(&self, id: PaymentMethodId) -> Result<&PaymentMethod, BillingError> {
        self.methods
            .get(&id)
            .ok_or_else(|| BillingError::MethodNotFound(id.to_string()))
    }

    /// Looks up a method and checks it may take a payment on `channel`
    pub fn resolve_for(
        &self,
        id: PaymentMethodId,
        channel: Channel,
    ) -> Result<PaymentMethod, BillingError> {
        let method = self.get(id)?;
        method.ensure_usable_for(channel)?;
        Ok(method.clone())
    }

    /// Active methods, optionally restricted to a channel, in registration order
    pub fn list_for(&self, channel: Option<Channel>) -> Vec<PaymentMethod> {
        self.order
            .iter()
            .filter_map(|id| self.methods.get(id))
            .filter(|m| m.active)
            .filter(|m| channel.map_or(true, |c| m.scope.covers(c)))
            .cloned()
            .collect()
    }
}
