//! Payment method DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{Channel, MethodScope, MethodUpdate, PaymentMethod, SettlementKind};

#[derive(Debug, Default, Deserialize)]
pub struct MethodsQuery {
    pub channel: Option<Channel>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMethodRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub settlement_kind: SettlementKind,
    pub scope: MethodScope,
}

impl CreateMethodRequest {
    pub fn into_method(self) -> PaymentMethod {
        PaymentMethod::new(self.name, self.settlement_kind, self.scope)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMethodRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub settlement_kind: Option<SettlementKind>,
    pub scope: Option<MethodScope>,
    pub active: Option<bool>,
}

impl From<UpdateMethodRequest> for MethodUpdate {
    fn from(request: UpdateMethodRequest) -> Self {
        MethodUpdate {
            name: request.name,
            settlement_kind: request.settlement_kind,
            scope: request.scope,
            active: request.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResponse {
    pub id: Uuid,
    pub name: String,
    pub settlement_kind: SettlementKind,
    pub scope: MethodScope,
    pub active: bool,
}

impl From<&PaymentMethod> for MethodResponse {
    fn from(method: &PaymentMethod) -> Self {
        Self {
            id: method.id.into(),
            name: method.name.clone(),
            settlement_kind: method.settlement_kind,
            scope: method.scope,
            active: method.active,
        }
    }
}
