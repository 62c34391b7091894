use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// One onboarded business: owns a catalog, a cart namespace, and the
/// personality text used to parameterize the planner prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Channel routing key: the phone_number_id in inbound webhook payloads.
    pub whatsapp_number_id: String,
    pub business_type: String,
    pub personality: String,
}
