use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use vendy_core::domain::customer::CustomerId;
use vendy_core::domain::product::ProductId;
use vendy_core::domain::tenant::TenantId;

use crate::cart::{CartError, CartStore};
use crate::gateway::{CatalogGateway, GatewayError};

/// Raw tool invocation as the planner produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self { name: name.into(), arguments }
    }
}

/// The closed set of operations a turn may perform. Anything else the
/// planner asks for is a recoverable error, never an execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
    SearchProduct { query: String },
    AddToCart { product_id: ProductId, quantity: i64 },
    RemoveFromCart { product_id: ProductId },
    SetQuantity { product_id: ProductId, quantity: i64 },
    ViewCart,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct AddArgs {
    product_id: String,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct RemoveArgs {
    product_id: String,
}

#[derive(Debug, Deserialize)]
struct SetQuantityArgs {
    product_id: String,
    quantity: i64,
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchProduct { .. } => "search_product",
            Self::AddToCart { .. } => "add_to_cart",
            Self::RemoveFromCart { .. } => "remove_from_cart",
            Self::SetQuantity { .. } => "set_quantity",
            Self::ViewCart => "view_cart",
        }
    }

    pub fn parse(request: &ToolRequest) -> Result<Self, ToolError> {
        let bad_args = |e: serde_json::Error| {
            ToolError::Recoverable(format!("invalid arguments for {}: {e}", request.name))
        };
        match request.name.as_str() {
            "search_product" => {
                let args: SearchArgs =
                    serde_json::from_value(request.arguments.clone()).map_err(bad_args)?;
                Ok(Self::SearchProduct { query: args.query })
            }
            "add_to_cart" => {
                let args: AddArgs =
                    serde_json::from_value(request.arguments.clone()).map_err(bad_args)?;
                Ok(Self::AddToCart {
                    product_id: ProductId(args.product_id),
                    quantity: args.quantity,
                })
            }
            "remove_from_cart" => {
                let args: RemoveArgs =
                    serde_json::from_value(request.arguments.clone()).map_err(bad_args)?;
                Ok(Self::RemoveFromCart { product_id: ProductId(args.product_id) })
            }
            "set_quantity" => {
                let args: SetQuantityArgs =
                    serde_json::from_value(request.arguments.clone()).map_err(bad_args)?;
                Ok(Self::SetQuantity {
                    product_id: ProductId(args.product_id),
                    quantity: args.quantity,
                })
            }
            "view_cart" => Ok(Self::ViewCart),
            other => Err(ToolError::Recoverable(format!("unknown tool `{other}`"))),
        }
    }
}

/// Prompt-facing description of one tool.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// Fed back into the transcript so the planner can adjust.
    #[error("{0}")]
    Recoverable(String),
    /// Aborts the turn.
    #[error("{0}")]
    Failed(String),
}

impl From<CartError> for ToolError {
    fn from(error: CartError) -> Self {
        if error.is_recoverable() {
            Self::Recoverable(error.to_string())
        } else {
            Self::Failed(error.to_string())
        }
    }
}

impl From<GatewayError> for ToolError {
    fn from(error: GatewayError) -> Self {
        Self::Failed(error.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError>;
}

/// Per-turn tool set. Built fresh for every inbound message and bound to
/// the resolved tenant and customer, so no tool can reach across tenants.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn ToolHandler>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) -> Result<(), RegistryError> {
        let name = tool.spec().name;
        if self.tools.contains_key(name) {
            return Err(RegistryError::DuplicateTool(name.to_owned()));
        }
        self.order.push(name);
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub async fn dispatch(&self, request: &ToolRequest) -> Result<Value, ToolError> {
        let call = ToolCall::parse(request)?;
        let handler = self
            .tools
            .get(call.name())
            .ok_or_else(|| ToolError::Recoverable(format!("unknown tool `{}`", call.name())))?;
        handler.execute(&call).await
    }
}

fn wrong_call(expected: &'static str) -> ToolError {
    ToolError::Failed(format!("handler `{expected}` received a mismatched call"))
}

pub struct SearchProductTool {
    gateway: Arc<CatalogGateway>,
    tenant_id: TenantId,
}

#[async_trait]
impl ToolHandler for SearchProductTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_product",
            description: "Search the catalog by name, ingredient, or description. Reports \
                          availability and price for each match.",
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let ToolCall::SearchProduct { query } = call else {
            return Err(wrong_call("search_product"));
        };
        let outcome = self.gateway.search(&self.tenant_id, query).await?;
        serde_json::to_value(outcome)
            .map_err(|e| ToolError::Failed(format!("encode search outcome: {e}")))
    }
}

pub struct AddToCartTool {
    cart: Arc<CartStore>,
    tenant_id: TenantId,
    customer_id: CustomerId,
}

#[async_trait]
impl ToolHandler for AddToCartTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add_to_cart",
            description: "Add a quantity of a confirmed product to the customer's cart. \
                          Re-adding accumulates quantity.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "product_id": { "type": "string" },
                    "quantity": { "type": "integer", "minimum": 1 }
                },
                "required": ["product_id", "quantity"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let ToolCall::AddToCart { product_id, quantity } = call else {
            return Err(wrong_call("add_to_cart"));
        };
        let view =
            self.cart.add(&self.tenant_id, &self.customer_id, product_id, *quantity).await?;
        serde_json::to_value(view).map_err(|e| ToolError::Failed(format!("encode cart: {e}")))
    }
}

pub struct RemoveFromCartTool {
    cart: Arc<CartStore>,
    tenant_id: TenantId,
    customer_id: CustomerId,
}

#[async_trait]
impl ToolHandler for RemoveFromCartTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "remove_from_cart",
            description: "Remove a product from the cart. Removing something that is not in \
                          the cart is a no-op.",
            parameters: json!({
                "type": "object",
                "properties": { "product_id": { "type": "string" } },
                "required": ["product_id"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let ToolCall::RemoveFromCart { product_id } = call else {
            return Err(wrong_call("remove_from_cart"));
        };
        let view = self.cart.remove(&self.tenant_id, &self.customer_id, product_id).await?;
        serde_json::to_value(view).map_err(|e| ToolError::Failed(format!("encode cart: {e}")))
    }
}

pub struct SetQuantityTool {
    cart: Arc<CartStore>,
    tenant_id: TenantId,
    customer_id: CustomerId,
}

#[async_trait]
impl ToolHandler for SetQuantityTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "set_quantity",
            description: "Set the exact quantity of a cart line. Zero removes the line.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "product_id": { "type": "string" },
                    "quantity": { "type": "integer", "minimum": 0 }
                },
                "required": ["product_id", "quantity"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let ToolCall::SetQuantity { product_id, quantity } = call else {
            return Err(wrong_call("set_quantity"));
        };
        let view = self
            .cart
            .set_quantity(&self.tenant_id, &self.customer_id, product_id, *quantity)
            .await?;
        serde_json::to_value(view).map_err(|e| ToolError::Failed(format!("encode cart: {e}")))
    }
}

pub struct ViewCartTool {
    cart: Arc<CartStore>,
    tenant_id: TenantId,
    customer_id: CustomerId,
}

#[async_trait]
impl ToolHandler for ViewCartTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "view_cart",
            description: "Show the current cart lines and the billable total.",
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let ToolCall::ViewCart = call else {
            return Err(wrong_call("view_cart"));
        };
        let view = self.cart.view(&self.tenant_id, &self.customer_id).await?;
        serde_json::to_value(view).map_err(|e| ToolError::Failed(format!("encode cart: {e}")))
    }
}

/// Builds the full tool set for one turn.
pub fn build_registry(
    gateway: Arc<CatalogGateway>,
    cart: Arc<CartStore>,
    tenant_id: TenantId,
    customer_id: CustomerId,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    let tools: Vec<Arc<dyn ToolHandler>> = vec![
        Arc::new(SearchProductTool { gateway, tenant_id: tenant_id.clone() }),
        Arc::new(AddToCartTool {
            cart: cart.clone(),
            tenant_id: tenant_id.clone(),
            customer_id: customer_id.clone(),
        }),
        Arc::new(RemoveFromCartTool {
            cart: cart.clone(),
            tenant_id: tenant_id.clone(),
            customer_id: customer_id.clone(),
        }),
        Arc::new(SetQuantityTool {
            cart: cart.clone(),
            tenant_id: tenant_id.clone(),
            customer_id: customer_id.clone(),
        }),
        Arc::new(ViewCartTool { cart, tenant_id, customer_id }),
    ];
    for tool in tools {
        // The set is assembled from distinct literals; a collision here is
        // a programming error caught by the registry test below.
        if registry.register(tool).is_err() {
            unreachable!("default tool set contains duplicate names");
        }
    }
    registry
}
