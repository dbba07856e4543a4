//! 购物车工具：查看、添加、移除、改数量
//!
//! 按轮构造：工具在创建时绑定 session_id，LLM 无需（也不能）传会话参数。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{CommerceBackend, Tool};

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}

/// view_cart：列出当前购物车内容
pub struct ViewCartTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl ViewCartTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl Tool for ViewCartTool {
    fn name(&self) -> &str {
        "view_cart"
    }

    fn description(&self) -> &str {
        "Show the contents of the shopping cart"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.backend.view_cart(&self.session_id).await
    }
}

/// add_to_cart：按商品 id 与数量加入购物车
pub struct AddToCartTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl AddToCartTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct AddArgs {
    product_id: String,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[async_trait]
impl Tool for AddToCartTool {
    fn name(&self) -> &str {
        "add_to_cart"
    }

    fn description(&self) -> &str {
        "Add a product to the shopping cart"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string" },
                "quantity": { "type": "integer", "minimum": 1, "default": 1 }
            },
            "required": ["product_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: AddArgs = parse_args(args)?;
        self.backend
            .add_to_cart(&self.session_id, &args.product_id, args.quantity)
            .await
    }
}

/// remove_from_cart：从购物车移除商品
pub struct RemoveFromCartTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl RemoveFromCartTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct RemoveArgs {
    product_id: String,
}

#[async_trait]
impl Tool for RemoveFromCartTool {
    fn name(&self) -> &str {
        "remove_from_cart"
    }

    fn description(&self) -> &str {
        "Remove a product from the shopping cart"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string" }
            },
            "required": ["product_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: RemoveArgs = parse_args(args)?;
        self.backend
            .remove_from_cart(&self.session_id, &args.product_id)
            .await
    }
}

/// update_quantity：修改购物车内商品数量（0 等价于移除）
pub struct UpdateQuantityTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl UpdateQuantityTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct UpdateArgs {
    product_id: String,
    quantity: u32,
}

#[async_trait]
impl Tool for UpdateQuantityTool {
    fn name(&self) -> &str {
        "update_quantity"
    }

    fn description(&self) -> &str {
        "Change the quantity of a product already in the cart (0 removes it)"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string" },
                "quantity": { "type": "integer", "minimum": 0 }
            },
            "required": ["product_id", "quantity"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UpdateArgs = parse_args(args)?;
        self.backend
            .update_quantity(&self.session_id, &args.product_id, args.quantity)
            .await
    }
}
