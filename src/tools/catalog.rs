//! 商品目录工具：搜索、兼容性、价格
//!
//! 导购专家（Product-Discovery）的工具面，全部转发到 CommerceBackend。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{CommerceBackend, Tool};

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}

/// search_products：按关键词（可选类目）搜索商品
pub struct SearchProductsTool {
    backend: Arc<dyn CommerceBackend>,
}

impl SearchProductsTool {
    pub fn new(backend: Arc<dyn CommerceBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    category: Option<String>,
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &str {
        "search_products"
    }

    fn description(&self) -> &str {
        "Search the product catalog by keyword, optionally filtered by category"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "search keywords" },
                "category": { "type": "string", "description": "optional category filter" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: SearchArgs = parse_args(args)?;
        self.backend
            .search_products(&args.query, args.category.as_deref())
            .await
    }
}

/// check_compatibility：检查两件商品是否兼容
pub struct CheckCompatibilityTool {
    backend: Arc<dyn CommerceBackend>,
}

impl CheckCompatibilityTool {
    pub fn new(backend: Arc<dyn CommerceBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct CompatibilityArgs {
    product_id: String,
    target: String,
}

#[async_trait]
impl Tool for CheckCompatibilityTool {
    fn name(&self) -> &str {
        "check_compatibility"
    }

    fn description(&self) -> &str {
        "Check whether a product is compatible with another product"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string" },
                "target": { "type": "string", "description": "product id to check against" }
            },
            "required": ["product_id", "target"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: CompatibilityArgs = parse_args(args)?;
        self.backend
            .check_compatibility(&args.product_id, &args.target)
            .await
    }
}

/// get_price：查询商品价格
pub struct GetPriceTool {
    backend: Arc<dyn CommerceBackend>,
}

impl GetPriceTool {
    pub fn new(backend: Arc<dyn CommerceBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct PriceArgs {
    product_id: String,
}

#[async_trait]
impl Tool for GetPriceTool {
    fn name(&self) -> &str {
        "get_price"
    }

    fn description(&self) -> &str {
        "Look up the current price of a product"
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
        let args: PriceArgs = parse_args(args)?;
        self.backend.get_price(&args.product_id).await
    }
}
