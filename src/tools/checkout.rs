//! 结账工具：发起、收地址、选配送（建单）、可选支付
//!
//! 严格子流程顺序由后端强制，这里只做参数解析与转发。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{CommerceBackend, Tool};

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}

/// initiate_checkout：开始结账流程
pub struct InitiateCheckoutTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl InitiateCheckoutTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl Tool for InitiateCheckoutTool {
    fn name(&self) -> &str {
        "initiate_checkout"
    }

    fn description(&self) -> &str {
        "Start the checkout flow for the current cart"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.backend.initiate_checkout(&self.session_id).await
    }
}

/// collect_address：记录配送地址
pub struct CollectAddressTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl CollectAddressTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct AddressArgs {
    address: String,
}

#[async_trait]
impl Tool for CollectAddressTool {
    fn name(&self) -> &str {
        "collect_address"
    }

    fn description(&self) -> &str {
        "Save the shipping address for the order"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "address": { "type": "string" }
            },
            "required": ["address"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: AddressArgs = parse_args(args)?;
        self.backend
            .collect_address(&self.session_id, &args.address)
            .await
    }
}

/// select_shipping：选择配送方式；副作用是创建订单
pub struct SelectShippingTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl SelectShippingTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct ShippingArgs {
    method: String,
}

#[async_trait]
impl Tool for SelectShippingTool {
    fn name(&self) -> &str {
        "select_shipping"
    }

    fn description(&self) -> &str {
        "Choose a shipping method; this creates the order"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "method": { "type": "string", "description": "standard or express" }
            },
            "required": ["method"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: ShippingArgs = parse_args(args)?;
        self.backend
            .select_shipping(&self.session_id, &args.method)
            .await
    }
}

/// process_payment：对已建订单支付（可选步骤）
pub struct ProcessPaymentTool {
    backend: Arc<dyn CommerceBackend>,
    session_id: String,
}

impl ProcessPaymentTool {
    pub fn new(backend: Arc<dyn CommerceBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct PaymentArgs {
    method: String,
}

#[async_trait]
impl Tool for ProcessPaymentTool {
    fn name(&self) -> &str {
        "process_payment"
    }

    fn description(&self) -> &str {
        "Charge the chosen payment method for the created order"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "method": { "type": "string", "description": "e.g. card, paypal" }
            },
            "required": ["method"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: PaymentArgs = parse_args(args)?;
        self.backend
            .process_payment(&self.session_id, &args.method)
            .await
    }
}
