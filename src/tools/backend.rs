//! 商城后端契约
//!
//! 目录检索、购物车、结账等领域实现是外部协作方，本层只定义窄接口：
//! 每个方法返回给 LLM 看的文本摘要或错误字符串。MockCommerceBackend 供测试与本地 REPL 用，
//! 内置小目录并强制结账子流程顺序（initiate → address → shipping[建单] → payment）。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::{CheckoutStage, CheckoutState};

/// 商城后端：目录 / 购物车 / 结账的窄调用面
#[async_trait]
pub trait CommerceBackend: Send + Sync {
    async fn search_products(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> Result<String, String>;

    async fn check_compatibility(&self, product_id: &str, target: &str) -> Result<String, String>;

    async fn get_price(&self, product_id: &str) -> Result<String, String>;

    async fn view_cart(&self, session_id: &str) -> Result<String, String>;

    async fn add_to_cart(
        &self,
        session_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<String, String>;

    async fn remove_from_cart(&self, session_id: &str, product_id: &str)
        -> Result<String, String>;

    async fn update_quantity(
        &self,
        session_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<String, String>;

    /// 当前购物车条目数（会话状态同步用）
    async fn cart_items_count(&self, session_id: &str) -> u32;

    /// 结账进度（会话状态同步用）；未开始返回 None
    async fn checkout_status(&self, session_id: &str) -> Option<CheckoutState>;

    async fn initiate_checkout(&self, session_id: &str) -> Result<String, String>;

    async fn collect_address(&self, session_id: &str, address: &str) -> Result<String, String>;

    /// 选择配送方式；副作用：创建订单并返回订单号
    async fn select_shipping(&self, session_id: &str, method: &str) -> Result<String, String>;

    async fn process_payment(&self, session_id: &str, method: &str) -> Result<String, String>;
}

#[derive(Debug, Clone)]
struct MockProduct {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    price_cents: u32,
}

const MOCK_CATALOG: &[MockProduct] = &[
    MockProduct {
        id: "p-100",
        name: "Aurora 14 Laptop",
        category: "laptops",
        price_cents: 129_900,
    },
    MockProduct {
        id: "p-101",
        name: "Aurora 14 Sleeve",
        category: "accessories",
        price_cents: 3_900,
    },
    MockProduct {
        id: "p-200",
        name: "Nimbus Wireless Mouse",
        category: "accessories",
        price_cents: 4_900,
    },
    MockProduct {
        id: "p-300",
        name: "Stratus 27 Monitor",
        category: "monitors",
        price_cents: 44_900,
    },
];

#[derive(Debug, Default)]
struct MockCheckout {
    stage: Option<CheckoutStage>,
    order_id: Option<String>,
}

/// 内存商城后端：固定目录、每会话购物车与结账进度
#[derive(Default)]
pub struct MockCommerceBackend {
    carts: RwLock<HashMap<String, Vec<(String, u32)>>>,
    checkouts: RwLock<HashMap<String, MockCheckout>>,
}

impl MockCommerceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_product(product_id: &str) -> Option<&'static MockProduct> {
        MOCK_CATALOG.iter().find(|p| p.id == product_id)
    }

    fn format_price(cents: u32) -> String {
        format!("${}.{:02}", cents / 100, cents % 100)
    }
}

#[async_trait]
impl CommerceBackend for MockCommerceBackend {
    async fn search_products(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> Result<String, String> {
        let q = query.to_lowercase();
        let hits: Vec<&MockProduct> = MOCK_CATALOG
            .iter()
            .filter(|p| {
                let name_match = q.is_empty()
                    || p.name.to_lowercase().contains(&q)
                    || p.category.contains(&q);
                let cat_match = category
                    .map(|c| p.category == c.to_lowercase())
                    .unwrap_or(true);
                name_match && cat_match
            })
            .collect();

        if hits.is_empty() {
            return Ok(format!("No products found for \"{query}\"."));
        }
        let lines: Vec<String> = hits
            .iter()
            .map(|p| {
                format!(
                    "- {} ({}) [{}] {}",
                    p.name,
                    p.id,
                    p.category,
                    Self::format_price(p.price_cents)
                )
            })
            .collect();
        Ok(format!("Found {} product(s):\n{}", hits.len(), lines.join("\n")))
    }

    async fn check_compatibility(&self, product_id: &str, target: &str) -> Result<String, String> {
        let product =
            Self::find_product(product_id).ok_or_else(|| format!("Unknown product: {product_id}"))?;
        // 演示用规则：同前缀视为兼容
        let compatible = Self::find_product(target)
            .map(|t| t.id.split('-').next() == product.id.split('-').next())
            .unwrap_or(false);
        Ok(format!(
            "{} is {} with {}.",
            product.name,
            if compatible { "compatible" } else { "not guaranteed compatible" },
            target
        ))
    }

    async fn get_price(&self, product_id: &str) -> Result<String, String> {
        let product =
            Self::find_product(product_id).ok_or_else(|| format!("Unknown product: {product_id}"))?;
        Ok(format!(
            "{} costs {}.",
            product.name,
            Self::format_price(product.price_cents)
        ))
    }

    async fn view_cart(&self, session_id: &str) -> Result<String, String> {
        let carts = self.carts.read().await;
        match carts.get(session_id) {
            Some(items) if !items.is_empty() => {
                let lines: Vec<String> = items
                    .iter()
                    .map(|(id, qty)| {
                        let name = Self::find_product(id).map(|p| p.name).unwrap_or(id.as_str());
                        format!("- {name} x{qty}")
                    })
                    .collect();
                Ok(format!("Cart contents:\n{}", lines.join("\n")))
            }
            _ => Ok("Your cart is empty.".to_string()),
        }
    }

    async fn add_to_cart(
        &self,
        session_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<String, String> {
        let product =
            Self::find_product(product_id).ok_or_else(|| format!("Unknown product: {product_id}"))?;
        let mut carts = self.carts.write().await;
        let cart = carts.entry(session_id.to_string()).or_default();
        match cart.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, qty)) => *qty += quantity.max(1),
            None => cart.push((product_id.to_string(), quantity.max(1))),
        }
        let count: u32 = cart.len() as u32;
        Ok(format!(
            "Added {} to your cart. Items in cart: {count}.",
            product.name
        ))
    }

    async fn remove_from_cart(
        &self,
        session_id: &str,
        product_id: &str,
    ) -> Result<String, String> {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(session_id.to_string()).or_default();
        let before = cart.len();
        cart.retain(|(id, _)| id != product_id);
        if cart.len() == before {
            return Err(format!("{product_id} is not in the cart"));
        }
        Ok(format!(
            "Removed {product_id}. Items in cart: {}.",
            cart.len()
        ))
    }

    async fn update_quantity(
        &self,
        session_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<String, String> {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(session_id.to_string()).or_default();
        if quantity == 0 {
            cart.retain(|(id, _)| id != product_id);
            return Ok(format!(
                "Removed {product_id}. Items in cart: {}.",
                cart.len()
            ));
        }
        match cart.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, qty)) => {
                *qty = quantity;
                Ok(format!("Updated {product_id} quantity to {quantity}."))
            }
            None => Err(format!("{product_id} is not in the cart")),
        }
    }

    async fn cart_items_count(&self, session_id: &str) -> u32 {
        self.carts
            .read()
            .await
            .get(session_id)
            .map(|c| c.len() as u32)
            .unwrap_or(0)
    }

    async fn checkout_status(&self, session_id: &str) -> Option<CheckoutState> {
        let checkouts = self.checkouts.read().await;
        let entry = checkouts.get(session_id)?;
        entry.stage.map(|stage| CheckoutState {
            stage,
            order_id: entry.order_id.clone(),
        })
    }

    async fn initiate_checkout(&self, session_id: &str) -> Result<String, String> {
        if self.cart_items_count(session_id).await == 0 {
            return Err("cannot start checkout with an empty cart".to_string());
        }
        let mut checkouts = self.checkouts.write().await;
        let entry = checkouts.entry(session_id.to_string()).or_default();
        entry.stage = Some(CheckoutStage::Initiated);
        entry.order_id = None;
        Ok("Checkout started. Please provide a shipping address.".to_string())
    }

    async fn collect_address(&self, session_id: &str, address: &str) -> Result<String, String> {
        let mut checkouts = self.checkouts.write().await;
        let entry = checkouts.entry(session_id.to_string()).or_default();
        match entry.stage {
            Some(CheckoutStage::Initiated) | Some(CheckoutStage::AddressCollected) => {
                entry.stage = Some(CheckoutStage::AddressCollected);
                Ok(format!(
                    "Shipping address saved: {address}. Please choose a shipping method (standard or express)."
                ))
            }
            _ => Err("checkout has not been initiated yet".to_string()),
        }
    }

    async fn select_shipping(&self, session_id: &str, method: &str) -> Result<String, String> {
        let mut checkouts = self.checkouts.write().await;
        let entry = checkouts.entry(session_id.to_string()).or_default();
        match entry.stage {
            Some(CheckoutStage::AddressCollected) => {
                let order_id = format!("ord-{}", Uuid::new_v4());
                entry.stage = Some(CheckoutStage::ShippingSelected);
                entry.order_id = Some(order_id.clone());
                Ok(format!(
                    "Shipping method {method} selected. Order {order_id} has been created."
                ))
            }
            _ => Err("a shipping address is required before selecting shipping".to_string()),
        }
    }

    async fn process_payment(&self, session_id: &str, method: &str) -> Result<String, String> {
        let mut checkouts = self.checkouts.write().await;
        let entry = checkouts.entry(session_id.to_string()).or_default();
        match (&entry.stage, &entry.order_id) {
            (Some(CheckoutStage::ShippingSelected), Some(order_id)) => {
                entry.stage = Some(CheckoutStage::PaymentProcessed);
                Ok(format!("Payment by {method} accepted for {order_id}."))
            }
            _ => Err("no order to pay for; select shipping first".to_string()),
        }
    }
}
