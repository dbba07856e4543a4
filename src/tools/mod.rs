pub mod backend;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod executor;
pub mod registry;

pub use backend::{CommerceBackend, MockCommerceBackend};
pub use cart::{AddToCartTool, RemoveFromCartTool, UpdateQuantityTool, ViewCartTool};
pub use catalog::{CheckCompatibilityTool, GetPriceTool, SearchProductsTool};
pub use checkout::{
    CollectAddressTool, InitiateCheckoutTool, ProcessPaymentTool, SelectShippingTool,
};
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolDescriptor, ToolRegistry};
