pub mod state;
pub mod store;

pub use state::{
    CheckoutStage, CheckoutState, ClarificationState, HandoffContext, SessionState,
};
pub use store::{MemorySessionStore, SessionStore, SessionStoreError};
