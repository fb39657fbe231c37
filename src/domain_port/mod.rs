mod identity_resolver;
mod session_gateway;
mod token_store;

pub use identity_resolver::*;
pub use session_gateway::*;
pub use token_store::*;
