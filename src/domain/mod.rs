mod persistent_session_impl;
mod service;

pub use persistent_session_impl::*;
pub use service::*;
