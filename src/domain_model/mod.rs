mod metadata;
mod token;
mod user;

pub use metadata::*;
pub use token::*;
pub use user::*;
