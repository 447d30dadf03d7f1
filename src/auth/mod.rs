pub mod authentication;
pub mod session;

pub use authentication::*;
pub use session::*;
