mod pipeline;
pub mod utils;
mod validation;

pub use utils::test_utils;
