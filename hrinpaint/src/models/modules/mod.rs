mod gated_conv;
mod utils;

pub use gated_conv::*;
pub use utils::*;
