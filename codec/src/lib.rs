mod block;
mod header;
mod marketplace;

pub use block::*;
pub use header::*;
pub use marketplace::*;
