/// Re-export errors
pub use ember_mining_errors::mempool::*;
