mod slot;
mod subscribers;

pub use slot::*;
pub use subscribers::*;
