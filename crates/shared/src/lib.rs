mod bootstrap;
mod view;

pub use bootstrap::*;
pub use view::*;
