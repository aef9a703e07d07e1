mod chunk;
mod msg;
mod session;
mod util;

pub use chunk::*;
pub use msg::*;
pub use session::*;
pub use util::*;
