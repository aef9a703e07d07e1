mod chunks;
mod ongoing;
mod team;

pub use chunks::build_chunks;
pub use ongoing::is_ongoing;
pub use team::reconstruct_teams;
