pub mod navigator;
pub mod state;
pub mod team_count;

pub use navigator::*;
pub use state::*;
pub use team_count::*;
