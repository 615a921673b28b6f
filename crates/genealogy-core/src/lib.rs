pub mod config_manager;
pub mod count;
pub mod error;
pub mod identifier;
pub mod payload;
pub mod reconcile;
pub mod traits;
pub mod types;

pub use config_manager::*;
pub use count::*;
pub use error::*;
pub use identifier::*;
pub use payload::{normalize, parse_root_ref, parse_tree, RawNode, RawRootRef};
pub use reconcile::*;
pub use traits::*;
pub use types::*;
