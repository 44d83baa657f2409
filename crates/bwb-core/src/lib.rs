pub mod config;
pub mod context;
pub mod contracts;
pub mod digest;
pub mod error;
pub mod evidence;
pub mod fields;
pub mod frontmatter;
pub mod io;
pub mod paths;
pub mod phase;
pub mod roadmap;
pub mod state;
pub mod status;
pub mod verify;

pub use error::{BwbError, Result};
