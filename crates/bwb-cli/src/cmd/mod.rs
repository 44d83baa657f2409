pub mod config;
pub mod contracts;
pub mod digest;
pub mod frontmatter;
pub mod init;
pub mod phase;
pub mod roadmap;
pub mod state;
pub mod util;
pub mod verify;
