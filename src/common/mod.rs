pub mod config;
pub mod error;
pub mod properties;
pub mod text;
pub mod util;
