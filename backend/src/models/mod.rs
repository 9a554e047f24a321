pub mod config;
pub mod emotion;
pub mod error;
pub mod filter;
pub mod generation;
pub mod text_style;
