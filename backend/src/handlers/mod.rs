pub mod health;
pub mod meme;
