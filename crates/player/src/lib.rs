// Sound player with a tiny LRU cache of decoded clips

pub mod cache;
pub mod player;

pub use cache::SoundCache;
pub use player::{PlayerConfig, SoundPlayer};
