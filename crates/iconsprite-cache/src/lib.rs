pub mod composer;
pub mod diagnostics;
pub mod engine;
pub mod loader;
pub mod store;
pub mod svg;

pub use composer::*;
pub use diagnostics::*;
pub use engine::*;
pub use loader::*;
pub use store::*;

// Re-export common types for convenience
pub use iconsprite_core::{IconId, LoadFailure, Result, Sprite, SpriteConfig, SpriteError, Symbol, UnitKey};
