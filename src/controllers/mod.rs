pub mod blob;
pub mod guest;
pub mod health;
pub mod websocket;

pub use blob::*;
pub use guest::*;
pub use health::*;
pub use websocket::*;
