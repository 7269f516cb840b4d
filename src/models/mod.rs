pub mod api;
pub mod blob;
pub mod call;
pub mod events;
pub mod guest;
pub mod room;

pub use api::*;
pub use blob::*;
pub use call::*;
pub use events::*;
pub use guest::*;
pub use room::*;
