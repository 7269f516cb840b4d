pub mod blob_store;
pub mod gateway;
pub mod hub;
pub mod matching;
pub mod presence;
pub mod presence_backend;
pub mod rate_limiter;
pub mod registry;
pub mod relay;
pub mod token;
pub mod username;

pub use blob_store::*;
pub use gateway::*;
pub use hub::*;
pub use matching::*;
pub use presence::*;
pub use presence_backend::*;
pub use rate_limiter::*;
pub use registry::*;
pub use relay::*;
pub use token::*;
pub use username::*;
