pub mod agent;
pub mod conversation;
pub mod dataset;
pub mod schema;

pub use agent::*;
pub use conversation::*;
pub use dataset::*;
pub use schema::*;
