pub mod client;
pub mod debug;
pub mod json;
pub mod key;
pub mod merge;
pub mod query;

pub use client::*;
pub use debug::send_dynamo_request;
pub use json::*;
pub use key::*;
pub use merge::*;
pub use query::*;
