pub mod ast;
pub mod codec;
pub mod error;
pub mod operator;
pub mod sanitize;

pub use ast::*;
pub use codec::{encode, encode_key};
pub use error::*;
pub use operator::translate;
pub use sanitize::sanitize;
