mod auth;
mod chat;
mod envelope;
mod pay;

pub use auth::*;
pub use chat::*;
pub use envelope::*;
pub use pay::*;
