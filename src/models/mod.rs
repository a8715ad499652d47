pub mod chatroom;
pub mod exchange;
pub mod user;

pub use chatroom::Chatroom;
pub use exchange::MessageExchange;
pub use user::{NewUser, SubscriptionTier, User};
