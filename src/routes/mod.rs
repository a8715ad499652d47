pub mod auth;
pub mod chatroom;
pub mod subscription;
