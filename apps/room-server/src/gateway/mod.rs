pub mod events;
pub mod fanout;
pub mod presence;
pub mod registry;
pub mod server;
pub mod session;
