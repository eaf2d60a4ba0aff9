pub mod client;
pub mod conversations;
pub mod feed;
pub mod messages;
pub mod pagination;
pub mod posts;
mod record;
pub mod tags;
pub mod users;
