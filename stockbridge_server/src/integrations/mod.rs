pub mod discord;
pub mod webhooks;
