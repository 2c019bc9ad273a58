pub mod broker;
pub mod connector;
pub mod database;
pub mod email;
pub mod health;
pub mod memory;
pub mod rbmq;
pub mod sender;
pub mod sms;
pub mod store;
