pub mod health;
pub mod message;
pub mod notification;
pub mod policy;
pub mod request;
pub mod response;
pub mod status;
pub mod validation;
