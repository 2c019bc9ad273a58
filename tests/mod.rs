mod common;
mod sms_sender_tests;
