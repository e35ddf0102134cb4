pub mod db;
pub mod whatsapp;

pub use db::{connect_with_retry, DbAdapter};
pub use whatsapp::WhatsAppSender;
