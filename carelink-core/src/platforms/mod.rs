// carelink-core/src/platforms/mod.rs

pub mod whatsapp;

pub use whatsapp::{ProviderSendAck, TwilioWhatsAppClient, WhatsAppClient};
