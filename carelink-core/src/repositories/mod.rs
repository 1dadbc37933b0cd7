// carelink-core/src/repositories/mod.rs

pub mod postgres;

pub use carelink_common::traits::repository_traits::{
    CalendarCredentialsRepository, CalendarEventRepository, ConversationRepository,
    MessageRepository, PresenceRepository, ProviderAccountRepository, ProviderNumberRepository,
};
