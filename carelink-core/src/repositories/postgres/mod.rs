// carelink-core/src/repositories/postgres/mod.rs

pub mod calendar_events;
pub mod conversations;
pub mod credentials;
pub mod messages;
pub mod presence;
pub mod provider_accounts;

pub use calendar_events::PostgresCalendarEventRepository;
pub use conversations::PostgresConversationRepository;
pub use credentials::PostgresCalendarCredentialsRepository;
pub use messages::PostgresMessageRepository;
pub use presence::PostgresPresenceRepository;
pub use provider_accounts::{PostgresProviderAccountRepository, PostgresProviderNumberRepository};
