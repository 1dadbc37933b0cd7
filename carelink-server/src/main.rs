// carelink-server/src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use carelink_core::auth::{GoogleAuthenticator, TokenManager};
use carelink_core::crypto::Encryptor;
use carelink_core::platforms::whatsapp::TwilioWhatsAppClient;
use carelink_core::repositories::postgres::{
    PostgresCalendarCredentialsRepository, PostgresCalendarEventRepository,
    PostgresConversationRepository, PostgresMessageRepository,
    PostgresProviderAccountRepository, PostgresProviderNumberRepository,
};
use carelink_core::repositories::{
    CalendarCredentialsRepository, CalendarEventRepository, ConversationRepository,
    MessageRepository, ProviderAccountRepository, ProviderNumberRepository,
};
use carelink_core::services::{CalendarSyncService, ConversationService, MessageService};
use carelink_core::tasks::calendar_sync::spawn_calendar_sync_task;
use carelink_core::tasks::ReminderScheduler;
use carelink_core::webhooks::{webhook_router, WebhookIngestionService, WebhookState};
use carelink_core::{Database, Error};

#[derive(Parser, Debug, Clone)]
#[command(name = "carelink")]
#[command(author, version, about = "Carelink - clinic messaging & calendar integration server")]
struct Args {
    /// Address the webhook server binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind_addr: String,

    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://carelink@localhost:5432/carelink")]
    database_url: String,

    /// Public base URL the gateway signs webhook requests against
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
    public_base_url: String,

    /// Fallback gateway account SID when none is stored
    #[arg(long, env = "GATEWAY_ACCOUNT_SID")]
    gateway_account_sid: Option<String>,

    /// Auth token for the fallback account (also its signing secret)
    #[arg(long, env = "GATEWAY_AUTH_TOKEN")]
    gateway_auth_token: Option<String>,

    /// Messaging gateway API base URL
    #[arg(long, env = "GATEWAY_BASE_URL", default_value = "https://api.twilio.com")]
    gateway_base_url: String,

    /// Calendar provider OAuth client id
    #[arg(long, env = "CALENDAR_CLIENT_ID", default_value = "")]
    calendar_client_id: String,

    /// Calendar provider OAuth client secret
    #[arg(long, env = "CALENDAR_CLIENT_SECRET", default_value = "")]
    calendar_client_secret: String,

    /// OAuth redirect URI registered with the calendar provider
    #[arg(long, env = "CALENDAR_REDIRECT_URI", default_value = "http://localhost:8080/oauth/callback")]
    calendar_redirect_uri: String,

    /// Seconds between calendar sync passes
    #[arg(long, default_value = "900")]
    sync_interval_secs: u64,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("carelink=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

fn load_master_key() -> Result<Vec<u8>, Error> {
    let encoded = std::env::var("CARELINK_MASTER_KEY")
        .map_err(|_| Error::KeyDerivation("CARELINK_MASTER_KEY is not set".to_string()))?;
    BASE64
        .decode(encoded.trim())
        .map_err(|e| Error::KeyDerivation(format!("CARELINK_MASTER_KEY is not valid base64: {e}")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("Carelink starting. bind_addr={}", args.bind_addr);

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
    }
    info!("Carelink finished. Goodbye!");
    Ok(())
}

async fn run_server(args: Args) -> Result<(), Error> {
    let master_key = load_master_key()?;
    let encryptor = Encryptor::new(&master_key)?;

    let db = Database::new(&args.database_url).await?;
    db.migrate().await?;
    let pool = db.pool().clone();

    // Repositories
    let conversations_repo: Arc<dyn ConversationRepository> =
        Arc::new(PostgresConversationRepository::new(pool.clone()));
    let messages_repo: Arc<dyn MessageRepository> =
        Arc::new(PostgresMessageRepository::new(pool.clone()));
    let credentials_repo: Arc<dyn CalendarCredentialsRepository> = Arc::new(
        PostgresCalendarCredentialsRepository::new(pool.clone(), encryptor.clone()),
    );
    let events_repo: Arc<dyn CalendarEventRepository> =
        Arc::new(PostgresCalendarEventRepository::new(pool.clone()));
    let accounts_repo: Arc<dyn ProviderAccountRepository> = Arc::new(
        PostgresProviderAccountRepository::new(pool.clone(), encryptor.clone()),
    );
    let numbers_repo: Arc<dyn ProviderNumberRepository> =
        Arc::new(PostgresProviderNumberRepository::new(pool.clone()));

    // Outbound gateway client; falls back to empty credentials when the
    // deployment is webhook-only.
    let whatsapp_client = Arc::new(TwilioWhatsAppClient::new(
        args.gateway_base_url.clone(),
        args.gateway_account_sid.clone().unwrap_or_default(),
        args.gateway_auth_token.clone().unwrap_or_default(),
    ));

    // Services
    let conversation_service = Arc::new(ConversationService::new(conversations_repo.clone()));
    let message_service = Arc::new(MessageService::new(
        messages_repo.clone(),
        conversations_repo.clone(),
        whatsapp_client,
    ));

    let authenticator = Arc::new(GoogleAuthenticator::new(
        args.calendar_client_id.clone(),
        args.calendar_client_secret.clone(),
        args.calendar_redirect_uri.clone(),
    ));
    let token_manager = Arc::new(TokenManager::new(credentials_repo.clone(), authenticator));

    let scheduler = ReminderScheduler::new(events_repo.clone());
    // Timer jobs do not survive a restart; rebuild them from the rows.
    scheduler.rearm_from_store().await?;

    let calendar_sync = Arc::new(CalendarSyncService::new(
        token_manager.clone(),
        events_repo.clone(),
        scheduler.clone(),
    ));
    let _sync_task = spawn_calendar_sync_task(
        calendar_sync,
        credentials_repo.clone(),
        args.sync_interval_secs,
    );

    // Webhook ingestion
    let default_account = match (args.gateway_account_sid, args.gateway_auth_token) {
        (Some(sid), Some(token)) => Some((sid, token)),
        _ => None,
    };
    let ingestion = Arc::new(WebhookIngestionService::new(
        accounts_repo,
        numbers_repo,
        conversation_service,
        message_service,
        default_account,
        args.public_base_url.clone(),
    ));

    let app = webhook_router(WebhookState { ingestion });

    let addr: SocketAddr = args
        .bind_addr
        .parse()
        .map_err(|e| Error::Parse(format!("invalid bind address: {e}")))?;
    info!("Webhook server listening on http://{}", addr);

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            shutdown_handle.graceful_shutdown(None);
        }
    });

    axum_server::Server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    scheduler.shutdown();
    info!("Webhook server shut down.");
    Ok(())
}
