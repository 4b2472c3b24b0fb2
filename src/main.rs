use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use paperbot::bot;
use paperbot::cache_store::CacheStore;
use paperbot::clock::SystemClock;
use paperbot::config::BotConfig;
use paperbot::db;
use paperbot::dialogue::PaperDialogueState;
use paperbot::fetcher::HttpDocumentFetcher;
use paperbot::ledger::{PgUserDirectory, UserLedger};
use paperbot::localization;
use paperbot::lookup::LookupService;

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // LOG_FORMAT=json for log shippers, plain text otherwise
    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Paperbot");

    let config = BotConfig::from_env()?;

    localization::init_localization()?;

    info!(path = %config.store.sqlite_path, "Initializing local store");
    let pool = db::connect_sqlite(&config.store.sqlite_path, config.store.acquire_timeout()).await?;
    db::init_database_schema(&pool).await?;

    let ledger = match &config.store.primary_url {
        Some(url) => {
            let primary = db::connect_primary(url, config.store.acquire_timeout())?;
            UserLedger::with_primary(pool.clone(), Arc::new(PgUserDirectory::new(primary)))
        }
        None => UserLedger::new(pool.clone()),
    };

    let cache = CacheStore::new(pool.clone(), Arc::new(SystemClock));
    let fetcher = HttpDocumentFetcher::new(config.fetch.clone())?;
    let service = Arc::new(LookupService::new(
        cache.clone(),
        ledger,
        Arc::new(fetcher),
        config.lookup.clone(),
    ));

    // Expired entries are evicted lazily on read; this keeps unread ones from piling up
    let purge_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired cache entries"),
                Err(e) => error!(error = %e, "Failed to purge expired cache entries"),
            }
        }
    });

    let bot = Bot::new(config.telegram_token.clone());
    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<PaperDialogueState>, PaperDialogueState>()
                .endpoint(bot::message_handler),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<PaperDialogueState>, PaperDialogueState>()
                .endpoint(bot::callback_handler),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<PaperDialogueState>::new(), service])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    purge_task.abort();
    pool.close().await;
    info!("Paperbot stopped");

    Ok(())
}
