//! # Bot Tests
//!
//! Drives the Telegram handlers against a local stand-in for the Bot API.

use anyhow::Result;
use paperbot::bot::callback_handler;
use paperbot::cache_store::CacheStore;
use paperbot::clock::SystemClock;
use paperbot::config::{FetchConfig, LookupConfig};
use paperbot::db::{connect_sqlite, init_database_schema};
use paperbot::dialogue::PaperDialogueState;
use paperbot::fetcher::HttpDocumentFetcher;
use paperbot::ledger::{Locale, UserLedger};
use paperbot::lookup::LookupService;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one HTTP request, body included, returning its request line
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        if buf.len() >= header_end + 4 + content_length {
            return head.lines().next().map(str::to_string);
        }
    }
}

/// Bot API that acknowledges callback answers and rejects everything else.
/// Returns the base URL and the called method names in arrival order.
async fn rejecting_bot_api() -> Result<(reqwest::Url, Arc<Mutex<Vec<String>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = reqwest::Url::parse(&format!("http://{}/", listener.local_addr()?))?;
    let methods = Arc::new(Mutex::new(Vec::new()));
    let seen = methods.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = seen.clone();
            tokio::spawn(async move {
                let Some(request_line) = read_request(&mut socket).await else {
                    return;
                };
                let method = request_line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|path| path.rsplit('/').next())
                    .unwrap_or_default()
                    .to_lowercase();
                seen.lock().unwrap().push(method.clone());

                let (status, body) = if method == "answercallbackquery" {
                    ("200 OK", r#"{"ok":true,"result":true}"#)
                } else {
                    (
                        "400 Bad Request",
                        r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
                    )
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Ok((url, methods))
}

async fn setup_service() -> Result<(TempDir, Arc<LookupService>)> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bot.db");
    let pool = connect_sqlite(path.to_str().unwrap(), Duration::from_secs(5)).await?;
    init_database_schema(&pool).await?;

    let cache = CacheStore::new(pool.clone(), Arc::new(SystemClock));
    let fetcher = HttpDocumentFetcher::new(FetchConfig::default())?;
    let service = LookupService::new(
        cache,
        UserLedger::new(pool),
        Arc::new(fetcher),
        LookupConfig::default(),
    );
    Ok((dir, Arc::new(service)))
}

fn language_callback(user_id: i64) -> Result<CallbackQuery> {
    let query = serde_json::json!({
        "id": "4382bfdwdsb323b2d9",
        "from": {"id": user_id, "is_bot": false, "first_name": "Ada", "language_code": "en"},
        "chat_instance": "-7",
        "data": "lang:fr",
        "message": {
            "message_id": 17,
            "date": 1_700_000_000,
            "chat": {"id": user_id, "type": "private", "first_name": "Ada"},
            "from": {"id": 1, "is_bot": true, "first_name": "Paperbot", "username": "paperbot"},
            "text": "Please choose your preferred language:"
        }
    });
    Ok(serde_json::from_value(query)?)
}

#[tokio::test]
async fn test_callback_answered_before_replies_fail() -> Result<()> {
    let (api_url, methods) = rejecting_bot_api().await?;
    let client = reqwest::Client::builder().no_proxy().build()?;
    let bot = Bot::with_client("12345:TEST", client).set_api_url(api_url);

    let (_dir, service) = setup_service().await?;
    let dialogue = Dialogue::new(InMemStorage::<PaperDialogueState>::new(), ChatId(7));

    let result = callback_handler(bot, language_callback(7)?, service.clone(), dialogue).await;
    assert!(result.is_err());

    let methods = methods.lock().unwrap().clone();
    assert_eq!(methods.first().map(String::as_str), Some("answercallbackquery"));
    assert!(methods.len() >= 2);

    // The preference is stored even though the reply could not be sent
    assert_eq!(service.ledger().get_user(7).await?.unwrap().locale, Locale::Fr);
    Ok(())
}
