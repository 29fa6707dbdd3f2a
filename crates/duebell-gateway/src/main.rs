use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use duebell_channels::{Channel, ChannelStateMachine, SqliteSessionStore};
use duebell_scheduler::{DispatchSettings, Dispatcher, ReminderScheduler, ReminderStore, SendWindow};
use tracing::{info, warn};

mod app;
mod bridge;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duebell_gateway=info,duebell_scheduler=info,tower_http=debug".into()),
        )
        .init();

    // load config: DUEBELL_CONFIG env > ~/.duebell/duebell.toml
    let config_path = std::env::var("DUEBELL_CONFIG").ok();
    let config =
        duebell_core::DuebellConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            duebell_core::DuebellConfig::default()
        });

    // a bad send time or zone would mis-schedule every reminder; refuse to start
    let window = SendWindow::parse(&config.reminders.send_time, &config.reminders.timezone)?;
    info!(
        send_time = %window.time(),
        timezone = %window.timezone(),
        "reminder send window"
    );

    // initialize SQLite database: single file for all subsystems
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    migrate(db_path)?;
    info!("database migrations complete");

    // build subsystems; each gets its own connection
    let session = Arc::new(ChannelStateMachine::new(SqliteSessionStore::new(
        open_conn(db_path)?,
    )?));
    let reminders = ReminderStore::new(open_conn(db_path)?)?;
    let scheduler = ReminderScheduler::new(reminders.clone(), window);

    let channel: Arc<dyn Channel> = match config.whatsapp.bridge_url.as_deref() {
        Some(url) => {
            info!(bridge = %url, "whatsapp bridge configured");
            Arc::new(bridge::BridgeChannel::new(
                url,
                Duration::from_millis(config.dispatch.send_timeout_ms),
            )?)
        }
        None => {
            warn!("whatsapp.bridge_url not set, reminders will stay pending");
            Arc::new(bridge::DisabledChannel)
        }
    };

    let dispatcher = Dispatcher::new(
        reminders,
        session.clone(),
        channel,
        DispatchSettings {
            default_country_code: config.whatsapp.default_country_code.clone(),
            send_timeout: Duration::from_millis(config.dispatch.send_timeout_ms),
            interval: Duration::from_secs(config.dispatch.interval_secs.max(1)),
        },
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, session, scheduler));
    let router = app::build_router(state);

    // spawn dispatcher loop in background
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let dispatch_task = tokio::spawn(dispatcher.run(shutdown_rx));

    info!("Duebell gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // signal dispatcher to stop and let an in-flight pass finish
    let _ = shutdown_tx.send(true);
    let _ = dispatch_task.await;
    Ok(())
}

/// Switch the file to WAL and run all schema migrations (idempotent).
/// The bootstrap connection is closed on return.
fn migrate(path: &str) -> anyhow::Result<()> {
    let db = rusqlite::Connection::open(path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    duebell_channels::db::init_db(&db)?;
    duebell_scheduler::db::init_db(&db)?;
    Ok(())
}

fn open_conn(path: &str) -> rusqlite::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent_and_releases_its_connection() {
        let dir = std::env::temp_dir().join(format!("duebell-migrate-{}", std::process::id()));
        let path = dir.join("nested").join("duebell.db");
        let path = path.to_str().unwrap();
        ensure_parent_dir(path);

        migrate(path).unwrap();
        migrate(path).unwrap();

        let conn = open_conn(path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('reminders', 'channel_state')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);

        // nothing else holds the file: an exclusive write lock is available at once
        conn.execute_batch("BEGIN EXCLUSIVE; COMMIT;").unwrap();
        drop(conn);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
