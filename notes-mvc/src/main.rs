mod app;
mod config;
mod db;
mod errors;
mod notes;
mod shared;
mod state;

use std::time::Duration;

use tokio::net::TcpListener;

pub use app::create_app;
pub use shared::{csrf, ctx, views};

use config::init_config;
use db::{init_db, SqliteStore};
use notes::NoteRules;

#[tokio::main]
async fn main() -> errors::Result<()> {
    let config = init_config()?;

    shared::tracing::setup_tracing(config.log_json);

    let conn = init_db(&config.database_url).await?;

    tokio::spawn(SqliteStore::new(conn.clone()).continuously_delete_expired(Duration::from_secs(60)));

    let app = create_app(conn, NoteRules::from(config))?;

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;

    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
