use axum::Router;
use minijinja::Environment;
use tower_sessions::{
    cookie::{time::Duration, SameSite},
    Expiry, SessionManagerLayer,
};

use crate::{
    db::{SqliteStore, DB},
    errors,
    notes::{self, NoteRules},
    shared::tracing::add_tracing_layer,
    state::AppState,
    views::{self, Views},
};

pub fn create_app(db: DB, rules: NoteRules) -> errors::Result<Router> {
    let session_layer = SessionManagerLayer::new(SqliteStore::new(db.clone()))
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)));

    let mut env = Environment::new();
    views::add_templates(&mut env)?;

    let state = AppState {
        conn: db,
        views: Views::new(env),
        rules,
    };

    let app = Router::new().merge(notes::router(state)).layer(session_layer);

    Ok(add_tracing_layer(app))
}
