use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
};
use minijinja::{context, Environment, Error};

use super::ctx::TraceId;

#[derive(Debug, Clone)]
pub struct Views {
    pub env: Arc<Environment<'static>>,
}

impl Views {
    pub fn new(env: Environment<'static>) -> Self {
        let engine = Arc::new(env);
        Self { env: engine }
    }

    pub fn response<D: serde::Serialize>(&self, key: &str, data: D) -> Response {
        match self.render(key, data) {
            Ok(x) => Html(x).into_response(),
            Err(err) => {
                tracing::error!("failed to render {key}: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }

    /// The generic error page. Only the trace id reaches the client.
    pub fn error_page(&self, trace_id: &TraceId) -> Response {
        self.response("error.html", context! { request_id => trace_id.as_str() })
    }

    fn render<D: serde::Serialize>(&self, key: &str, data: D) -> Result<String, Error> {
        let template = self.env.get_template(key)?;
        template.render(&data)
    }
}

impl<ApplicationState> FromRequestParts<ApplicationState> for Views
where
    Self: FromRef<ApplicationState>,
    ApplicationState: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_: &mut Parts, state: &ApplicationState) -> Result<Self, Self::Rejection> {
        Ok(Self::from_ref(state))
    }
}

pub fn add_templates(env: &mut Environment<'static>) -> Result<(), Error> {
    env.add_template("base.html", include_str!("../views/base.html"))?;
    env.add_template("notes.html", include_str!("../views/notes.html"))?;
    env.add_template("note-form.html", include_str!("../views/note-form.html"))?;
    env.add_template("note-create.html", include_str!("../views/note-create.html"))?;
    env.add_template("note-edit.html", include_str!("../views/note-edit.html"))?;
    env.add_template("note-delete.html", include_str!("../views/note-delete.html"))?;
    env.add_template("error.html", include_str!("../views/error.html"))?;
    Ok(())
}
