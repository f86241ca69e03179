use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use minijinja::context;
use serde::{Deserialize, Serialize};

use crate::{
    csrf::{CsrfForm, CsrfToken},
    ctx::TraceId,
    db::{self, DB},
    errors::{Error, Result},
    state::AppState,
    views::Views,
};

use super::{field_messages, handlers, CreateNoteForm, EditNoteForm, NewNote, Note, NoteId, NoteIdQuery, NoteRules};

const NOTES: &str = "/notes";

/// The confirmation form carries nothing but the anti-forgery token.
#[derive(Debug, Deserialize)]
struct DeleteNoteForm {}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(notes_view))
        .route(NOTES, get(notes_view))
        .route("/notes/create", get(create_note_view).post(create_note))
        .route("/notes/edit", get(edit_note_view).post(edit_note))
        .route("/notes/delete", get(delete_note_view).post(delete_note))
        .with_state(state)
}

async fn notes_view(view: Views, State(db): State<DB>, trace_id: TraceId) -> Response {
    match handlers::find_notes(&db).await {
        Ok(notes) => view.response("notes.html", context! { notes => notes }),
        Err(err) => error_page(&view, &trace_id, Error::PersistenceRead(err)),
    }
}

async fn create_note_view(view: Views, csrf_token: CsrfToken) -> Response {
    form_page(&view, "note-create.html", &CreateNoteForm::default(), &csrf_token, None)
}

async fn create_note(
    view: Views,
    State(db): State<DB>,
    State(rules): State<NoteRules>,
    CsrfForm { form, token }: CsrfForm<CreateNoteForm>,
) -> Response {
    let created = match rules.validate(&form.title, &form.content) {
        Ok(()) => handlers::create_note(&db, NewNote::from(form.clone()))
            .await
            .map_err(Error::PersistenceWrite),
        Err(errors) => Err(Error::Validation(errors)),
    };

    match created {
        Ok(note) => {
            tracing::info!("created note {}", note.id);
            Redirect::to(NOTES).into_response()
        }
        Err(err) => form_page(&view, "note-create.html", &form, &token, Some(err)),
    }
}

async fn edit_note_view(
    view: Views,
    State(db): State<DB>,
    trace_id: TraceId,
    csrf_token: CsrfToken,
    Query(NoteIdQuery { id }): Query<NoteIdQuery>,
) -> Response {
    match find_note(&db, id).await {
        Ok(note) => form_page(&view, "note-edit.html", &EditNoteForm::from(&note), &csrf_token, None),
        Err(err) => error_page(&view, &trace_id, err),
    }
}

async fn edit_note(
    view: Views,
    State(db): State<DB>,
    State(rules): State<NoteRules>,
    Query(NoteIdQuery { id }): Query<NoteIdQuery>,
    CsrfForm { form, token }: CsrfForm<EditNoteForm>,
) -> Response {
    let Some(note_id) = id.filter(|id| form.id == Some(*id)) else {
        tracing::warn!("note id mismatch in edit: route {id:?}, form {:?}", form.id);
        return Error::NotFound("Note id mismatch".into()).into_response();
    };

    let updated = match rules.validate(&form.title, &form.content) {
        Ok(()) => handlers::update_note(&db, note_id, form.title.clone(), form.content.clone())
            .await
            .map_err(Error::PersistenceWrite),
        Err(errors) => Err(Error::Validation(errors)),
    };

    match updated {
        Ok(note) => {
            tracing::info!("updated note {}", note.id);
            Redirect::to(NOTES).into_response()
        }
        Err(err) => form_page(&view, "note-edit.html", &form, &token, Some(err)),
    }
}

async fn delete_note_view(
    view: Views,
    State(db): State<DB>,
    trace_id: TraceId,
    csrf_token: CsrfToken,
    Query(NoteIdQuery { id }): Query<NoteIdQuery>,
) -> Response {
    match find_note(&db, id).await {
        Ok(note) => view.response("note-delete.html", context! { note => note, csrf_token => csrf_token }),
        Err(err) => error_page(&view, &trace_id, err),
    }
}

async fn delete_note(
    view: Views,
    State(db): State<DB>,
    trace_id: TraceId,
    Query(NoteIdQuery { id }): Query<NoteIdQuery>,
    _: CsrfForm<DeleteNoteForm>,
) -> Response {
    let Some(note_id) = id else {
        return Error::NotFound("Delete called without a note id".into()).into_response();
    };

    match handlers::delete_note(&db, note_id).await {
        Ok(deleted) => {
            match deleted {
                Some(note) => tracing::info!("deleted note {}", note.id),
                None => tracing::info!("note {note_id} already gone, nothing to delete"),
            }
            Redirect::to(NOTES).into_response()
        }
        Err(err) => error_page(&view, &trace_id, Error::PersistenceWrite(err)),
    }
}

async fn find_note(db: &DB, id: Option<NoteId>) -> Result<Note> {
    let note_id = id.ok_or_else(|| Error::NotFound("Called without a note id".into()))?;

    handlers::get_note(db, note_id).await.map_err(|err| match err {
        db::Error::NotFound(message) => Error::NotFound(message),
        err => Error::PersistenceRead(err),
    })
}

/// Read and delete failures end on the generic error page; not-found stays a plain 404.
fn error_page(view: &Views, trace_id: &TraceId, err: Error) -> Response {
    match err {
        Error::NotFound(_) => err.into_response(),
        err => {
            tracing::error!(trace_id = %trace_id, "{err}");
            view.error_page(trace_id)
        }
    }
}

/// Renders a note form with whatever the submitter entered. Write failures are logged and shown as
/// a form-level message only.
fn form_page<F: Serialize>(
    view: &Views,
    template: &str,
    form: &F,
    csrf_token: &CsrfToken,
    err: Option<Error>,
) -> Response {
    let errors = match err {
        None => BTreeMap::new(),
        Some(Error::Validation(errors)) => field_messages(&errors),
        Some(err) => {
            tracing::error!("{err}");
            BTreeMap::from([("form".to_string(), "Unable to save changes. Try again.".to_string())])
        }
    };

    view.response(template, context! { note => form, errors => errors, csrf_token => csrf_token })
}
