//! Generic REST handlers over [`Resource`] tables.
//!
//! A collection is registered under a path segment and gets:
//! - `GET /{path}` - paginated list
//! - `POST /{path}` - create (writable collections)
//! - `GET /{path}/:id` - retrieve
//! - `PUT /{path}/:id` - full update (writable collections)
//! - `PATCH /{path}/:id` - partial update (writable collections)
//! - `DELETE /{path}/:id` - destroy (writable collections)
//! - `OPTIONS` on both - resource metadata
//!
//! Methods a collection does not register fall through to axum's 405.

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::extract::Json;
use crate::{
    db::{self, Resource, WriteResource},
    error::{Error, Result},
    AppState,
};

const READ_ONLY_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];
const LIST_METHODS: &[&str] = &["GET", "POST", "HEAD", "OPTIONS"];
const DETAIL_METHODS: &[&str] = &["GET", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number, kept as text so junk gives 404 rather than 400.
    pub page: Option<String>,
}

/// One page of a list.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

// ============================================================================
// Registration
// ============================================================================

/// Register list and detail routes that only read.
pub fn read_only<R: Resource>(router: Router<AppState>, path: &str) -> Router<AppState> {
    router
        .route(
            &format!("/{}", path),
            get(list::<R>).options(read_only_options::<R>),
        )
        .route(
            &format!("/{}/:id", path),
            get(retrieve::<R>).options(read_only_options::<R>),
        )
}

/// Register the full set of CRUD routes.
pub fn model<R: WriteResource>(router: Router<AppState>, path: &str) -> Router<AppState> {
    router
        .route(
            &format!("/{}", path),
            get(list::<R>).post(create::<R>).options(list_options::<R>),
        )
        .route(
            &format!("/{}/:id", path),
            get(retrieve::<R>)
                .put(update::<R>)
                .patch(partial_update::<R>)
                .delete(destroy::<R>)
                .options(detail_options::<R>),
        )
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse a path id; anything that is not an integer names no row.
pub fn parse_id(raw: &str, what: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| Error::NotFound(format!("{} {}", what, raw)))
}

fn parse_page(raw: Option<&str>) -> Result<i64> {
    match raw {
        None => Ok(1),
        Some(raw) => match raw.parse::<i64>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => Err(Error::NotFound(format!("Invalid page '{}'", raw))),
        },
    }
}

fn page_link(base: &str, page: i64) -> String {
    if page == 1 {
        base.to_string()
    } else {
        format!("{}?page={}", base, page)
    }
}

/// Build a page of `rows` given the total count and page number.
pub fn paginate<T>(rows: Vec<T>, count: i64, page: i64, page_size: i64, base: &str) -> Page<T> {
    let next = (page * page_size < count).then(|| page_link(base, page + 1));
    let previous = (page > 1).then(|| page_link(base, page - 1));
    Page {
        count,
        next,
        previous,
        results: rows,
    }
}

fn metadata<R: Resource>(allowed: &[&str]) -> Response {
    let body = json!({
        "name": R::NAME,
        "description": R::DESCRIPTION,
        "renders": ["application/json"],
        "parses": ["application/json"],
        "allowed_methods": allowed,
    });
    ([(header::ALLOW, allowed.join(", "))], Json(body)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn list<R: Resource>(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<R>>> {
    let page = parse_page(query.page.as_deref())?;
    let page_size = i64::from(state.api.page_size);
    let count = db::count_rows::<R>(&state.db).await?;

    let offset = (page - 1) * page_size;
    if page > 1 && offset >= count {
        return Err(Error::NotFound(format!("Page {}", page)));
    }

    let rows = db::list_rows::<R>(&state.db, page_size, offset).await?;
    let base = format!("{}{}", state.api.public_url, uri.path());

    Ok(Json(paginate(rows, count, page, page_size, &base)))
}

async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<R>> {
    let id = parse_id(&id, R::NAME)?;
    db::get_row::<R>(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("{} {}", R::NAME, id)))
}

async fn create<R: WriteResource>(
    State(state): State<AppState>,
    Json(input): Json<R::Input>,
) -> Result<(StatusCode, Json<R>)> {
    let row = db::insert_row::<R>(&state.db, input).await?;
    tracing::debug!(resource = R::NAME, "Created row");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update<R: WriteResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<R::Input>,
) -> Result<Json<R>> {
    let id = parse_id(&id, R::NAME)?;
    db::update_row::<R>(&state.db, id, input)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("{} {}", R::NAME, id)))
}

/// Merge the submitted fields over the stored row, then update as PUT would.
async fn partial_update<R: WriteResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<R>> {
    let id = parse_id(&id, R::NAME)?;
    let current = db::get_row::<R>(&state.db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", R::NAME, id)))?;

    let Value::Object(fields) = patch else {
        return Err(Error::InvalidInput("Expected a JSON object".to_string()));
    };
    let mut merged = serde_json::to_value(&current)?;
    if let Value::Object(ref mut target) = merged {
        target.extend(fields);
    }

    let input: R::Input = serde_json::from_value(merged)
        .map_err(|e| Error::Validation(e.to_string()))?;

    db::update_row::<R>(&state.db, id, input)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("{} {}", R::NAME, id)))
}

async fn destroy<R: WriteResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, R::NAME)?;
    if !db::delete_row::<R>(&state.db, id).await? {
        return Err(Error::NotFound(format!("{} {}", R::NAME, id)));
    }
    tracing::debug!(resource = R::NAME, id, "Deleted row");
    Ok(StatusCode::NO_CONTENT)
}

async fn read_only_options<R: Resource>() -> Response {
    metadata::<R>(READ_ONLY_METHODS)
}

async fn list_options<R: Resource>() -> Response {
    metadata::<R>(LIST_METHODS)
}

async fn detail_options<R: Resource>() -> Response {
    metadata::<R>(DETAIL_METHODS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Some(1))]
    #[case("-99", Some(-99))]
    #[case("abc", None)]
    #[case("1.5", None)]
    fn test_parse_id(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_id(raw, "Post").ok(), expected);
    }

    #[rstest]
    #[case(None, Some(1))]
    #[case(Some("3"), Some(3))]
    #[case(Some("0"), None)]
    #[case(Some("last"), None)]
    fn test_parse_page(#[case] raw: Option<&str>, #[case] expected: Option<i64>) {
        assert_eq!(parse_page(raw).ok(), expected);
    }

    #[test]
    fn test_paginate_links() {
        let base = "http://localhost:8000/api/regions";

        let first = paginate(vec![1, 2], 5, 1, 2, base);
        assert_eq!(first.next.as_deref(), Some("http://localhost:8000/api/regions?page=2"));
        assert!(first.previous.is_none());

        let second = paginate(vec![3, 4], 5, 2, 2, base);
        assert_eq!(second.previous.as_deref(), Some(base));
        assert_eq!(second.next.as_deref(), Some("http://localhost:8000/api/regions?page=3"));

        let last = paginate(vec![5], 5, 3, 2, base);
        assert!(last.next.is_none());
        assert_eq!(last.count, 5);
    }
}
