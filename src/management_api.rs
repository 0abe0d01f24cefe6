// src/management_api.rs - URL management endpoints
use crate::error::{RedirectorError, Result};
use crate::store::UrlStore;
use crate::validate::validate_new_url;

use bytes::Bytes;
use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Serialize, Deserialize)]
pub struct AddUrlRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlIdRequest {
    #[serde(default)]
    pub id: i64,
}

fn with_store(
    store: Arc<dyn UrlStore>,
) -> impl Filter<Extract = (Arc<dyn UrlStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

/// Management routes. Any method is accepted on these paths; the mutating
/// ones read a JSON body.
pub fn routes(
    store: Arc<dyn UrlStore>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    // /urls - List all URLs with their selection flag
    let list_urls = warp::path!("urls")
        .and(with_store(store.clone()))
        .and_then(handle_list_urls);

    // /add-url - Validate and store a new URL. Answers with the stored row,
    // including its assigned id, not an echo of the request body.
    let add_url = warp::path!("add-url")
        .and(warp::body::bytes())
        .and(with_store(store.clone()))
        .and_then(handle_add_url);

    // /delete-url - Remove a URL by id
    let delete_url = warp::path!("delete-url")
        .and(warp::body::bytes())
        .and(with_store(store.clone()))
        .and_then(handle_delete_url);

    // /select-url - Point the selection at an id
    let select_url = warp::path!("select-url")
        .and(warp::body::bytes())
        .and(with_store(store.clone()))
        .and_then(handle_select_url);

    // /selected-url - The currently selected URL or null
    let selected_url = warp::path!("selected-url")
        .and(with_store(store))
        .and_then(handle_selected_url);

    list_urls
        .or(add_url)
        .unify()
        .or(delete_url)
        .unify()
        .or(select_url)
        .unify()
        .or(selected_url)
        .unify()
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

fn respond<T: Serialize>(result: Result<T>) -> warp::reply::Response {
    match result {
        Ok(value) => warp::reply::json(&value).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_list_urls(
    store: Arc<dyn UrlStore>,
) -> std::result::Result<warp::reply::Response, Rejection> {
    counter!("redirector.management.requests", 1, "operation" => "list");
    Ok(respond(store.list_urls().await))
}

async fn handle_add_url(
    body: Bytes,
    store: Arc<dyn UrlStore>,
) -> std::result::Result<warp::reply::Response, Rejection> {
    counter!("redirector.management.requests", 1, "operation" => "add");

    let result = async {
        let req: AddUrlRequest = parse_body(&body)?;
        let new_url = validate_new_url(&req.url, &req.name)?;
        let created = store.insert_url(new_url).await?;
        tracing::info!("Created URL {} '{}' -> {}", created.id, created.name, created.url);
        Ok::<_, RedirectorError>(created)
    }
    .await;

    Ok(respond(result))
}

async fn handle_delete_url(
    body: Bytes,
    store: Arc<dyn UrlStore>,
) -> std::result::Result<warp::reply::Response, Rejection> {
    counter!("redirector.management.requests", 1, "operation" => "delete");

    let result = async {
        let req: UrlIdRequest = parse_body(&body)?;
        let deleted = store.delete_url(req.id).await?;
        tracing::info!("Deleted URL {} '{}'", deleted.id, deleted.name);
        Ok::<_, RedirectorError>(deleted)
    }
    .await;

    Ok(respond(result))
}

async fn handle_select_url(
    body: Bytes,
    store: Arc<dyn UrlStore>,
) -> std::result::Result<warp::reply::Response, Rejection> {
    counter!("redirector.management.requests", 1, "operation" => "select");

    let result = async {
        let req: UrlIdRequest = parse_body(&body)?;
        let selection = store.select_url(req.id).await?;
        tracing::info!("Selected URL {}", req.id);
        Ok::<_, RedirectorError>(selection)
    }
    .await;

    Ok(respond(result))
}

async fn handle_selected_url(
    store: Arc<dyn UrlStore>,
) -> std::result::Result<warp::reply::Response, Rejection> {
    counter!("redirector.management.requests", 1, "operation" => "selected");
    Ok(respond(store.selected_url().await))
}
