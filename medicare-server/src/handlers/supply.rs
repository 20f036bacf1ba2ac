//! Supply inventory: categories, items, barcode lookup and the price list.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use medicare_core::{
    supply::{CategoryFields, ItemFields},
    AccountKind, Category, HistoryRecord, Item, MedicareError, PriceList, Result, Topic,
};
use medicare_store::document_store;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{extract_body, message, new_id, parse, publish, reject, ApiResult};
use crate::auth::{require, Actor};
use crate::realtime::Notice;
use crate::AppState;

const CATEGORIES: &str = "supplyCategories";
const ITEMS: &str = "supplyItems";
const HISTORY_ROUTE: &str = "supply";

#[derive(Debug, Deserialize)]
pub struct BarcodeQuery {
    barcode: Option<String>,
}

fn load_category(state: &AppState, id: &str) -> Result<Category> {
    document_store::load::<Category>(state.store.as_ref(), CATEGORIES, id)?
        .ok_or_else(|| MedicareError::not_found("Category"))
}

fn load_item(state: &AppState, id: &str) -> Result<Item> {
    document_store::load::<Item>(state.store.as_ref(), ITEMS, id)?
        .ok_or_else(|| MedicareError::not_found("Item"))
}

fn items_of(state: &AppState, category_id: &str) -> Result<Vec<Item>> {
    let items = document_store::load_all::<Item>(state.store.as_ref(), ITEMS)?;
    Ok(items
        .into_iter()
        .filter(|item| item.category_id == category_id)
        .collect())
}

/// Real barcodes are unique across items; the placeholder is not checked.
fn ensure_barcode_free(state: &AppState, barcode: Option<&str>, except: Option<&str>) -> Result<()> {
    let Some(barcode) =
        barcode.filter(|b| !b.trim().is_empty() && *b != medicare_core::supply::NO_BARCODE)
    else {
        return Ok(());
    };
    let holders = state.store.find_by(ITEMS, "barcode", &json!(barcode))?;
    if holders.iter().any(|(id, _)| Some(id.as_str()) != except) {
        return Err(MedicareError::conflict("Barcode already used"));
    }
    Ok(())
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult {
    let categories =
        document_store::load_all::<Category>(state.store.as_ref(), CATEGORIES).map_err(reject)?;
    Ok(Json(categories).into_response())
}

pub async fn read_category(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let category = load_category(&state, &id).map_err(reject)?;
    Ok(Json(category).into_response())
}

pub async fn category_items(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let items = load_category(&state, &id)
        .and_then(|category| items_of(&state, &category.id))
        .map_err(reject)?;
    Ok(Json(items).into_response())
}

/// POST /api/supply/categories
pub async fn create_category(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    add_category(&state, actor.as_ref(), body).map_err(reject)
}

fn add_category(state: &AppState, actor: Option<&Actor>, body: Value) -> Result<Response> {
    require(actor, &[AccountKind::Staff])?;
    let fields: CategoryFields = parse(body)?;
    let category = fields.into_category(new_id())?;
    document_store::save(state.store.as_ref(), CATEGORIES, &category.id, &category)?;

    publish(
        state,
        actor,
        vec![Notice::refresh(Topic::supply_categories())],
        HistoryRecord::new(
            HISTORY_ROUTE,
            "categories",
            "create",
            format!("Category: \"{}\" Created", category.name),
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Category created successfully",
            "category": category,
        })),
    )
        .into_response())
}

/// PATCH /api/supply/categories/{id}
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    amend_category(&state, actor.as_ref(), &id, body).map_err(reject)
}

fn amend_category(state: &AppState, actor: Option<&Actor>, id: &str, body: Value) -> Result<Response> {
    require(actor, &[AccountKind::Staff])?;
    let fields: CategoryFields = parse(body)?;
    let mut category = load_category(state, id)?;
    fields.apply(&mut category)?;
    document_store::save(state.store.as_ref(), CATEGORIES, id, &category)?;

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::supply_categories()),
            Notice::refresh(Topic::supply_category(id)),
        ],
        HistoryRecord::new(
            HISTORY_ROUTE,
            "categories",
            "update",
            format!("Category: \"{}\" Updated", category.name),
        ),
    );

    Ok(Json(json!({
        "message": "Category updated successfully",
        "category": category,
    }))
    .into_response())
}

/// DELETE /api/supply/categories/{id}
pub async fn remove_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    drop_category(&state, actor.as_ref(), &id).map_err(reject)
}

fn drop_category(state: &AppState, actor: Option<&Actor>, id: &str) -> Result<Response> {
    require(actor, &[AccountKind::Staff])?;
    let category = load_category(state, id)?;

    let items = state.store.find_by(ITEMS, "categoryID", &json!(id))?;
    for (item_id, _) in &items {
        state.store.delete(ITEMS, item_id)?;
    }
    state.store.delete(CATEGORIES, id)?;
    tracing::info!(category = %id, items = items.len(), "Deleted supply category");

    publish(
        state,
        actor,
        vec![
            Notice::refresh(Topic::supply_categories()),
            Notice::redirect(Topic::supply_category(id)),
        ],
        HistoryRecord::new(
            HISTORY_ROUTE,
            "categories",
            "delete",
            format!("Category: \"{}\" Deleted", category.name),
        ),
    );

    Ok(message(StatusCode::OK, "Category deleted successfully"))
}

pub async fn list_items(State(state): State<Arc<AppState>>) -> ApiResult {
    let items = document_store::load_all::<Item>(state.store.as_ref(), ITEMS).map_err(reject)?;
    Ok(Json(items).into_response())
}

/// POST /api/supply/items
pub async fn create_item(State(state): State<Arc<AppState>>, request: Request) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    add_item(&state, actor.as_ref(), body).map_err(reject)
}

fn add_item(state: &AppState, actor: Option<&Actor>, body: Value) -> Result<Response> {
    require(actor, &[AccountKind::Staff])?;
    let fields: ItemFields = parse(body)?;
    let item = fields.into_item(new_id())?;

    load_category(state, &item.category_id)?;
    ensure_barcode_free(state, Some(item.barcode.as_str()), None)?;
    document_store::save(state.store.as_ref(), ITEMS, &item.id, &item)?;

    publish(
        state,
        actor,
        vec![Notice::refresh(Topic::supply_category(&item.category_id))],
        HistoryRecord::new(
            HISTORY_ROUTE,
            "items",
            "create",
            format!("Item: \"{}\" Created", item.name),
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Item created successfully",
            "item": item,
        })),
    )
        .into_response())
}

/// PATCH /api/supply/items/{id}
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    let body = extract_body(request).await?;
    amend_item(&state, actor.as_ref(), &id, body).map_err(reject)
}

fn amend_item(state: &AppState, actor: Option<&Actor>, id: &str, body: Value) -> Result<Response> {
    require(actor, &[AccountKind::Staff])?;
    let fields: ItemFields = parse(body)?;
    let mut item = load_item(state, id)?;
    let previous_category = item.category_id.clone();

    if let Some(category_id) = &fields.category_id
        && *category_id != previous_category
    {
        load_category(state, category_id)?;
    }
    ensure_barcode_free(state, fields.barcode.as_deref(), Some(id))?;

    fields.apply(&mut item)?;
    document_store::save(state.store.as_ref(), ITEMS, id, &item)?;

    let mut notices = vec![Notice::refresh(Topic::supply_category(&previous_category))];
    if item.category_id != previous_category {
        notices.push(Notice::refresh(Topic::supply_category(&item.category_id)));
    }
    publish(
        state,
        actor,
        notices,
        HistoryRecord::new(
            HISTORY_ROUTE,
            "items",
            "update",
            format!("Item: \"{}\" Updated", item.name),
        ),
    );

    Ok(Json(json!({
        "message": "Item updated successfully",
        "item": item,
    }))
    .into_response())
}

/// DELETE /api/supply/items/{id}
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult {
    let actor = Actor::from_request(&request);
    drop_item(&state, actor.as_ref(), &id).map_err(reject)
}

fn drop_item(state: &AppState, actor: Option<&Actor>, id: &str) -> Result<Response> {
    require(actor, &[AccountKind::Staff])?;
    let item = load_item(state, id)?;
    state.store.delete(ITEMS, id)?;

    publish(
        state,
        actor,
        vec![Notice::refresh(Topic::supply_category(&item.category_id))],
        HistoryRecord::new(
            HISTORY_ROUTE,
            "items",
            "delete",
            format!("Item: \"{}\" Deleted", item.name),
        ),
    );

    Ok(message(StatusCode::OK, "Item deleted successfully"))
}

/// GET /api/supply/barcode?barcode=...
pub async fn find_by_barcode(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BarcodeQuery>,
) -> ApiResult {
    let barcode = query
        .barcode
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| reject(MedicareError::validation("Missing barcode")))?;

    let (id, doc) = state
        .store
        .find_by(ITEMS, "barcode", &json!(barcode))
        .map_err(reject)?
        .into_iter()
        .next()
        .ok_or_else(|| reject(MedicareError::not_found("Item")))?;
    let item: Item = document_store::decode(ITEMS, &id, doc).map_err(reject)?;
    Ok(Json(item).into_response())
}

/// GET /api/prices
pub async fn price_list(State(state): State<Arc<AppState>>) -> ApiResult {
    let categories =
        document_store::load_all::<Category>(state.store.as_ref(), CATEGORIES).map_err(reject)?;
    let mut items = document_store::load_all::<Item>(state.store.as_ref(), ITEMS).map_err(reject)?;

    let mut prices = Vec::with_capacity(categories.len());
    for category in categories {
        let (own, rest): (Vec<Item>, Vec<Item>) = items
            .into_iter()
            .partition(|item| item.category_id == category.id);
        items = rest;
        prices.push(PriceList {
            category,
            items: own,
        });
    }
    Ok(Json(prices).into_response())
}
