use std::collections::HashMap;

use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::{reply, Filter, Rejection, Reply};

use crate::authentication::jwt::SessionData;
use crate::authentication::middleware::{with_db, with_session};
use crate::config::Config;
use crate::constants::MAX_JSON_BODY_BYTES;
use crate::database::actions::attributes;
use crate::database::schema::AttributeKind;
use crate::error::ApiError;
use crate::serializers::{parse_assigned_only, AttributeOut, AttributePayload};

/// Tags and ingredients have no behavioral divergence, so both route sets
/// are instances of the same kind-parameterized handlers.
pub fn tag_routes(
    pool: Pool<Postgres>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    routes_for(AttributeKind::Tag, pool, config)
}

pub fn ingredient_routes(
    pool: Pool<Postgres>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    routes_for(AttributeKind::Ingredient, pool, config)
}

fn routes_for(
    kind: AttributeKind,
    pool: Pool<Postgres>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret = config.session_secret.into_bytes();

    let list = warp::path(kind.field())
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || kind))
        .and(with_session(secret.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_db(pool.clone()))
        .and_then(list_attributes);

    let detail = warp::path(kind.field())
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || kind))
        .and(with_session(secret.clone()))
        .and(with_db(pool.clone()))
        .and_then(retrieve_attribute);

    let update = warp::path(kind.field())
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::put().or(warp::patch()).unify())
        .and(warp::any().map(move || kind))
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_db(pool.clone()))
        .and_then(update_attribute);

    let delete = warp::path(kind.field())
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(warp::any().map(move || kind))
        .and(with_session(secret))
        .and(with_db(pool))
        .and_then(delete_attribute);

    list.or(detail).or(update).or(delete)
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_BYTES).and(warp::body::json())
}

async fn list_attributes(
    kind: AttributeKind,
    session: SessionData,
    params: HashMap<String, String>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let assigned_only = parse_assigned_only(params.get("assigned_only").map(String::as_str))?;

    let rows = attributes::list_attributes(session.user_id, kind, assigned_only, &pool).await?;
    let rows: Vec<AttributeOut> = rows.into_iter().map(AttributeOut::from).collect();

    Ok(reply::json(&rows))
}

async fn retrieve_attribute(
    id: i32,
    kind: AttributeKind,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let attribute = attributes::get_attribute(session.user_id, id, kind, &pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(reply::json(&AttributeOut::from(attribute)))
}

async fn update_attribute(
    id: i32,
    kind: AttributeKind,
    session: SessionData,
    payload: AttributePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    payload.validate()?;

    let attribute = attributes::update_attribute(session.user_id, id, kind, &payload.name, &pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(reply::json(&AttributeOut::from(attribute)))
}

async fn delete_attribute(
    id: i32,
    kind: AttributeKind,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let deleted = attributes::delete_attribute(session.user_id, id, kind, &pool).await?;
    if !deleted {
        return Err(ApiError::NotFound.into());
    }

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}
