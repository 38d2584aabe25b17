use std::collections::HashMap;
use std::path::PathBuf;

use bytes::BufMut;
use futures::TryStreamExt;
use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::{reply, Filter, Rejection, Reply};

use crate::authentication::jwt::SessionData;
use crate::authentication::middleware::{with_db, with_session};
use crate::config::Config;
use crate::constants::{MAX_IMAGE_BYTES, MAX_JSON_BODY_BYTES};
use crate::database::actions::{attributes, recipes};
use crate::database::schema::{AttributeKind, Recipe};
use crate::error::ApiError;
use crate::media;
use crate::serializers::{parse_id_list, RecipeDetail, RecipeListItem, RecipePayload};

pub fn routes(
    pool: Pool<Postgres>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret = config.session_secret.clone().into_bytes();
    let media_root = config.media_root;

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_db(pool.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_db(pool.clone()))
        .and_then(create_recipe);

    let detail = warp::path!("recipes" / i32)
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_db(pool.clone()))
        .and_then(retrieve_recipe);

    let replace = warp::path!("recipes" / i32)
        .and(warp::put())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_db(pool.clone()))
        .and_then(replace_recipe);

    let update = warp::path!("recipes" / i32)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_db(pool.clone()))
        .and_then(patch_recipe);

    let delete = warp::path!("recipes" / i32)
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_db(pool.clone()))
        .and_then(delete_recipe);

    let upload = warp::path!("recipes" / i32 / "upload-image")
        .and(warp::post())
        .and(with_session(secret))
        .and(warp::multipart::form().max_length(MAX_IMAGE_BYTES))
        .and(with_db(pool))
        .and(warp::any().map(move || media_root.clone()))
        .and_then(upload_image);

    list.or(create)
        .or(detail)
        .or(replace)
        .or(update)
        .or(delete)
        .or(upload)
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_BYTES).and(warp::body::json())
}

/// Loads the nested representation for one recipe.
async fn detail_for(recipe: Recipe, pool: &Pool<Postgres>) -> Result<RecipeDetail, ApiError> {
    let tags = attributes::list_recipe_attributes(recipe.id, AttributeKind::Tag, pool).await?;
    let ingredients =
        attributes::list_recipe_attributes(recipe.id, AttributeKind::Ingredient, pool).await?;

    Ok(RecipeDetail::from_parts(recipe, tags, ingredients))
}

async fn list_recipes(
    session: SessionData,
    params: HashMap<String, String>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let tag_ids = id_filter("tags", &params)?;
    let ingredient_ids = id_filter("ingredients", &params)?;

    let rows = recipes::list_recipes(session.user_id, tag_ids, ingredient_ids, &pool).await?;
    let rows: Vec<RecipeListItem> = rows.into_iter().map(RecipeListItem::from).collect();

    Ok(reply::json(&rows))
}

/// A present-but-empty parameter is treated as no filter at all.
fn id_filter(
    field: &str,
    params: &HashMap<String, String>,
) -> Result<Option<Vec<i32>>, ApiError> {
    match params.get(field) {
        Some(raw) => {
            let ids = parse_id_list(field, raw)?;
            Ok(if ids.is_empty() { None } else { Some(ids) })
        }
        None => Ok(None),
    }
}

async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let changes = payload.into_changes()?;
    changes.require_complete()?;

    let recipe = recipes::create_recipe(session.user_id, changes, &pool).await?;
    let detail = detail_for(recipe, &pool).await?;

    Ok(reply::with_status(
        reply::json(&detail),
        StatusCode::CREATED,
    ))
}

async fn retrieve_recipe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::get_recipe(session.user_id, id, &pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    let detail = detail_for(recipe, &pool).await?;

    Ok(reply::json(&detail))
}

async fn replace_recipe(
    id: i32,
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    apply_update(id, session, payload, pool, false).await
}

async fn patch_recipe(
    id: i32,
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    apply_update(id, session, payload, pool, true).await
}

async fn apply_update(
    id: i32,
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
    partial: bool,
) -> Result<reply::Json, Rejection> {
    let changes = payload.into_changes()?;
    if !partial {
        changes.require_complete()?;
    }

    let recipe = recipes::update_recipe(session.user_id, id, changes, &pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    let detail = detail_for(recipe, &pool).await?;

    Ok(reply::json(&detail))
}

async fn delete_recipe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let deleted = recipes::delete_recipe(session.user_id, id, &pool).await?;
    if !deleted {
        return Err(ApiError::NotFound.into());
    }

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

async fn upload_image(
    id: i32,
    session: SessionData,
    form: FormData,
    pool: Pool<Postgres>,
    media_root: PathBuf,
) -> Result<impl Reply, Rejection> {
    // 404 before touching the stream; foreign-owned ids look missing.
    recipes::get_recipe(session.user_id, id, &pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let (filename, data) = read_image_part(form).await?;
    let filename =
        filename.ok_or_else(|| ApiError::validation("image", "Upload a valid image."))?;

    let relative = media::recipe_image_path(&filename)?;
    if data.is_empty() {
        return Err(ApiError::validation("image", "The submitted file is empty.").into());
    }

    media::save_image(&media_root, &relative, &data).await?;

    let (recipe, previous) = recipes::set_recipe_image(session.user_id, id, &relative, &pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(previous) = previous {
        media::remove_image(&media_root, &previous).await;
    }
    log::info!("stored image for recipe {} ({} bytes)", recipe.id, data.len());

    Ok(reply::json(&serde_json::json!({
        "id": recipe.id,
        "image": recipe.image,
    })))
}

/// Drains the form and returns the `image` part's client filename and raw
/// bytes. Parts are consumed in stream order.
async fn read_image_part(form: FormData) -> Result<(Option<String>, Vec<u8>), ApiError> {
    let parts: Vec<(String, Option<String>, Vec<u8>)> = form
        .and_then(|mut part: Part| async move {
            let mut data = Vec::new();
            while let Some(content) = part.data().await {
                data.put(content?);
            }
            Ok((
                part.name().to_string(),
                part.filename().map(str::to_owned),
                data,
            ))
        })
        .try_collect()
        .await
        .map_err(|e| ApiError::validation("image", &format!("Malformed multipart body: {e}")))?;

    parts
        .into_iter()
        .find(|(name, _, _)| name == "image")
        .map(|(_, filename, data)| (filename, data))
        .ok_or_else(|| ApiError::validation("image", "No image was submitted."))
}
