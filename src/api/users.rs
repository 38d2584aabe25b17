use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::{reply, Filter, Rejection, Reply};

use crate::authentication::jwt::{generate_session_token, SessionData};
use crate::authentication::middleware::{with_config, with_db, with_session};
use crate::config::Config;
use crate::constants::MAX_JSON_BODY_BYTES;
use crate::database::actions::users;
use crate::error::ApiError;
use crate::serializers::{RegisterUserPayload, TokenPayload, UpdateProfilePayload, UserOut};

pub fn routes(
    pool: Pool<Postgres>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret = config.session_secret.clone().into_bytes();

    let create = warp::path!("user" / "create")
        .and(warp::post())
        .and(json_body())
        .and(with_db(pool.clone()))
        .and_then(create_user);

    let token = warp::path!("user" / "token")
        .and(warp::post())
        .and(json_body())
        .and(with_db(pool.clone()))
        .and(with_config(config))
        .and_then(create_token);

    let me_detail = warp::path!("user" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_db(pool.clone()))
        .and_then(retrieve_me);

    let me_update = warp::path!("user" / "me")
        .and(warp::patch())
        .and(with_session(secret))
        .and(json_body())
        .and(with_db(pool))
        .and_then(update_me);

    create.or(token).or(me_detail).or(me_update)
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_BYTES).and(warp::body::json())
}

async fn create_user(
    payload: RegisterUserPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    payload.validate()?;

    let user = users::create_user(&payload.email, &payload.password, &payload.name, &pool).await?;
    log::info!("created account for user {}", user.id);

    Ok(reply::with_status(
        reply::json(&UserOut::from(user)),
        StatusCode::CREATED,
    ))
}

async fn create_token(
    payload: TokenPayload,
    pool: Pool<Postgres>,
    config: Config,
) -> Result<impl Reply, Rejection> {
    let user = users::verify_credentials(&payload.email, &payload.password, &pool)
        .await?
        .ok_or_else(|| {
            ApiError::validation(
                "non_field_errors",
                "Unable to authenticate with provided credentials.",
            )
        })?;

    let token = generate_session_token(&user, config.session_secret.as_bytes())?;

    Ok(reply::json(&serde_json::json!({ "token": token })))
}

async fn retrieve_me(session: SessionData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let user = users::get_user_by_id(&pool, session.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(String::from("User no longer exists.")))?;

    Ok(reply::json(&UserOut::from(user)))
}

async fn update_me(
    session: SessionData,
    payload: UpdateProfilePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    payload.validate()?;

    let user = users::update_profile(
        session.user_id,
        payload.email.as_deref(),
        payload.name.as_deref(),
        payload.password.as_deref(),
        &pool,
    )
    .await?
    .ok_or_else(|| ApiError::Unauthorized(String::from("User no longer exists.")))?;

    Ok(reply::json(&UserOut::from(user)))
}
