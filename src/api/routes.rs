use sqlx::{Pool, Postgres};
use warp::{Filter, Rejection, Reply};

use crate::api::{attributes, recipes, users};
use crate::config::Config;

/// The full REST surface. Callers attach [`crate::handle_rejection`] via
/// `.recover(...)` before serving.
pub fn routes(
    pool: Pool<Postgres>,
    config: Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let media = warp::path("media").and(warp::fs::dir(config.media_root.clone()));

    users::routes(pool.clone(), config.clone())
        .or(recipes::routes(pool.clone(), config.clone()))
        .or(attributes::tag_routes(pool.clone(), config.clone()))
        .or(attributes::ingredient_routes(pool, config))
        .or(media)
}
