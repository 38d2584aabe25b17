use sqlx::postgres::PgPoolOptions;
use warp::Filter;

use reseptit::{handle_rejection, routes, Config};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = sqlx::migrate!().run(&pool).await {
        log::error!("failed to run migrations: {e}");
        std::process::exit(1);
    }

    let addr = config.bind_addr;
    log::info!("listening on {addr}");

    warp::serve(routes(pool, config).recover(handle_rejection))
        .run(addr)
        .await;
}
