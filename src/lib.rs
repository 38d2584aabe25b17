mod database {
    pub mod actions;
    pub mod error;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
}
mod api {
    pub mod attributes;
    pub mod recipes;
    pub mod routes;
    pub mod users;
}
mod config;
mod constants;
mod error;
mod media;
mod serializers;

pub use api::routes::routes;
pub use authentication::*;
pub use config::Config;
pub use constants::*;
pub use database::{actions, schema};
pub use error::{handle_rejection, ApiError};
pub use media::{recipe_image_path, remove_image, save_image};
pub use serializers::*;
