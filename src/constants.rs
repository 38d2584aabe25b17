pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_FIELD_LEN: usize = 255;

pub const SESSION_TTL_HOURS: i64 = 1;

pub const MAX_JSON_BODY_BYTES: u64 = 64 * 1024;
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
