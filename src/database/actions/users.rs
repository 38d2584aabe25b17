use sqlx::{Pool, Postgres};

use crate::authentication::cryptography::{hash_password, verify_password};
use crate::database::error::QueryError;
use crate::database::schema::User;
use crate::error::ApiError;
use crate::serializers::normalize_email;

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: i32) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user account. The email is normalized before the uniqueness
/// check and the password is hashed before anything touches the database.
pub async fn create_user(
    email: &str,
    password: &str,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    let email = normalize_email(email)?;
    let password = hash_password(password)?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, password, name)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&email)
    .bind(password)
    .bind(name)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| ApiError::validation("email", "user with this email already exists."))
}

/// As `create_user`, additionally granting the staff and superuser flags.
pub async fn create_superuser(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    let email = normalize_email(email)?;
    let password = hash_password(password)?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, password, is_staff, is_superuser)
        VALUES ($1, $2, TRUE, TRUE)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&email)
    .bind(password)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| ApiError::validation("email", "user with this email already exists."))
}

/// Returns the matching active user only when the password verifies;
/// every other outcome is `None`.
pub async fn verify_credentials(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, ApiError> {
    let email = match normalize_email(email) {
        Ok(email) => email,
        Err(_) => return Ok(None),
    };

    let user = get_user_by_email(pool, &email).await?;
    let user = match user {
        Some(user) if user.is_active => user,
        _ => return Ok(None),
    };

    if !verify_password(password, &user.password)? {
        return Ok(None);
    }

    Ok(Some(user))
}

/// Updates the caller's own profile. A password, when present, is re-hashed;
/// an email, when present, is re-normalized and must stay unique.
pub async fn update_profile(
    user_id: i32,
    email: Option<&str>,
    name: Option<&str>,
    password: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, ApiError> {
    let email = match email {
        Some(email) => Some(normalize_email(email)?),
        None => None,
    };
    let password = match password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let row: Option<User> = sqlx::query_as(
        "
        UPDATE users SET
        email = COALESCE($2, email),
        name = COALESCE($3, name),
        password = COALESCE($4, password)
        WHERE id = $1
        RETURNING *;
    ",
    )
    .bind(user_id)
    .bind(email)
    .bind(name)
    .bind(password)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::validation("email", "user with this email already exists.")
        }
        _ => QueryError::from(e).into(),
    })?;

    Ok(row)
}
