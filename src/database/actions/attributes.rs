use sqlx::{PgConnection, Pool, Postgres, Transaction};

use crate::database::error::QueryError;
use crate::database::schema::{Attribute, AttributeKind};
use crate::error::ApiError;

/// Lists the requesting user's tags or ingredients by descending name.
/// `assigned_only` restricts the listing to entries linked to at least one
/// recipe, deduplicated.
pub async fn list_attributes(
    user_id: i32,
    kind: AttributeKind,
    assigned_only: bool,
    pool: &Pool<Postgres>,
) -> Result<Vec<Attribute>, ApiError> {
    let table = kind.table();

    let rows: Vec<Attribute> = match assigned_only {
        true => {
            let link_table = kind.link_table();
            let link_column = kind.link_column();
            sqlx::query_as(&format!(
                "
                SELECT DISTINCT a.* FROM {table} a
                INNER JOIN {link_table} l ON l.{link_column} = a.id
                WHERE a.user_id = $1
                ORDER BY a.name DESC
            "
            ))
            .bind(user_id)
            .fetch_all(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?
        }
        false => {
            sqlx::query_as(&format!(
                "SELECT * FROM {table} WHERE user_id = $1 ORDER BY name DESC"
            ))
            .bind(user_id)
            .fetch_all(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?
        }
    };

    Ok(rows)
}

/// Owner-scoped lookup; foreign-owned ids are indistinguishable from
/// missing ones.
pub async fn get_attribute(
    user_id: i32,
    id: i32,
    kind: AttributeKind,
    pool: &Pool<Postgres>,
) -> Result<Option<Attribute>, ApiError> {
    let row: Option<Attribute> = sqlx::query_as(&format!(
        "SELECT * FROM {} WHERE id = $1 AND user_id = $2",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Renames an owned tag/ingredient. A rename colliding with an existing
/// (owner, name) pair is a validation error, not a silent merge.
pub async fn update_attribute(
    user_id: i32,
    id: i32,
    kind: AttributeKind,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Attribute>, ApiError> {
    let row: Option<Attribute> = sqlx::query_as(&format!(
        "UPDATE {} SET name = $3 WHERE id = $1 AND user_id = $2 RETURNING *",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .bind(name)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::validation("name", "An entry with this name already exists.")
        }
        _ => QueryError::from(e).into(),
    })?;

    Ok(row)
}

/// Deletes an owned tag/ingredient; recipe links cascade away.
pub async fn delete_attribute(
    user_id: i32,
    id: i32,
    kind: AttributeKind,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE id = $1 AND user_id = $2",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .execute(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.rows_affected() > 0)
}

/// Atomic per-user get-or-create. The upsert is a single statement against
/// the (user_id, name) constraint, so concurrent identical-name creations
/// converge on one row.
pub async fn get_or_create_attribute(
    conn: &mut PgConnection,
    user_id: i32,
    kind: AttributeKind,
    name: &str,
) -> Result<i32, ApiError> {
    let row: (i32,) = sqlx::query_as(&format!(
        "
        INSERT INTO {} (user_id, name)
        VALUES ($1, $2)
        ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id;
    ",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

/// Replaces a recipe's tag/ingredient set with the resolved entries for the
/// given names, in input order. Duplicate names resolve to one row and link
/// insertion is set-semantic. Lookups are always scoped to the requesting
/// user, so a recipe can never reference a foreign-owned entry.
pub async fn replace_recipe_attributes(
    tr: &mut Transaction<'_, Postgres>,
    user_id: i32,
    recipe_id: i32,
    kind: AttributeKind,
    names: &[String],
) -> Result<(), ApiError> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = $1",
        kind.link_table()
    ))
    .bind(recipe_id)
    .execute(&mut **tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    for name in names {
        let attribute_id = get_or_create_attribute(&mut *tr, user_id, kind, name).await?;

        sqlx::query(&format!(
            "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        ))
        .bind(recipe_id)
        .bind(attribute_id)
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    }

    Ok(())
}

/// Tags/ingredients linked to one recipe, for the detail representation.
pub async fn list_recipe_attributes(
    recipe_id: i32,
    kind: AttributeKind,
    pool: &Pool<Postgres>,
) -> Result<Vec<Attribute>, ApiError> {
    let rows: Vec<Attribute> = sqlx::query_as(&format!(
        "
        SELECT a.* FROM {} a
        INNER JOIN {} l ON l.{} = a.id
        WHERE l.recipe_id = $1
        ORDER BY a.name DESC
    ",
        kind.table(),
        kind.link_table(),
        kind.link_column()
    ))
    .bind(recipe_id)
    .fetch_all(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}
