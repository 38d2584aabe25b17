use sqlx::{Pool, Postgres};

use crate::database::actions::attributes::replace_recipe_attributes;
use crate::database::error::QueryError;
use crate::database::schema::{AttributeKind, Recipe};
use crate::error::ApiError;
use crate::serializers::RecipeChanges;

/// Lists the requesting user's recipes, newest first. Each id-list filter is
/// an "any of" match on the respective relation; both together are combined
/// with AND. Joined rows are deduplicated.
pub async fn list_recipes(
    user_id: i32,
    tag_ids: Option<Vec<i32>>,
    ingredient_ids: Option<Vec<i32>>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    let rows: Vec<Recipe> = match (tag_ids, ingredient_ids) {
        (Some(tag_ids), Some(ingredient_ids)) => {
            sqlx::query_as(
                "
                SELECT DISTINCT r.* FROM recipes r
                INNER JOIN recipe_tags rt ON rt.recipe_id = r.id
                INNER JOIN recipe_ingredients ri ON ri.recipe_id = r.id
                WHERE r.user_id = $1 AND rt.tag_id = ANY($2) AND ri.ingredient_id = ANY($3)
                ORDER BY r.id DESC
            ",
            )
            .bind(user_id)
            .bind(&tag_ids)
            .bind(&ingredient_ids)
            .fetch_all(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?
        }
        (Some(tag_ids), None) => {
            sqlx::query_as(
                "
                SELECT DISTINCT r.* FROM recipes r
                INNER JOIN recipe_tags rt ON rt.recipe_id = r.id
                WHERE r.user_id = $1 AND rt.tag_id = ANY($2)
                ORDER BY r.id DESC
            ",
            )
            .bind(user_id)
            .bind(&tag_ids)
            .fetch_all(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?
        }
        (None, Some(ingredient_ids)) => {
            sqlx::query_as(
                "
                SELECT DISTINCT r.* FROM recipes r
                INNER JOIN recipe_ingredients ri ON ri.recipe_id = r.id
                WHERE r.user_id = $1 AND ri.ingredient_id = ANY($2)
                ORDER BY r.id DESC
            ",
            )
            .bind(user_id)
            .bind(&ingredient_ids)
            .fetch_all(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?
        }
        (None, None) => {
            sqlx::query_as("SELECT * FROM recipes WHERE user_id = $1 ORDER BY id DESC")
                .bind(user_id)
                .fetch_all(&*pool)
                .await
                .map_err(|e| QueryError::from(e).into())?
        }
    };

    Ok(rows)
}

/// Owner-scoped lookup. A foreign-owned id resolves to `None`, exactly like
/// a missing one.
pub async fn get_recipe(
    user_id: i32,
    id: i32,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a recipe owned by the requesting user, resolving any nested
/// tag/ingredient names inside the same transaction.
pub async fn create_recipe(
    user_id: i32,
    changes: RecipeChanges,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, description, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
    ",
    )
    .bind(user_id)
    .bind(changes.title)
    .bind(changes.description.unwrap_or_default())
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(changes.link.unwrap_or_default())
    .fetch_one(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if let Some(names) = &changes.tags {
        replace_recipe_attributes(&mut tr, user_id, recipe.id, AttributeKind::Tag, names).await?;
    }
    if let Some(names) = &changes.ingredients {
        replace_recipe_attributes(&mut tr, user_id, recipe.id, AttributeKind::Ingredient, names)
            .await?;
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(recipe)
}

/// Applies a validated mutation to an owned recipe. Scalar fields update
/// only when present; a present tag/ingredient list replaces the relation
/// (empty list clears it), an absent one leaves it untouched. Runs in one
/// transaction so nested resolution cannot half-apply.
pub async fn update_recipe(
    user_id: i32,
    id: i32,
    changes: RecipeChanges,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let recipe: Option<Recipe> = sqlx::query_as(
        "
        UPDATE recipes SET
        title = COALESCE($3, title),
        description = COALESCE($4, description),
        time_minutes = COALESCE($5, time_minutes),
        price = COALESCE($6, price),
        link = COALESCE($7, link)
        WHERE id = $1 AND user_id = $2
        RETURNING *;
    ",
    )
    .bind(id)
    .bind(user_id)
    .bind(changes.title)
    .bind(changes.description)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(changes.link)
    .fetch_optional(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let Some(recipe) = recipe else {
        return Ok(None);
    };

    if let Some(names) = &changes.tags {
        replace_recipe_attributes(&mut tr, user_id, recipe.id, AttributeKind::Tag, names).await?;
    }
    if let Some(names) = &changes.ingredients {
        replace_recipe_attributes(&mut tr, user_id, recipe.id, AttributeKind::Ingredient, names)
            .await?;
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(Some(recipe))
}

/// Deletes an owned recipe; link rows cascade. Returns whether a row went
/// away.
pub async fn delete_recipe(user_id: i32, id: i32, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(result.rows_affected() > 0)
}

/// Swaps the stored image path of an owned recipe. Returns the updated row
/// together with the replaced path so the caller can clean up the old file.
pub async fn set_recipe_image(
    user_id: i32,
    id: i32,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<(Recipe, Option<String>)>, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    let Some((previous,)) = previous else {
        return Ok(None);
    };

    let recipe: Recipe = sqlx::query_as(
        "UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(image)
    .fetch_one(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(Some((recipe, previous)))
}
