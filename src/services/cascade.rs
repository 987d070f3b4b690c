// Cascade deletes shared by the review, place and identity services.
//
// Every function runs on the caller's transaction and returns the blob paths
// that became unreferenced. Callers remove those blobs only after commit.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::AppResult;

/// Delete a review together with its photos, likes and comments.
pub async fn delete_review(conn: &mut SqliteConnection, review_id: &str) -> AppResult<Vec<String>> {
    let blobs: Vec<String> =
        sqlx::query_scalar("SELECT file_path FROM photos WHERE review_id = ? ORDER BY rowid")
            .bind(review_id)
            .fetch_all(&mut *conn)
            .await?;

    sqlx::query("DELETE FROM photos WHERE review_id = ?")
        .bind(review_id)
        .execute(&mut *conn)
        .await?;
    let likes = sqlx::query("DELETE FROM review_likes WHERE review_id = ?")
        .bind(review_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    let comments = sqlx::query("DELETE FROM review_comments WHERE review_id = ?")
        .bind(review_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(review_id)
        .execute(&mut *conn)
        .await?;

    debug!(
        review_id = %review_id,
        photos = blobs.len(),
        likes,
        comments,
        "Review cascade"
    );
    Ok(blobs)
}

async fn review_ids(conn: &mut SqliteConnection, sql: &str, id: &str) -> AppResult<Vec<String>> {
    Ok(sqlx::query_scalar(sql).bind(id).fetch_all(&mut *conn).await?)
}

/// Delete a place and every review written about it.
pub async fn delete_place(conn: &mut SqliteConnection, place_id: &str) -> AppResult<Vec<String>> {
    let mut blobs = Vec::new();
    let reviews = review_ids(
        conn,
        "SELECT id FROM reviews WHERE place_id = ? ORDER BY rowid",
        place_id,
    )
    .await?;
    for review_id in reviews {
        blobs.extend(delete_review(conn, &review_id).await?);
    }
    sqlx::query("DELETE FROM places WHERE id = ?")
        .bind(place_id)
        .execute(&mut *conn)
        .await?;
    Ok(blobs)
}

/// Delete a user with their reviews, photos, likes, comments and avatar.
pub async fn delete_user(conn: &mut SqliteConnection, user_id: &str) -> AppResult<Vec<String>> {
    let mut blobs = Vec::new();
    let reviews = review_ids(
        conn,
        "SELECT id FROM reviews WHERE user_id = ? ORDER BY rowid",
        user_id,
    )
    .await?;
    for review_id in reviews {
        blobs.extend(delete_review(conn, &review_id).await?);
    }

    let photos: Vec<String> =
        sqlx::query_scalar("SELECT file_path FROM photos WHERE user_id = ? ORDER BY rowid")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    blobs.extend(photos);

    let avatar: Option<Option<String>> =
        sqlx::query_scalar("SELECT avatar_path FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    blobs.extend(avatar.flatten());

    for sql in [
        "DELETE FROM photos WHERE user_id = ?",
        "DELETE FROM review_likes WHERE user_id = ?",
        "DELETE FROM review_comments WHERE user_id = ?",
        "DELETE FROM users WHERE id = ?",
    ] {
        sqlx::query(sql).bind(user_id).execute(&mut *conn).await?;
    }
    Ok(blobs)
}
