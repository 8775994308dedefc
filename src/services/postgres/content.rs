use uuid::Uuid;

use super::{PostgresClient, PostgresError};
use crate::models::{BlogPost, ContentStatus, KbArticle};

const ARTICLE_COLUMNS: &str = "id, slug, title, body, category, tags, status, view_count, helpful_count, not_helpful_count, created_at, updated_at, published_at";
const POST_COLUMNS: &str =
    "id, slug, title, excerpt, body, author_id, tags, status, published_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: ContentStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub author_id: Uuid,
    pub tags: Vec<String>,
    pub status: ContentStatus,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
}

impl PostgresClient {
    /// Published help articles, optionally filtered by category and a
    /// case-insensitive search over title, body and tags
    pub async fn list_articles(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<KbArticle>, PostgresError> {
        let pattern = search.map(|q| format!("%{}%", escape_like(q.trim())));

        Ok(sqlx::query_as::<_, KbArticle>(&format!(
            r#"
            SELECT {} FROM kb_articles
            WHERE status = 'published'
              AND ($1::text IS NULL OR lower(category) = lower($1))
              AND ($2::text IS NULL
                   OR title ILIKE $2
                   OR body ILIKE $2
                   OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE $2))
            ORDER BY helpful_count DESC, view_count DESC, title ASC
            LIMIT $3 OFFSET $4
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(category)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Fetch a published article and count the view
    pub async fn get_published_article(&self, slug: &str) -> Result<Option<KbArticle>, PostgresError> {
        Ok(sqlx::query_as::<_, KbArticle>(&format!(
            r#"
            UPDATE kb_articles SET view_count = view_count + 1
            WHERE slug = $1 AND status = 'published'
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn record_article_feedback(&self, slug: &str, helpful: bool) -> Result<bool, PostgresError> {
        let result = sqlx::query(
            r#"
            UPDATE kb_articles SET
                helpful_count = helpful_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                not_helpful_count = not_helpful_count + CASE WHEN $2 THEN 0 ELSE 1 END
            WHERE slug = $1 AND status = 'published'
            "#,
        )
        .bind(slug)
        .bind(helpful)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_article(&self, article: NewArticle) -> Result<KbArticle, PostgresError> {
        Ok(sqlx::query_as::<_, KbArticle>(&format!(
            r#"
            INSERT INTO kb_articles (id, slug, title, body, category, tags, status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 = 'published'::content_status THEN NOW() END)
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.body)
        .bind(&article.category)
        .bind(&article.tags)
        .bind(article.status)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn update_article(
        &self,
        article_id: Uuid,
        changes: ArticleChanges,
    ) -> Result<KbArticle, PostgresError> {
        sqlx::query_as::<_, KbArticle>(&format!(
            r#"
            UPDATE kb_articles SET
                title = COALESCE($2, title),
                body = COALESCE($3, body),
                category = COALESCE($4, category),
                tags = COALESCE($5, tags),
                status = COALESCE($6, status),
                published_at = CASE
                    WHEN $6 = 'published'::content_status AND published_at IS NULL THEN NOW()
                    ELSE published_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(article_id)
        .bind(changes.title)
        .bind(changes.body)
        .bind(changes.category)
        .bind(changes.tags)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("article {}", article_id)))
    }

    pub async fn delete_article(&self, article_id: Uuid) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM kb_articles WHERE id = $1")
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Published posts, newest first
    pub async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<BlogPost>, PostgresError> {
        Ok(sqlx::query_as::<_, BlogPost>(&format!(
            r#"
            SELECT {} FROM blog_posts
            WHERE status = 'published'
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT $1 OFFSET $2
            "#,
            POST_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_published_post(&self, slug: &str) -> Result<Option<BlogPost>, PostgresError> {
        Ok(sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {} FROM blog_posts WHERE slug = $1 AND status = 'published'",
            POST_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn create_post(&self, post: NewPost) -> Result<BlogPost, PostgresError> {
        Ok(sqlx::query_as::<_, BlogPost>(&format!(
            r#"
            INSERT INTO blog_posts (id, slug, title, excerpt, body, author_id, tags, status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $8 = 'published'::content_status THEN NOW() END)
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.body)
        .bind(post.author_id)
        .bind(&post.tags)
        .bind(post.status)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<BlogPost, PostgresError> {
        sqlx::query_as::<_, BlogPost>(&format!(
            r#"
            UPDATE blog_posts SET
                title = COALESCE($2, title),
                excerpt = COALESCE($3, excerpt),
                body = COALESCE($4, body),
                tags = COALESCE($5, tags),
                status = COALESCE($6, status),
                published_at = CASE
                    WHEN $6 = 'published'::content_status AND published_at IS NULL THEN NOW()
                    ELSE published_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(post_id)
        .bind(changes.title)
        .bind(changes.excerpt)
        .bind(changes.body)
        .bind(changes.tags)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("post {}", post_id)))
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Escape `%` and `_` so user input is matched literally by ILIKE
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
