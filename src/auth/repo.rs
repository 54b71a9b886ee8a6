use sqlx::PgPool;
use uuid::Uuid;

pub use crate::auth::repo_types::{Account, User};

impl User {
    /// Single read performed by the credentials path.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, image, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, image, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Create a user on the registration path, with a password hash.
    pub async fn create_with_password(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, name, image, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(db)
        .await
    }

    /// Create a user on first OAuth login. No password hash is stored; such
    /// a user can only authenticate through a linked provider.
    pub async fn create_from_oauth(
        db: &PgPool,
        email: &str,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, image)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, name, image, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(image)
        .fetch_one(db)
        .await
    }

    /// Refresh profile fields supplied by a provider on a repeat login.
    /// Only overwrites fields the provider actually sent.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), image = COALESCE($3, image)
            WHERE id = $1
            RETURNING id, email, password_hash, name, image, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(image)
        .fetch_one(db)
        .await
    }
}

impl Account {
    pub async fn find(
        db: &PgPool,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, provider, provider_account_id, created_at
            FROM accounts
            WHERE provider = $1 AND provider_account_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(db)
        .await
    }

    /// Link a provider account to a user. Idempotent for repeat logins.
    pub async fn link(
        db: &PgPool,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Account, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (user_id, provider, provider_account_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_account_id) DO UPDATE SET user_id = accounts.user_id
            RETURNING id, user_id, provider, provider_account_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(provider_account_id)
        .fetch_one(db)
        .await
    }
}
