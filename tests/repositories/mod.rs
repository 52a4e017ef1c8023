//! Repository tests against a real PostgreSQL.
//!
//! Each test returns early when `DATABASE_URL` is not set, so the suite
//! still passes on machines without a database. Rows are keyed by fresh
//! Snowflake ids, so runs can share one database.

mod admin_tests;
mod call_tests;
mod memory_tests;
mod session_tests;
mod social_tests;

use std::env;

use once_cell::sync::Lazy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use omsim_social::domain::{User, UserRepository};
use omsim_social::infrastructure::database;
use omsim_social::infrastructure::repositories::PgUserRepository;
use omsim_social::shared::snowflake::SnowflakeGenerator;

static IDS: Lazy<SnowflakeGenerator> =
    Lazy::new(|| SnowflakeGenerator::new(rand::random::<u64>(), rand::random::<u64>()));

pub fn next_id() -> i64 {
    IDS.generate()
}

/// Connect and migrate, or `None` when no database is configured.
pub async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping repository test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to DATABASE_URL");
    database::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

pub async fn create_user(pool: &PgPool) -> i64 {
    let id = next_id();
    let user = User::new(id, &format!("u{id}"), &format!("u{id}@example.com"), None);
    PgUserRepository::new(pool.clone())
        .create(&user)
        .await
        .expect("Failed to create user");
    id
}

pub async fn count(pool: &PgPool, sql: &str, id: i64) -> i64 {
    sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Count query failed")
}
