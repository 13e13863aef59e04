//! `wayfarer user` subcommands: operator-side user provisioning.
//!
//! There is no register/login HTTP surface; accounts and session tokens are
//! minted from the CLI and handed to API clients out of band.

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use sqlx::PgPool;
use uuid::Uuid;

use wayfarer_core::token::{self, TokenConfig};
use wayfarer_db::queries::users;

use crate::UserCommands;

pub async fn run_user_command(
    command: UserCommands,
    pool: &PgPool,
    token_config: &TokenConfig,
) -> Result<()> {
    match command {
        UserCommands::Add { name, email } => run_add(pool, &name, &email).await,
        UserCommands::Token { user_id, ttl_days } => {
            run_token(pool, token_config, &user_id, ttl_days).await
        }
        UserCommands::List => run_list(pool).await,
    }
}

async fn run_add(pool: &PgPool, name: &str, email: &str) -> Result<()> {
    let user = users::insert_user(pool, name, email)
        .await
        .with_context(|| format!("failed to create user {email}"))?;

    println!("User created.");
    println!("  id:    {}", user.id);
    println!("  name:  {}", user.name);
    println!("  email: {}", user.email);
    println!();
    println!("Next: run `wayfarer user token {}` to mint a session token.", user.id);

    Ok(())
}

async fn run_token(
    pool: &PgPool,
    token_config: &TokenConfig,
    user_id: &str,
    ttl_days: i64,
) -> Result<()> {
    let id = Uuid::parse_str(user_id).with_context(|| format!("invalid user ID: {user_id}"))?;

    let Some(user) = users::get_user(pool, id).await? else {
        bail!("user {user_id} not found");
    };

    if ttl_days < 1 {
        bail!("--ttl-days must be at least 1, got {ttl_days}");
    }

    let session_token = token::generate_token_with_ttl(token_config, user.id, ttl_days);
    let claims = token::validate_token(token_config, &session_token)
        .context("freshly minted token failed validation")?;
    let expires = DateTime::from_timestamp(claims.expires_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| claims.expires_at.to_string());

    println!("Session token for {} <{}>:", user.name, user.email);
    println!();
    println!("  {session_token}");
    println!();
    println!("Expires: {expires} ({ttl_days} days)");
    println!("Send it as `Authorization: Bearer <token>`.");

    Ok(())
}

async fn run_list(pool: &PgPool) -> Result<()> {
    let all = users::list_users(pool).await?;

    if all.is_empty() {
        println!("No users. Create one with `wayfarer user add --name <name> --email <email>`.");
        return Ok(());
    }

    println!("{} user(s):", all.len());
    for user in &all {
        println!(
            "  {}  {:<20}  {}  (created {})",
            user.id,
            user.name,
            user.email,
            user.created_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}
