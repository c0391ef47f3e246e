//! The `mockview login` and `mockview logout` commands.

use std::path::PathBuf;

use anyhow::Result;

use mockview_core::traits::Credentials;

use super::app::App;

pub async fn execute(email: String, password: String, config: Option<PathBuf>) -> Result<()> {
    let app = App::open(config.as_deref()).await?;
    let login = app.auth.login(&Credentials { email, password }).await?;

    let name = if login.full_name.is_empty() {
        &login.email
    } else {
        &login.full_name
    };
    println!(
        "Logged in as {name} (session valid until {})",
        login.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

pub async fn logout(config: Option<PathBuf>) -> Result<()> {
    let app = App::open(config.as_deref()).await?;
    app.auth.logout().await;
    println!("Logged out.");
    Ok(())
}
