//! Log in against a Helios backend and watch the session state.
//!
//! ```sh
//! HELIOS_BASE_URL=https://backend.example.com \
//! HELIOS_EMAIL=user@example.com \
//! HELIOS_PASSWORD=secret \
//! cargo run -p helios-client --example login
//! ```

use helios_client::{ClientConfig, HeliosClient, LoginOutcome};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helios_auth=debug,helios_storage=debug".into()),
        )
        .init();

    let base_url = std::env::var("HELIOS_BASE_URL")?;
    let email = std::env::var("HELIOS_EMAIL")?;
    let password = std::env::var("HELIOS_PASSWORD")?;

    let client = HeliosClient::connect(ClientConfig::new(base_url)).await?;

    client.auth.on_auth_state_changed(|authenticated| {
        println!("auth state changed: authenticated = {authenticated}");
    });
    client.auth.on_token_changed(|| {
        println!("access token changed");
    });

    if client.auth.is_authenticated() != Some(true) {
        match client.auth.login(&email, &password).await? {
            LoginOutcome::LoggedIn => {}
            LoginOutcome::MfaRequired { ticket } => {
                println!("account requires a second factor (ticket {ticket}), aborting");
                return Ok(());
            }
        }
    } else {
        println!("session restored from storage");
    }

    if let Some(user_id) = client.auth.claim("x-helios-user-id") {
        println!("logged in as {user_id}");
    }

    // Stay up long enough to observe a background renewal or two.
    tokio::time::sleep(Duration::from_secs(120)).await;

    client.auth.logout(false).await;
    Ok(())
}
