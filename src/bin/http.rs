#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use crew_roster::{InMemoryRosterStore, Roster, RosterConfig, http_api, init_tracing};

    let config = RosterConfig::from_env()?;
    init_tracing(&config);

    let addr: SocketAddr = config.http_addr.parse()?;

    let roster = match &config.database_path {
        #[cfg(feature = "sqlite")]
        Some(path) => {
            tracing::info!(path = %path.display(), "opening sqlite roster store");
            Roster::new(crew_roster::SqliteRosterStore::new(path)?)
        }
        #[cfg(not(feature = "sqlite"))]
        Some(path) => {
            tracing::warn!(path = %path.display(), "sqlite feature disabled; using in-memory store");
            Roster::new(InMemoryRosterStore::new())
        }
        None => Roster::new(InMemoryRosterStore::new()),
    };

    let state = http_api::AppState::new(roster)
        .with_default_holidays(config.default_holiday_weekdays.clone());
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
