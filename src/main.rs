use anyhow::Context;

use youcanfi::FinanceClient;
use youcanfi::api::HttpApi;
use youcanfi::config::ClientConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Invalid configuration")?;

    eprintln!("You Can FI client v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.api_url);
    eprintln!("   Cache: {}", config.cache_path.display());
    eprintln!("   User: {}\n", config.user_id);

    let api = HttpApi::new(&config)?;
    match api.health().await {
        Ok(health) if health.is_healthy() => tracing::info!("Backend healthy"),
        Ok(health) => tracing::warn!(status = %health.status, "Backend reports unhealthy"),
        Err(e) => tracing::warn!("Health check failed: {}", e),
    }

    let client = FinanceClient::connect(&config)
        .await
        .context("Failed to open client")?;

    let hydrated = client.hydrate_all().await;
    tracing::info!(
        onboarding = hydrated.onboarding,
        net_worth = hydrated.net_worth,
        bank_link = hydrated.bank_link,
        "Loaded cached state"
    );

    client
        .refresh_all()
        .await
        .context("Failed to refresh from backend")?;

    // ── Onboarding ──────────────────────────────────────────────────
    let progress = client.onboarding.progress().await;
    let complete = client
        .onboarding
        .state()
        .await
        .is_some_and(|s| s.is_complete);
    let pending_tasks = client.onboarding.pending_tasks().await.len();
    tracing::info!(
        step = progress.current_step,
        total = progress.total_steps,
        percentage = progress.percentage,
        complete,
        pending_tasks,
        "Onboarding"
    );

    // ── Net worth ───────────────────────────────────────────────────
    if let Some(summary) = client.net_worth.summary().await {
        tracing::info!(
            assets = %summary.total_assets,
            liabilities = %summary.total_liabilities,
            net_worth = %summary.net_worth,
            "Net worth"
        );
        for slice in &summary.asset_breakdown {
            tracing::info!(category = %slice.label, value = %slice.value, pct = slice.percentage, "Asset breakdown");
        }
    }

    // ── Connected accounts ──────────────────────────────────────────
    let active = client.bank_link.active_accounts().await;
    let failing = client.bank_link.accounts_with_errors().await;
    tracing::info!(
        active = active.len(),
        with_errors = failing.len(),
        "Connected accounts"
    );
    for account in &failing {
        tracing::warn!(
            institution = %account.institution_name,
            account = %account.account_name,
            "Last sync failed: {}",
            account.last_sync_error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
