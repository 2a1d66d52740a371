use identity_provider::AppResources;
use identity_provider::api::start_webserver;
use identity_provider::bootstrap;
use identity_provider::config::load_config_or_panic;
use identity_provider::mailer::{LogMailer, Mailer, SmtpMailer};
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "identity_provider=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    initialize_standard_tracing();

    let config = Arc::new(load_config_or_panic());

    let ring_provider = crypto::ring::default_provider();
    if CryptoProvider::install_default(ring_provider).is_err() {
        tracing::warn!("A crypto provider was already installed");
    }

    let db = Arc::new(Database::connect(&config.database_url).await?);

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("No smtp section configured, outgoing mail is only logged");
            Arc::new(LogMailer)
        }
    };

    let resources = AppResources::new(db, config, mailer);
    let report = bootstrap::run(&resources).await?;
    tracing::info!(
        client_created = report.client_created,
        admin_created = report.admin_created,
        "Bootstrap finished"
    );

    start_webserver(resources).await?;
    Ok(())
}
