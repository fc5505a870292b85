use anyhow::Context;
use ledger_notify::configuration::get_configuration;
use ledger_notify::push::WebPushTransport;
use ledger_notify::startup::Application;
use ledger_notify::store::PgStore;
use ledger_notify::telemetry::{get_subscriber, init_subscriber};
use std::sync::Arc;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("ledger-notify".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let configuration = get_configuration().context("Failed to read configuration.")?;
    let store = PgStore::connect(&configuration.database)?;
    store.run_migrations()?;
    let transport = WebPushTransport::new(&configuration.push)?;

    let app = Application::build(&configuration, Arc::new(store), Arc::new(transport)).await?;
    app.server.launch().await?;
    Ok(())
}
