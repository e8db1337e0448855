use anyhow::Context;
use clap::Parser;
use tracing::info;

use nlq_gateway::cli::Cli;
use nlq_gateway::config::{Config, ConnectionConfig};
use nlq_gateway::db::{self, DatabaseClient, MockDatabaseClient};
use nlq_gateway::intent::Intent;
use nlq_gateway::llm::{self, LlmProvider};
use nlq_gateway::logging;
use nlq_gateway::pipeline::Gateway;
use nlq_gateway::safety::ExecutionPolicy;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    let cli = Cli::parse();
    let config = Config::load_from_file(&cli.config)?;

    let provider: LlmProvider = if cli.mock {
        LlmProvider::Mock
    } else {
        cli.llm
            .as_deref()
            .unwrap_or(&config.llm.provider)
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?
    };
    let llm_client = llm::create_client(provider, config.llm.model.clone())?;

    let db_client: Box<dyn DatabaseClient> = if cli.mock {
        Box::new(MockDatabaseClient::with_inventory_fixture())
    } else {
        let conn = resolve_connection(&cli, &config)?;
        info!(connection = %conn.display_string(), "connecting");
        db::connect(&conn).await?
    };

    let policy = if cli.allow_writes {
        ExecutionPolicy::ReadWrite
    } else {
        ExecutionPolicy::ReadOnly
    };

    let intent_override = cli
        .intent
        .as_deref()
        .map(str::parse::<Intent>)
        .transpose()?;

    let gateway = Gateway::new(llm_client, db_client).with_policy(policy);

    let result = match intent_override {
        Some(intent) => gateway.handle_with_intent(&cli.query, intent).await,
        None => gateway.handle(&cli.query).await,
    };

    gateway.close().await.ok();
    let response = result?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", output);

    Ok(())
}

fn resolve_connection(cli: &Cli, config: &Config) -> anyhow::Result<ConnectionConfig> {
    let mut conn = if let Some(conn_str) = &cli.connection {
        ConnectionConfig::from_connection_string(conn_str)?
    } else if let Some(named) = config.get_connection(cli.name.as_deref()) {
        named.clone()
    } else if cli.name.is_some() {
        anyhow::bail!(
            "Connection '{}' not found in {}",
            cli.name.as_deref().unwrap_or_default(),
            cli.config.display()
        );
    } else {
        ConnectionConfig::default()
    };

    conn.apply_env_defaults();
    conn.to_connection_string().context(
        "No database configured. Pass --connection, set DATABASE_URL, \
         or add a [connections.default] entry to the config file",
    )?;

    Ok(conn)
}
