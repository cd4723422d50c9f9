use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spy_cats::{api, breeds::BreedValidator, config::Config, db};

#[derive(Parser)]
#[command(name = "spy-cats")]
#[command(about = "Spy cat agency: cats, missions, and targets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API (overrides SPY_CATS_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides SPY_CATS_HOST)
        #[arg(long)]
        host: Option<String>,

        /// SQLite database file (overrides SPY_CATS_DATABASE)
        #[arg(long)]
        database: Option<std::path::PathBuf>,
    },
    /// Ask the breed catalog whether a breed is recognized
    CheckBreed {
        /// Breed name, e.g. "Siamese"
        name: String,
    },
}

/// Initialize tracing with output to stdout
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "spy_cats=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = match &config.database {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    let breeds = BreedValidator::remote(&config.breeds)?;
    let app = api::create_router_with_cors(db, breeds, config.cors_origins.as_deref());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Spy cats server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env();

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            database,
        }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if database.is_some() {
                config.database = database;
            }
            serve(config).await?;
        }
        Some(Commands::CheckBreed { name }) => {
            let breeds = BreedValidator::remote(&config.breeds)?;
            if breeds.validate(&name).await? {
                println!("{} is a recognized breed", name);
            } else {
                println!("{} is not a recognized breed", name);
                std::process::exit(1);
            }
        }
        None => {
            // Default: start server
            serve(config).await?;
        }
    }

    Ok(())
}
