use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use qline_queue_client::{Purpose, QueueClient, Station};
use qline_shared_config::CommonConfig;
use qline_status::{
    BootstrapState, CancelWorkflow, EventSink, FileSessionStore, JoinForm, JoinWorkflow,
    LogNavigator, Navigator, SessionBootstrap, SessionStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Join and follow a walk-in queue from the terminal
#[derive(Parser, Debug)]
#[command(name = "qline", version, about, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Exchange a one-time access credential for a session
    Access {
        /// The credential itself, or the entry URL carrying `initialQrId`
        credential: String,
    },
    /// List stations serving a purpose
    Stations { purpose: Purpose, email: String },
    /// Join a station's queue
    Join {
        purpose: Purpose,
        email: String,
        station_id: String,
    },
    /// Show the stored session
    Session {
        /// Delete the stored session instead
        #[arg(long)]
        clear: bool,
    },
    /// Cancel a ticket
    Cancel {
        ticket_id: String,
        /// Free-text reason sent with the request
        reason: Vec<String>,
    },
}

struct App {
    config: CommonConfig,
    client: QueueClient,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables and configuration
    let config = CommonConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.environment.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    tracing::debug!(environment = %config.environment, "Configuration loaded");

    let client = QueueClient::new(&config.api).context("Failed to build queue client")?;
    let app = App {
        store: Arc::new(FileSessionStore::new(config.session.cookie_file.clone())),
        navigator: Arc::new(LogNavigator),
        client,
        config,
    };

    match cli.command {
        Commands::Access { credential } => access(&app, &credential).await,
        Commands::Stations { purpose, email } => stations(&app, purpose, &email).await,
        Commands::Join {
            purpose,
            email,
            station_id,
        } => join(&app, purpose, &email, &station_id).await,
        Commands::Session { clear: false } => session(&app),
        Commands::Session { clear: true } => {
            app.store.clear()?;
            println!("session cleared");
            Ok(())
        }
        Commands::Cancel { ticket_id, reason } => {
            cancel(&app, &ticket_id, &reason.join(" ")).await
        }
    }
}

async fn access(app: &App, input: &str) -> anyhow::Result<()> {
    let credential = if input.contains('?') {
        SessionBootstrap::credential_from_url(input)
    } else {
        Some(input.to_string())
    };

    let mut bootstrap = SessionBootstrap::new(
        app.client.clone(),
        app.store.clone(),
        app.navigator.clone(),
        app.config.session.access_session_ttl(),
    );
    bootstrap.mount(credential.as_deref());

    match bootstrap.settled().await {
        BootstrapState::Redirected(route) => {
            println!("session established; continue at {}", route.path());
            Ok(())
        }
        BootstrapState::Unauthorized => bail!("access denied"),
        BootstrapState::Failed(message) => bail!("access failed: {}", message),
        state => bail!("access did not settle: {:?}", state),
    }
}

fn join_workflow(app: &App) -> JoinWorkflow {
    JoinWorkflow::new(
        app.client.clone(),
        app.store.clone(),
        app.navigator.clone(),
        app.config.session.session_ttl(),
    )
}

async fn stations(app: &App, purpose: Purpose, email: &str) -> anyhow::Result<()> {
    let form = JoinForm::new(email, purpose);
    let stations = join_workflow(app)
        .load_stations(&form)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if stations.is_empty() {
        println!("no stations available for {}", form.purpose.map(|p| p.label()).unwrap_or("-"));
    }
    for station in stations {
        let wait = station
            .estimated_wait_time
            .map(|minutes| format!(" (~{} min)", minutes))
            .unwrap_or_default();
        println!(
            "{}\t{}{}",
            station.id.as_deref().unwrap_or("-"),
            station.name,
            wait
        );
    }
    Ok(())
}

async fn join(app: &App, purpose: Purpose, email: &str, station_id: &str) -> anyhow::Result<()> {
    let form = JoinForm::new(email, purpose);
    let station = Station {
        id: Some(station_id.to_string()),
        name: station_id.to_string(),
        purpose: form.purpose,
        description: None,
        created_at: None,
        updated_at: None,
        estimated_wait_time: None,
    };

    let route = join_workflow(app)
        .join(&form, &station)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("joined; continue at {}", route.path());
    Ok(())
}

fn session(app: &App) -> anyhow::Result<()> {
    match app.store.read() {
        Some(_) => println!(
            "session active ({})",
            app.config.session.cookie_file.display()
        ),
        None => println!("no session"),
    }
    Ok(())
}

async fn cancel(app: &App, ticket_id: &str, reason: &str) -> anyhow::Result<()> {
    let (sink, mut outcomes) = EventSink::channel();
    let mut workflow = CancelWorkflow::new();
    workflow.open();
    workflow.set_reason(reason);
    workflow
        .submit(&app.client, &app.store, Some(ticket_id), sink)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let outcome = outcomes
        .recv()
        .await
        .context("cancellation task ended without a result")?;
    workflow.settle(outcome);

    if let Some(error) = workflow.error() {
        bail!("cancellation failed: {}", error);
    }
    println!("cancellation requested for {}", ticket_id);
    Ok(())
}
