use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::{Parser, Subcommand};
use penwatch::error::{ApiError, StreamError};
use penwatch::net::api::ApiClient;
use penwatch::net::stream::{self, StreamClient, StreamHandlers, StreamMessage, StreamState};
use penwatch::series::SeriesWindow;
use penwatch::session::{FileTokenStore, SessionStore, TokenStore};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `penwatch login` first")]
    NotLoggedIn,
    #[error("no usable config directory for the credential store")]
    NoCredentialStore,
    #[error("credential rejected; you have been logged out — run `penwatch login` again")]
    AuthFailure,
    #[error(transparent)]
    Api(ApiError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("output encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "penwatch", about = "Livestock pen telemetry client")]
struct Cli {
    #[arg(long, env = "PENWATCH_BASE_URL", default_value = "http://127.0.0.1:8000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the credential token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored credential.
    Logout,
    /// Show the current snapshot across all farm groupings.
    Pens,
    /// Show one pen's detail and recent series.
    Pen { pen_id: i64 },
    /// Stream live updates: all pens, or one pen's series.
    Watch {
        pen_id: Option<i64>,
        #[arg(long, default_value_t = 5)]
        max_retries: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = FileTokenStore::new().ok_or(CliError::NoCredentialStore)?;
    let session = SessionStore::new(Arc::new(storage) as Arc<dyn TokenStore>);
    let api = ApiClient::new(&cli.base_url);

    match cli.command {
        Command::Login { username, password } => run_login(&api, &session, &username, &password).await,
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Pens => run_pens(&api, &session).await,
        Command::Pen { pen_id } => run_pen(&api, &session, pen_id).await,
        Command::Watch { pen_id, max_retries } => {
            run_watch(&cli.base_url, &api, &session, pen_id, max_retries).await
        }
    }
}

async fn run_login(
    api: &ApiClient,
    session: &SessionStore,
    username: &str,
    password: &str,
) -> Result<(), CliError> {
    // A 401 on login means bad credentials, not a stale stored token.
    let response = api.login(username, password).await.map_err(CliError::Api)?;
    session.login(response.access_token);
    println!("logged in (token valid for {} s)", response.expires_in);
    Ok(())
}

async fn run_pens(api: &ApiClient, session: &SessionStore) -> Result<(), CliError> {
    let token = session.token().ok_or(CliError::NotLoggedIn)?;
    let snapshot = api
        .fetch_pens(&token)
        .await
        .map_err(|error| fail(session, error))?;
    print_json(&snapshot)
}

async fn run_pen(api: &ApiClient, session: &SessionStore, pen_id: i64) -> Result<(), CliError> {
    let token = session.token().ok_or(CliError::NotLoggedIn)?;
    let detail = api
        .fetch_pen_detail(&token, pen_id)
        .await
        .map_err(|error| fail(session, error))?;
    print_json(&detail)
}

async fn run_watch(
    base_url: &str,
    api: &ApiClient,
    session: &SessionStore,
    pen_id: Option<i64>,
    max_retries: u32,
) -> Result<(), CliError> {
    let token = session.token().ok_or(CliError::NotLoggedIn)?;

    // Single-pen watch seeds the window from the REST detail first.
    let window = Arc::new(Mutex::new(SeriesWindow::new()));
    let url = match pen_id {
        Some(pen_id) => {
            let detail = api
                .fetch_pen_detail(&token, pen_id)
                .await
                .map_err(|error| fail(session, error))?;
            window
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .seed(detail.time_series);
            eprintln!("watching pen {} ({})", pen_id, detail.name);
            stream::ws_pen_url(base_url, pen_id, &token)?
        }
        None => {
            eprintln!("watching all pens");
            stream::ws_pens_url(base_url, &token)?
        }
    };

    let auth_failed = Arc::new(AtomicBool::new(false));
    let handlers = {
        let window = Arc::clone(&window);
        let auth_failed = Arc::clone(&auth_failed);
        StreamHandlers::new(move |message| print_message(&window, &message))
            .on_error(|error| eprintln!("stream error: {error}"))
            .on_auth_failure(move || auth_failed.store(true, Ordering::SeqCst))
            .max_retries(max_retries)
    };

    let mut client = StreamClient::connect(Some(url), handlers);
    let mut was_connected = client.is_connected();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    eprintln!("interrupted");
                }
                break;
            }
            () = tokio::time::sleep(Duration::from_millis(250)) => {
                let connected = client.is_connected();
                if connected != was_connected {
                    eprintln!("{}", if connected { "connected" } else { "disconnected" });
                    was_connected = connected;
                }
                if client.state() == StreamState::Terminated {
                    break;
                }
            }
        }
    }
    client.shutdown();

    if auth_failed.load(Ordering::SeqCst) {
        session.logout();
        return Err(CliError::AuthFailure);
    }
    Ok(())
}

fn print_message(window: &Arc<Mutex<SeriesWindow>>, message: &StreamMessage) {
    match message {
        StreamMessage::Update(update) => {
            let mut window = window.lock().unwrap_or_else(PoisonError::into_inner);
            window.push(update.data.activity, update.data.feeding_time);
            if let Some(point) = window.last() {
                println!(
                    "#{} pen={} activity={:.2} feeding_time={:.1} (window {})",
                    point.index,
                    update.pen_id,
                    point.activity,
                    point.feeding_time,
                    window.len()
                );
            }
        }
        StreamMessage::Snapshot(snapshot) => {
            let pens: usize = snapshot.piggeies.iter().map(|p| p.pens.len()).sum();
            println!("snapshot: {} farms, {} pens", snapshot.piggeies.len(), pens);
            if let Ok(rendered) = serde_json::to_string(snapshot) {
                println!("{rendered}");
            }
        }
    }
}

/// Enforce the auth-failure policy at the REST boundary: a rejected
/// credential clears the stored token.
fn fail(session: &SessionStore, error: ApiError) -> CliError {
    if matches!(error, ApiError::Unauthorized) {
        session.logout();
        return CliError::AuthFailure;
    }
    CliError::Api(error)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
