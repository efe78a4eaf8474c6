use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use bazaar::auth::{AuthGate, JwtGate};
use bazaar::store::DocumentStore;
use env_logger::Env;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_lib_mods();
    init_our_mods();

    let config = bazaar::app_config::get_config();

    let store: Arc<dyn DocumentStore> = bazaar::store::connect(&config.database)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    bazaar::store::setup_indexes(store.as_ref())
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let gate: Arc<dyn AuthGate> = match JwtGate::from_config(&config.auth) {
        Some(gate) => Arc::new(gate),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "auth.jwt_secret cannot be used as an HMAC key",
            ))
        }
    };

    // Timer trigger for the pruning sweep
    let interval = config.retention.prune_interval_seconds;
    if interval > 0 {
        let store = store.clone();
        actix_web::rt::spawn(async move {
            bazaar::prune::run_scheduled(store, Duration::from_secs(interval)).await;
        });
        log::info!("Scheduled prune every {}s", interval);
    } else {
        log::info!("Scheduled prune disabled");
    }

    // Spawn rate limiter cleanup task
    actix_web::rt::spawn(async {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(300)); // Every 5 minutes
        loop {
            interval.tick().await;
            let tracked = bazaar::rate_limit::cleanup_old_entries_public();
            log::debug!("Rate limiter cleanup completed, {} clients tracked", tracked);
        }
    });

    let store_data: Data<dyn DocumentStore> = Data::from(store);
    let gate_data: Data<dyn AuthGate> = Data::from(gate);

    let mut server = HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(store_data.clone())
            .app_data(gate_data.clone())
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "no-referrer")),
            )
            .wrap(Logger::new("%a %r %s %Dms"))
            .configure(bazaar::web::configure)
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    log::info!("Listening on {}", config.server.bind);
    server.bind(config.server.bind.as_str())?.run().await
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env file is fine; the environment may already be set.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
pub fn init_our_mods() {
    bazaar::app_config::init();
    bazaar::rate_limit::init_rate_limits(&bazaar::app_config::rate_limit());
}
