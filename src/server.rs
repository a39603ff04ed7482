//! Service runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: store selection, database and
//! migrations, location seed, slot cache, reservation coordinator, the
//! rolling-window slot generation, the hold-expiry sweep and the REST API.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    create_event_bus, start_cache_invalidation_listener, start_hold_expiry_task, CheckoutService,
    OccupancyWaitCost, OrderCreator, QuickQueue, ReservationCoordinator, SharedEventBus,
    SlotAllocator, SlotGridCache, SlotGridLoader,
};
use crate::config::{AppConfig, StoreMode};
use crate::domain::{LocationDirectory, Period, SlotStore};
use crate::infrastructure::{
    init_database, run_migrations, InMemoryLocationDirectory, InMemorySlotStore,
    SandboxSlotStore, SeaOrmLocationDirectory, SeaOrmSlotStore,
};
use crate::interfaces::{create_api_router, ApiState};
use crate::shared::{SharedClock, ShutdownCoordinator, ShutdownSignal, SystemClock};

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (database mode only)
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

/// The global recorder can only be installed once per process; a restart
/// within the same process reuses it. If another recorder already owns the
/// process, `/metrics` renders a detached registry instead.
fn prometheus_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                handle
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Could not install Prometheus recorder, metrics will not be exported"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

struct Stores {
    store: Arc<dyn SlotStore>,
    directory: Arc<dyn LocationDirectory>,
    db: Option<DatabaseConnection>,
}

async fn open_stores(opts: &ServerOptions) -> Result<Stores, Box<dyn std::error::Error>> {
    let cfg = &opts.config;
    let seed = cfg.seed_locations();

    match cfg.store.mode {
        StoreMode::Database => {
            let db = init_database(&cfg.database_config()).await?;
            if opts.auto_migrate {
                info!("Running database migrations...");
                run_migrations(&db).await?;
            }

            let directory = SeaOrmLocationDirectory::new(db.clone());
            let seeded = directory.seed_if_empty(&seed).await?;
            if seeded > 0 {
                info!(count = seeded, "Seeded pickup locations");
            }

            Ok(Stores {
                store: Arc::new(SeaOrmSlotStore::new(db.clone())),
                directory: Arc::new(directory),
                db: Some(db),
            })
        }
        StoreMode::Memory => {
            info!("Using in-memory slot store; reservations are lost on restart");
            Ok(Stores {
                store: Arc::new(InMemorySlotStore::new()),
                directory: Arc::new(InMemoryLocationDirectory::new(seed)),
                db: None,
            })
        }
        StoreMode::Sandbox => {
            warn!(
                "SANDBOX MODE: every slot reports fixed availability and holds always succeed. \
                 Not for production use"
            );
            Ok(Stores {
                store: Arc::new(SandboxSlotStore::new()),
                directory: Arc::new(InMemoryLocationDirectory::new(seed)),
                db: None,
            })
        }
    }
}

/// Handle to a running service.
///
/// ```rust,no_run
/// use lunchline::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub event_bus: SharedEventBus,
    pub store: Arc<dyn SlotStore>,
    pub directory: Arc<dyn LocationDirectory>,
    pub cache: Arc<SlotGridCache>,
    pub quick_queue: Arc<QuickQueue>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub config: AppConfig,
    /// Port the REST API is bound to (resolved when configured as 0)
    pub api_port: u16,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        info!(mode = ?opts.config.store.mode, "Starting lunchline...");
        opts.config.validate()?;

        let prometheus = prometheus_handle();

        let Stores { store, directory, db } = open_stores(&opts).await?;
        let app_cfg = opts.config;

        let clock: SharedClock = Arc::new(SystemClock);
        let event_bus = create_event_bus();

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // Grids, cache and allocation
        let loader = Arc::new(SlotGridLoader::new(
            store.clone(),
            directory.clone(),
            app_cfg.slot_template()?,
            app_cfg.booking_window(),
            clock.clone(),
        ));
        let cache = Arc::new(SlotGridCache::new(
            loader.clone(),
            app_cfg.cache_refresh_interval(),
            clock.clone(),
        ));
        let allocator = SlotAllocator::new(Arc::new(OccupancyWaitCost {
            base_unit_minutes: app_cfg.allocation.base_unit_minutes,
        }));
        let quick_queue = Arc::new(QuickQueue::new(cache.clone(), directory.clone(), allocator));

        let coordinator = Arc::new(ReservationCoordinator::new(
            store.clone(),
            loader.clone(),
            event_bus.clone(),
            clock,
            app_cfg.hold_timeout(),
        ));

        // Rolling booking window; lazy generation on first load covers any failure here.
        match directory.list_active_locations().await {
            Ok(active) => {
                for period in Period::ALL {
                    if let Err(e) = loader.materialize_window(&active, period).await {
                        warn!(period = %period, error = %e, "Slot pre-generation failed");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Could not list locations for slot pre-generation"),
        }

        let background = vec![
            start_cache_invalidation_listener(
                cache.clone(),
                event_bus.clone(),
                shutdown_signal.clone(),
            ),
            start_hold_expiry_task(
                coordinator.clone(),
                shutdown_signal.clone(),
                app_cfg.reservations.sweep_interval_secs,
            ),
        ];

        // REST API
        let api_router = create_api_router(ApiState {
            store: store.clone(),
            directory: directory.clone(),
            cache: cache.clone(),
            quick_queue: quick_queue.clone(),
            coordinator: coordinator.clone(),
            metrics: prometheus,
            started_at: Arc::new(Instant::now()),
        });

        let api_addr = format!("{}:{}", app_cfg.server.api_host, app_cfg.server.api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let bound = listener.local_addr()?;
        info!("REST API server listening on http://{}", bound);
        info!("Swagger UI available at http://{}/docs/", bound);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("lunchline started");

        Ok(Self {
            event_bus,
            store,
            directory,
            cache,
            quick_queue,
            coordinator,
            config: app_cfg,
            api_port: bound.port(),
            db,
            shutdown,
            api_task,
            background,
        })
    }

    /// Checkout flow against an external order system
    pub fn checkout_service(&self, orders: Arc<dyn OrderCreator>) -> CheckoutService {
        CheckoutService::new(
            self.quick_queue.clone(),
            self.coordinator.clone(),
            orders,
            self.config.allocation.max_checkout_attempts,
        )
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install SIGTERM / SIGINT listeners that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for every task to stop after shutdown was triggered, then close the database.
    pub async fn wait(self) {
        info!("Waiting for server tasks to complete...");

        let Self {
            shutdown,
            api_task,
            background,
            db,
            ..
        } = self;

        let finished = shutdown
            .shutdown_with_cleanup(|| async move {
                if let Err(e) = api_task.await {
                    error!("REST API server task panicked: {}", e);
                }
                for task in background {
                    if let Err(e) = task.await {
                        error!("Background task panicked: {}", e);
                    }
                }
            })
            .await;
        if !finished {
            warn!("Some tasks did not stop within the shutdown timeout");
        }

        if let Some(db) = db {
            match db.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!("Error closing database connection: {}", e),
            }
        }

        info!("lunchline shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("Shutting down lunchline...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Initialize tracing from `[logging]`. `RUST_LOG` overrides the level.
///
/// Call once at process startup, before [`ServerHandle::start`].
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
