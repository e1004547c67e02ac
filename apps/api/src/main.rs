use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use agent_cell::handlers::AgentState;
use agent_cell::services::{
    build_registry, AgentService, LlmPlanner, Planner, RulePlanner, SessionStore,
};
use auth_cell::handlers::AuthState;
use notification_cell::NotificationDispatcher;
use scheduling_cell::handlers::ReportState;
use scheduling_cell::services::{
    AvailabilityService, BookingService, DoctorDirectory, ScheduleStore, StatsService,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic agent API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Reference data and schedule storage
    let directory = Arc::new(DoctorDirectory::seeded());
    let schedule = Arc::new(ScheduleStore::new());

    // Scheduling services
    let availability = Arc::new(AvailabilityService::new(directory.clone(), schedule.clone()));
    let booking = Arc::new(BookingService::new(directory.clone(), schedule.clone()));
    let stats = Arc::new(StatsService::new(directory.clone(), schedule));
    let dispatcher = Arc::new(NotificationDispatcher::new(config.clone()));

    // Agent: tool registry plus a planner picked from configuration
    let registry = Arc::new(build_registry(
        availability,
        booking,
        stats.clone(),
        dispatcher.clone(),
    ));
    let planner: Arc<dyn Planner> = if config.is_llm_configured() {
        info!("LLM planning enabled (model: {})", config.llm_model);
        Arc::new(LlmPlanner::new(config.clone(), registry.schemas()))
    } else {
        info!("No LLM configured, using rule-based planning");
        Arc::new(RulePlanner::new())
    };
    let store = Arc::new(SessionStore::new());
    let agent = Arc::new(AgentService::new(
        store.clone(),
        registry,
        planner,
        directory.clone(),
    ));

    let auth_state = AuthState {
        config: config.clone(),
        directory: directory.clone(),
    };
    let agent_state = AgentState {
        config: config.clone(),
        agent,
        store,
    };
    let report_state = Arc::new(ReportState {
        config: config.clone(),
        directory,
        stats,
        dispatcher,
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config, auth_state, agent_state, report_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
