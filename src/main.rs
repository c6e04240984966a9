use std::collections::HashMap;
use std::sync::Arc;

use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use tokio::sync::RwLock;

use pingpoint::config::Config;
use pingpoint::endpoint::Validated;
use pingpoint::features::files::{AssetEndpoint, ReportEndpoint};
use pingpoint::features::health::{LivenessEndpoint, ReadinessEndpoint};
use pingpoint::features::users::{
    CreateUserEndpoint, DeleteUserEndpoint, GetUserEndpoint, UserStore,
};
use pingpoint::service::EndpointHttpApp;

fn main() {
    // Initialize logging
    env_logger::init();

    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = Config::load_yaml_with_opt_override(&opt).expect("Failed to load configuration");

    // Register endpoints
    log::info!("Registering endpoints...");
    let store: UserStore = Arc::new(RwLock::new(HashMap::new()));
    let limits = Arc::new(config.api.clone());
    let mut app = EndpointHttpApp::new(&config.server);
    app.register(Arc::new(Validated(CreateUserEndpoint::new(
        store.clone(),
        limits,
    ))))
    .expect("Failed to register users.create");
    app.register(Arc::new(GetUserEndpoint::new(store.clone())))
        .expect("Failed to register users.get");
    app.register(Arc::new(DeleteUserEndpoint::new(store.clone())))
        .expect("Failed to register users.delete");
    app.register(Arc::new(AssetEndpoint::new(config.assets.root.clone())))
        .expect("Failed to register assets.get");
    app.register(Arc::new(ReportEndpoint::new(store)))
        .expect("Failed to register reports.users");
    app.register(Arc::new(LivenessEndpoint))
        .expect("Failed to register health.live");
    app.register(Arc::new(ReadinessEndpoint))
        .expect("Failed to register health.ready");

    // Create Pingora server with optional configuration
    let mut server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    // Add listeners from configuration
    log::info!("Adding listeners...");
    let http_service = app.into_service(&config.server);

    // Bootstrapping and server startup
    log::info!("Bootstrapping...");
    server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    server.add_service(http_service);

    log::info!("Starting Server...");
    server.run_forever();
}
