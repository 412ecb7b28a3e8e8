use database::{DatabaseConnectionInfo, PgDatabase};
use markers::{config::MarkerConfig, database::Database, memory::MemoryDatabase, server::Server};
use web::{start_web_server, WebConfig, WebState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let marker_config = MarkerConfig::from_env();
    let web_config = WebConfig::from_env();
    log::info!(
        "merging reports within {} m.",
        marker_config.merge_distance_km * 1000.0
    );

    // database
    match DatabaseConnectionInfo::from_env() {
        Some(database_connection_info) => {
            let database = PgDatabase::connect(database_connection_info)
                .await
                .expect("could not connect to database.");
            run(&web_config, Server::new(database, marker_config)).await;
        }
        None => {
            log::warn!("no database connection info in env, markers are kept in memory only.");
            run(&web_config, Server::new(MemoryDatabase::new(), marker_config)).await;
        }
    }
}

async fn run<D: Database + 'static>(web_config: &WebConfig, server: Server<D>) {
    if let Err(why) = start_web_server(web_config, WebState { server }).await {
        log::error!("web server stopped: {}", why);
        std::process::exit(1);
    }
}
