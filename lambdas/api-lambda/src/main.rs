use aws_sdk_dynamodb::Client as DynamoClient;
use hospital_shared::config::{Config, StoreBackend};
use hospital_shared::store::DynamoStore;
use hospital_shared::{seed, AppState};
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env();

    // Store clients are built once per cold start
    let state = match config.store_backend {
        StoreBackend::DynamoDb => {
            let aws_config = aws_config::load_from_env().await;
            let store = Arc::new(DynamoStore::new(
                DynamoClient::new(&aws_config),
                config.table_name.clone(),
            ));
            AppState::new(config, store.clone(), store)?
        }
        StoreBackend::Memory => AppState::in_memory(config)?,
    };

    seed::seed_accounts(&state.accounts).await?;
    if state.config.seed_demo_patients {
        seed::seed_patients(state.patients.as_ref()).await?;
    }

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
