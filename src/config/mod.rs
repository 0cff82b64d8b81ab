pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    resolve_config_dir, CatalogConfig, Config, ExecutorConfig, GatewayConfig, CONFIG_FILE_NAME,
};
