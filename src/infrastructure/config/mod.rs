mod settings;

pub use settings::{
    DatabaseConfig, DispatchConfig, GatewaySettings, OtelConfig, RedisConfig, ServerConfig,
    Settings, StoreConfig,
};
