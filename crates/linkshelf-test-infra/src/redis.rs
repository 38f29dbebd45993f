use crate::error::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

const REDIS_PORT: u16 = 6379;

/// A throwaway Redis server standing in for the shared preview store.
///
/// The container is removed when this value is dropped.
pub struct RedisServer {
    container: ContainerAsync<GenericImage>,
}

impl RedisServer {
    pub async fn start() -> Result<Self> {
        let container = GenericImage::new("redis", "8.6.0")
            .with_exposed_port(REDIS_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await?;
        Ok(Self { container })
    }

    /// Connection URL reachable from the test process.
    pub async fn url(&self) -> Result<String> {
        let host = self.container.get_host().await?.to_string();
        let host = match host.as_str() {
            "localhost" => String::from("127.0.0.1"),
            _ => host,
        };
        let port = self.container.get_host_port_ipv4(REDIS_PORT).await?;
        Ok(format!("redis://{host}:{port}"))
    }

    /// Opens a multiplexed connection to the server.
    pub async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(self.url().await?.as_str())?;
        Ok(client.get_multiplexed_async_connection().await?)
    }
}
