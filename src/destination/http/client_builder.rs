use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::{DestinationConfig, TimeoutConfig};

impl DestinationConfig {
    pub fn create_client(&self) -> Result<Client> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        let (operation_timeout, connect_timeout) = self.timeout_config.build_timeouts();
        if let Some(operation_timeout) = operation_timeout {
            builder = builder.timeout(operation_timeout);
        }
        if let Some(connect_timeout) = connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        builder
            .build()
            .context("reqwest::ClientBuilder::build() failed.")
    }
}

impl TimeoutConfig {
    // Unset timeouts leave reqwest's own defaults in place (no operation timeout).
    fn build_timeouts(&self) -> (Option<Duration>, Option<Duration>) {
        (
            self.operation_timeout_milliseconds.map(Duration::from_millis),
            self.connect_timeout_milliseconds.map(Duration::from_millis),
        )
    }
}
