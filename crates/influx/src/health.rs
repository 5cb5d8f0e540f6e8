//! InfluxDB health checks.

use crate::client::InfluxClient;
use telemetry::health;
use tracing::{debug, error};

/// Check InfluxDB connection health and record the result.
pub async fn check_connection(client: &InfluxClient) -> bool {
    match client.ping().await {
        Ok(true) => {
            debug!("InfluxDB connection healthy");
            health().influxdb.set_healthy();
            true
        }
        Ok(false) => {
            error!("InfluxDB ping returned an unexpected status");
            health()
                .influxdb
                .set_unhealthy("ping returned an unexpected status");
            false
        }
        Err(e) => {
            error!("InfluxDB health check failed: {}", e);
            health().influxdb.set_unhealthy(e.to_string());
            false
        }
    }
}
