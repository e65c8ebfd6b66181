use crate::metrics::{render, MetricFamily};
use crate::remo_client::{RemoClient, ResourceKind};
use crate::smart_meter::{energy_reading, smart_meters};
use crate::types::{Appliance, Device, FetchResult, RateLimitMeta};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// State that outlives a single scrape
#[derive(Debug, Default)]
struct ExporterState {
    http_requests: BTreeMap<(u16, ResourceKind), u64>,
    last_meta: Option<RateLimitMeta>,
}

/// Turns Remo API data into Prometheus metrics, one collection per scrape
pub struct Exporter {
    client: Arc<RemoClient>,
    state: Mutex<ExporterState>,
}

/// Metric families filled during one collection
struct Collection {
    temperature: MetricFamily,
    humidity: MetricFamily,
    illumination: MetricFamily,
    motion_timestamp: MetricFamily,
    normal_energy: MetricFamily,
    reverse_energy: MetricFamily,
    coefficient: MetricFamily,
    energy_unit: MetricFamily,
    effective_digits: MetricFamily,
    measured_instantaneous: MetricFamily,
    cumulative_energy: MetricFamily,
    rate_limit_limit: MetricFamily,
    rate_limit_remaining: MetricFamily,
    rate_limit_reset: MetricFamily,
    http_requests: MetricFamily,
}

impl Collection {
    fn new() -> Self {
        Self {
            temperature: MetricFamily::gauge(
                "remo_temperature",
                "The temperature of the remo device",
            ),
            humidity: MetricFamily::gauge("remo_humidity", "The humidity of the remo device"),
            illumination: MetricFamily::gauge(
                "remo_illumination",
                "The illumination of the remo device",
            ),
            motion_timestamp: MetricFamily::gauge(
                "remo_motion_timestamp",
                "The last time motion was detected by the remo device, in unix seconds",
            ),
            normal_energy: MetricFamily::gauge(
                "remo_normal_direction_cumulative_electric_energy",
                "The normal direction cumulative electric energy reported by the smart meter",
            ),
            reverse_energy: MetricFamily::gauge(
                "remo_reverse_direction_cumulative_electric_energy",
                "The reverse direction cumulative electric energy reported by the smart meter",
            ),
            coefficient: MetricFamily::gauge(
                "remo_coefficient",
                "The coefficient for cumulative electric energy",
            ),
            energy_unit: MetricFamily::gauge(
                "remo_cumulative_electric_energy_unit",
                "The unit multiplier for cumulative electric energy, in kWh",
            ),
            effective_digits: MetricFamily::gauge(
                "remo_cumulative_electric_energy_effective_digits",
                "The number of effective digits for cumulative electric energy",
            ),
            measured_instantaneous: MetricFamily::gauge(
                "remo_measured_instantaneous",
                "The measured instantaneous electric power, in W",
            ),
            cumulative_energy: MetricFamily::gauge(
                "remo_cumulative_electric_energy",
                "The net cumulative electric energy, in kWh",
            ),
            rate_limit_limit: MetricFamily::gauge(
                "remo_x_rate_limit_limit",
                "The rate limit for the remo API",
            ),
            rate_limit_remaining: MetricFamily::gauge(
                "remo_x_rate_limit_remaining",
                "The number of requests remaining in the current rate limit window",
            ),
            rate_limit_reset: MetricFamily::gauge(
                "remo_x_rate_limit_reset",
                "The time at which the current rate limit window resets, in unix seconds",
            ),
            http_requests: MetricFamily::counter(
                "remo_http_requests_total",
                "The number of requests made to the remo API by status code and api",
            ),
        }
    }

    fn add_devices(&mut self, devices: &[Device]) {
        for device in devices {
            let Some(events) = &device.newest_events else {
                continue;
            };
            let labels = device_labels(device);

            if let Some(temperature) = &events.temperature {
                self.temperature.push(labels.clone(), temperature.value);
            }
            if let Some(humidity) = &events.humidity {
                self.humidity.push(labels.clone(), humidity.value);
            }
            if let Some(illumination) = &events.illumination {
                self.illumination.push(labels.clone(), illumination.value);
            }
            if let Some(created_at) = events.motion.as_ref().and_then(|m| m.created_at) {
                self.motion_timestamp
                    .push(labels.clone(), created_at.timestamp() as f64);
            }
        }
    }

    fn add_smart_meters(&mut self, appliances: &[Appliance]) {
        for appliance in smart_meters(appliances) {
            // One malformed meter must not hide the others
            let reading = match energy_reading(appliance) {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("Skipping smart meter '{}': {e}", appliance.device.name);
                    continue;
                }
            };
            let labels = device_labels(&appliance.device);

            self.normal_energy
                .push(labels.clone(), reading.normal_energy as f64);
            self.reverse_energy
                .push(labels.clone(), reading.reverse_energy as f64);
            self.coefficient
                .push(labels.clone(), reading.coefficient as f64);
            self.energy_unit.push(labels.clone(), reading.energy_unit);
            self.effective_digits
                .push(labels.clone(), reading.effective_digits as f64);
            self.measured_instantaneous
                .push(labels.clone(), reading.measured_instantaneous as f64);
            self.cumulative_energy
                .push(labels, reading.cumulative_electric_energy());
        }
    }

    fn add_state(&mut self, state: &ExporterState) {
        if let Some(meta) = state.last_meta {
            self.rate_limit_limit.push(vec![], meta.limit);
            self.rate_limit_remaining.push(vec![], meta.remaining);
            self.rate_limit_reset.push(vec![], meta.reset);
        }
        for ((code, api), count) in &state.http_requests {
            self.http_requests.push(
                vec![("code", code.to_string()), ("api", api.to_string())],
                *count as f64,
            );
        }
    }

    fn render(self) -> String {
        render(&[
            self.temperature,
            self.humidity,
            self.illumination,
            self.motion_timestamp,
            self.normal_energy,
            self.reverse_energy,
            self.coefficient,
            self.energy_unit,
            self.effective_digits,
            self.measured_instantaneous,
            self.cumulative_energy,
            self.rate_limit_limit,
            self.rate_limit_remaining,
            self.rate_limit_reset,
            self.http_requests,
        ])
    }
}

fn device_labels(device: &Device) -> Vec<(&'static str, String)> {
    vec![("name", device.name.clone()), ("id", device.id.clone())]
}

impl Exporter {
    pub fn new(client: Arc<RemoClient>) -> Self {
        Self {
            client,
            state: Mutex::new(ExporterState::default()),
        }
    }

    /// Fetches both resource kinds and renders the metrics for one scrape.
    ///
    /// A failed fetch drops the metrics of that resource kind only.
    pub async fn collect(&self) -> String {
        let mut collection = Collection::new();

        match self.client.get_devices().await {
            Ok(result) => {
                self.record(ResourceKind::Devices, &result).await;
                collection.add_devices(&result.payload);
            }
            Err(e) => error!("Fetching device stats failed: {e}"),
        }

        match self.client.get_appliances().await {
            Ok(result) => {
                self.record(ResourceKind::Appliances, &result).await;
                collection.add_smart_meters(&result.payload);
            }
            Err(e) => error!("Fetching appliance stats failed: {e}"),
        }

        collection.add_state(&*self.state.lock().await);
        collection.render()
    }

    /// Counts fresh responses and remembers their rate limit meta
    async fn record<T>(&self, resource: ResourceKind, result: &FetchResult<T>) {
        if result.from_cache {
            return;
        }
        let mut state = self.state.lock().await;
        *state
            .http_requests
            .entry((result.status_code, resource))
            .or_insert(0) += 1;
        state.last_meta = Some(result.meta);
    }
}
