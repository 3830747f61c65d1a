use crate::config::SupabaseConfig;
use crate::state::{AppState, FleetTables};
use crate::types::{Bus, BusLocation, Driver};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Mirrors the hosted `buses`, `bus_locations` and `drivers` tables into
/// local state through the PostgREST API.
pub struct SupabaseFeed {
    config: SupabaseConfig,
}

impl SupabaseFeed {
    pub fn new(config: SupabaseConfig) -> Self {
        Self { config }
    }

    /// Polls forever on a background thread. A failed poll keeps whatever
    /// was loaded last; the next tick is the retry.
    pub fn start_poller(self, state: Arc<AppState>) {
        thread::spawn(move || {
            // The blocking client owns its own runtime, so it is built off the tokio workers.
            let client = match Client::builder().timeout(REQUEST_TIMEOUT).build() {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, "could not build Supabase client; remote sync disabled");
                    return;
                }
            };
            loop {
                match self.fetch(&client) {
                    Ok(tables) => {
                        let buses = tables.buses.len();
                        if state.replace_tables(tables) {
                            info!(buses, "synced fleet from Supabase");
                        } else {
                            debug!(buses, "Supabase fleet unchanged");
                        }
                    }
                    Err(e) => {
                        warn!(error = ?e, "Supabase poll failed; keeping previous fleet");
                    }
                }
                thread::sleep(self.config.poll_interval);
            }
        });
    }

    pub fn fetch(&self, client: &Client) -> Result<FleetTables> {
        Ok(FleetTables {
            buses: self.table::<Bus>(client, "buses")?,
            drivers: self.table::<Driver>(client, "drivers")?,
            locations: self.table::<BusLocation>(client, "bus_locations")?,
        })
    }

    fn table<T: DeserializeOwned>(&self, client: &Client, name: &str) -> Result<Vec<T>> {
        let body = client
            .get(table_url(&self.config.url, name))
            .header("apikey", &self.config.key)
            .bearer_auth(&self.config.key)
            .send()
            .with_context(|| format!("requesting {}", name))?
            .error_for_status()
            .with_context(|| format!("fetching {}", name))?
            .text()?;
        parse_rows(&body).with_context(|| format!("decoding {}", name))
    }
}

fn table_url(base: &str, table: &str) -> String {
    format!("{}/rest/v1/{}?select=*", base, table)
}

fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    Ok(serde_json::from_str(body)?)
}
