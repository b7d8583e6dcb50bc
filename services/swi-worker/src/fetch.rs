//! Subset retrieval from the NOMADS grib-filter endpoint.
//!
//! Builds the parameterized filter URL for a cycle, probes availability
//! with HEAD, downloads the subset with retry and exponential backoff,
//! and decodes the concatenated GRIB2 messages into strategy inputs.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use grib2_decode::{Grib2Message, Grib2Reader};
use reqwest::Client;
use swi_common::{BoundingBox, ForecastCycle};
use swi_index::{FetchVariable, IndexInputs};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::cycle::AvailabilityProbe;

/// Build the grib-filter subset URL for one cycle.
///
/// The level and variable switches are emitted in sorted order so the
/// URL is deterministic for a given request.
pub fn filter_url(
    endpoint: &str,
    cycle: &ForecastCycle,
    bbox: &BoundingBox,
    variables: &[FetchVariable],
) -> String {
    let mut levels = BTreeSet::new();
    let mut vars = BTreeSet::new();

    for variable in variables {
        match variable {
            FetchVariable::SurfaceTemp => {
                levels.insert("lev_surface");
                vars.insert("var_tmp");
            }
            FetchVariable::Temp850 => {
                levels.insert("lev_850_mb");
                vars.insert("var_tmp");
            }
            FetchVariable::Wind10m => {
                levels.insert("lev_10_m_above_ground");
                vars.insert("var_ugrd");
                vars.insert("var_vgrd");
            }
            FetchVariable::Cape => {
                levels.insert("lev_surface");
                vars.insert("var_cape");
            }
            FetchVariable::WaterTemp => {
                levels.insert("lev_surface");
                vars.insert("var_wtmp");
            }
        }
    }

    let mut url = format!(
        "{}?file=gfs.t{:02}z.pgrb2.0p25.f{:03}",
        endpoint,
        cycle.cycle_hour(),
        cycle.forecast_hour
    );

    for switch in levels.iter().chain(vars.iter()) {
        url.push_str(&format!("&{}=on", switch));
    }

    url.push_str(&format!(
        "&subregion=&leftlon={}&rightlon={}&toplat={}&bottomlat={}",
        bbox.west, bbox.east, bbox.north, bbox.south
    ));
    url.push_str(&format!(
        "&dir=%2Fgfs.{}%2F{:02}%2Fatmos",
        cycle.date_compact(),
        cycle.cycle_hour()
    ));

    url
}

/// Downloads and decodes one cycle's variable subset.
pub struct SubsetFetcher {
    client: Client,
    endpoint: String,
    bbox: BoundingBox,
    variables: Vec<FetchVariable>,
    max_retries: u32,
    initial_retry_delay: Duration,
    max_retry_delay: Duration,
}

impl SubsetFetcher {
    pub fn new(
        source: &SourceConfig,
        bbox: BoundingBox,
        variables: Vec<FetchVariable>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(source.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: source.endpoint.clone(),
            bbox,
            variables,
            max_retries: source.max_retries,
            initial_retry_delay: Duration::from_secs(source.initial_retry_delay_secs),
            max_retry_delay: Duration::from_secs(source.max_retry_delay_secs),
        })
    }

    fn url(&self, cycle: &ForecastCycle) -> String {
        filter_url(&self.endpoint, cycle, &self.bbox, &self.variables)
    }

    /// Download and decode the subset for a confirmed cycle.
    ///
    /// Failure here is fatal: the cycle was probed as available, so an
    /// exhausted retry loop or undecodable payload is an operational
    /// error, not publication lag.
    pub async fn fetch(&self, cycle: &ForecastCycle) -> Result<IndexInputs> {
        let url = self.url(cycle);

        let data = self
            .download_with_retry(&url)
            .await
            .with_context(|| format!("Subset download failed for cycle {}", cycle.iso8601()))?;

        info!(cycle = %cycle.iso8601(), bytes = data.len(), "Downloaded subset");

        decode_subset(data, &self.variables)
            .with_context(|| format!("Malformed subset for cycle {}", cycle.iso8601()))
    }

    async fn download_with_retry(&self, url: &str) -> Result<Bytes> {
        let mut retry_count = 0;
        let mut delay = self.initial_retry_delay;

        loop {
            match self.try_download(url).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    retry_count += 1;

                    if retry_count > self.max_retries {
                        return Err(anyhow!(
                            "Download failed after {} attempts: {}",
                            retry_count,
                            e
                        ));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        "Subset download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.max_retry_delay);
                }
            }
        }
    }

    async fn try_download(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {}", response.status()));
        }

        response
            .bytes()
            .await
            .context("Error reading response body")
    }
}

#[async_trait]
impl AvailabilityProbe for SubsetFetcher {
    async fn available(&self, cycle: &ForecastCycle) -> bool {
        let url = self.url(cycle);

        match self.client.head(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(cycle = %cycle.iso8601(), error = %e, "Availability probe failed");
                false
            }
        }
    }
}

/// Decode a grib-filter response into the fields the strategy needs.
///
/// The filter returns the cross product of the requested variable and
/// level switches, so combinations nothing asked for (10 m temperature,
/// say) can arrive too; those are skipped.
fn decode_subset(data: Bytes, variables: &[FetchVariable]) -> Result<IndexInputs> {
    let mut reader = Grib2Reader::new(data);
    let mut inputs = IndexInputs::default();
    let mut messages = 0usize;

    while let Some(message) = reader
        .next_message()
        .context("Undecodable GRIB2 message")?
    {
        messages += 1;
        if !assign(&mut inputs, &message)? {
            debug!(
                parameter = message.parameter(),
                level = %message.product.level_description,
                "Ignoring unrequested subset message"
            );
        }
    }

    if messages == 0 {
        return Err(anyhow!("Subset response contained no GRIB2 messages"));
    }

    ensure_required(&inputs, variables)?;
    Ok(inputs)
}

/// Route one decoded message into its `IndexInputs` slot. Returns
/// false when no slot matches.
fn assign(inputs: &mut IndexInputs, message: &Grib2Message) -> Result<bool> {
    let key = (
        message.discipline(),
        message.product.parameter_category,
        message.product.parameter_number,
        message.product.level_type,
        message.product.level_value,
    );

    let slot = match key {
        // TMP at the surface and at 850 mb
        (0, 0, 0, 1, 0) => &mut inputs.surface_temp,
        (0, 0, 0, 100, 85_000) => &mut inputs.temp_850,
        // UGRD/VGRD at 10 m above ground
        (0, 2, 2, 103, 10) => &mut inputs.wind_u10,
        (0, 2, 3, 103, 10) => &mut inputs.wind_v10,
        // Surface CAPE
        (0, 7, 6, 1, 0) => &mut inputs.cape,
        // Water surface temperature (oceanographic discipline)
        (10, 3, 0, 1, 0) => &mut inputs.water_temp,
        _ => return Ok(false),
    };

    let field = message.to_field().with_context(|| {
        format!(
            "Decoding {} at {}",
            message.parameter(),
            message.product.level_description
        )
    })?;

    *slot = Some(field);
    Ok(true)
}

/// Verify every variable the strategy listed actually arrived.
fn ensure_required(inputs: &IndexInputs, variables: &[FetchVariable]) -> Result<()> {
    for variable in variables {
        let present = match variable {
            FetchVariable::SurfaceTemp => inputs.surface_temp.is_some(),
            FetchVariable::Temp850 => inputs.temp_850.is_some(),
            FetchVariable::Wind10m => {
                inputs.wind_u10.is_some() && inputs.wind_v10.is_some()
            }
            FetchVariable::Cape => inputs.cape.is_some(),
            FetchVariable::WaterTemp => inputs.water_temp.is_some(),
        };

        if !present {
            return Err(anyhow!(
                "Variable {:?} missing from subset response",
                variable
            ));
        }
    }
    Ok(())
}
