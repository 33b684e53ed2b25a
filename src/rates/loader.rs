//! Rate-table loading and validation.
//!
//! The configuration source is a sheet-sync JSON export. All structural
//! problems (negative rates, multipliers outside (0, 2], unsorted or
//! duplicate zones) are rejected here at load time so the calculators can
//! assume a well-formed snapshot.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::location::{CoordinateSource, Coordinates};
use crate::models::rate_table::{
    Branch, DeliveryRate, DiscountKind, DiscountRule, Extra, ExtraPricing, RateTable, ServiceZone,
    TaxRates, TrailerRate,
};

// ── Raw document (sheet-sync export shape) ───────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RawTrailerRate {
    pub trailer_type: String,
    pub daily: Decimal,
    pub weekly: Decimal,
    pub monthly: Decimal,
    pub size_multiplier: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBranch {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub service_radius: f64,
    pub priority: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStateCityRate {
    pub state: String,
    pub city: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStateRate {
    pub state: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTaxRates {
    #[serde(default)]
    pub state_city: Vec<RawStateCityRate>,
    #[serde(default)]
    pub state: Vec<RawStateRate>,
    pub default_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRateDocument {
    pub version: String,
    pub effective_date: NaiveDate,
    pub trailer_rates: Vec<RawTrailerRate>,
    pub usage_multipliers: HashMap<String, Decimal>,
    /// Keyed by month "1".."12".
    pub seasonal_multipliers: HashMap<String, Decimal>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    pub tax_rates: RawTaxRates,
    pub delivery_zones: Vec<ServiceZone>,
    pub branches: Vec<RawBranch>,
    #[serde(default)]
    pub discounts: Vec<DiscountRule>,
    pub delivery_rate: DeliveryRate,
}

fn check_multiplier(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO || value > Decimal::TWO {
        bail!("multiplier '{}' = {} outside (0, 2]", name, value);
    }
    Ok(())
}

fn check_rate(name: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        bail!("rate '{}' = {} is negative", name, value);
    }
    Ok(())
}

impl RawRateDocument {
    /// Convert the raw rows into a validated, typed snapshot.
    pub fn validate(self) -> Result<RateTable> {
        if self.version.trim().is_empty() {
            bail!("rate document has an empty version");
        }

        let mut trailer_rates = HashMap::new();
        for row in &self.trailer_rates {
            check_rate(&format!("{}.daily", row.trailer_type), row.daily)?;
            check_rate(&format!("{}.weekly", row.trailer_type), row.weekly)?;
            check_rate(&format!("{}.monthly", row.trailer_type), row.monthly)?;
            if let Some(m) = row.size_multiplier {
                check_multiplier(&format!("{}.size_multiplier", row.trailer_type), m)?;
            }
            if trailer_rates
                .insert(
                    row.trailer_type.clone(),
                    TrailerRate {
                        trailer_type: row.trailer_type.clone(),
                        daily: row.daily,
                        weekly: row.weekly,
                        monthly: row.monthly,
                        size_multiplier: row.size_multiplier,
                    },
                )
                .is_some()
            {
                bail!("duplicate trailer_type '{}'", row.trailer_type);
            }
        }
        if trailer_rates.is_empty() {
            bail!("rate document has no trailer rates");
        }

        for (usage, m) in &self.usage_multipliers {
            check_multiplier(&format!("usage.{}", usage), *m)?;
        }
        if self.usage_multipliers.is_empty() {
            bail!("rate document has no usage multipliers");
        }

        let mut seasonal_multipliers = HashMap::new();
        for (month_str, m) in &self.seasonal_multipliers {
            let month: u32 = month_str
                .parse()
                .with_context(|| format!("seasonal month key '{}' is not a number", month_str))?;
            if !(1..=12).contains(&month) {
                bail!("seasonal month {} outside 1-12", month);
            }
            check_multiplier(&format!("seasonal.{}", month), *m)?;
            seasonal_multipliers.insert(month, *m);
        }

        let mut extras_catalog = HashMap::new();
        for extra in self.extras {
            match &extra.pricing {
                ExtraPricing::DurationBased { daily, weekly, monthly } => {
                    check_rate(&format!("extra.{}.daily", extra.id), *daily)?;
                    check_rate(&format!("extra.{}.weekly", extra.id), *weekly)?;
                    check_rate(&format!("extra.{}.monthly", extra.id), *monthly)?;
                }
                ExtraPricing::PerService { flat } => {
                    check_rate(&format!("extra.{}.flat", extra.id), *flat)?;
                }
                ExtraPricing::PerHour { rate, minimum_hours } => {
                    check_rate(&format!("extra.{}.rate", extra.id), *rate)?;
                    if *minimum_hours == 0 {
                        bail!("extra '{}' has minimum_hours = 0", extra.id);
                    }
                }
            }
            if extras_catalog.insert(extra.id.clone(), extra).is_some() {
                bail!("duplicate extra id");
            }
        }

        let mut by_state_city = HashMap::new();
        for row in &self.tax_rates.state_city {
            check_rate(&format!("tax.{}.{}", row.state, row.city), row.rate)?;
            by_state_city.insert(TaxRates::city_key(&row.state, &row.city), row.rate);
        }
        let mut by_state = HashMap::new();
        for row in &self.tax_rates.state {
            check_rate(&format!("tax.{}", row.state), row.rate)?;
            by_state.insert(row.state.to_uppercase(), row.rate);
        }
        check_rate("tax.default", self.tax_rates.default_rate)?;

        let mut delivery_zones = self.delivery_zones;
        if delivery_zones.is_empty() {
            bail!("rate document has no delivery zones");
        }
        delivery_zones.sort_by(|a, b| {
            a.max_distance
                .partial_cmp(&b.max_distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for pair in delivery_zones.windows(2) {
            if pair[0].max_distance == pair[1].max_distance {
                bail!(
                    "zones '{}' and '{}' share max_distance {}",
                    pair[0].name,
                    pair[1].name,
                    pair[0].max_distance
                );
            }
        }
        for zone in &delivery_zones {
            if zone.max_distance <= 0.0 {
                bail!("zone '{}' has non-positive max_distance", zone.name);
            }
            check_rate(&format!("zone.{}.rate_per_mile", zone.name), zone.rate_per_mile)?;
            check_rate(&format!("zone.{}.minimum_charge", zone.name), zone.minimum_charge)?;
        }

        if self.branches.is_empty() {
            bail!("rate document has no branches");
        }
        let mut branches = Vec::with_capacity(self.branches.len());
        let mut seen_branch_ids = std::collections::HashSet::new();
        for b in self.branches {
            if b.service_radius <= 0.0 {
                bail!("branch '{}' has non-positive service_radius", b.id);
            }
            if !seen_branch_ids.insert(b.id.clone()) {
                bail!("duplicate branch id '{}'", b.id);
            }
            branches.push(Branch {
                id: b.id,
                name: b.name,
                coordinates: Coordinates::new(b.lat, b.lon, CoordinateSource::Branch),
                service_radius: b.service_radius,
                priority: b.priority,
            });
        }

        for rule in &self.discounts {
            match &rule.kind {
                DiscountKind::Percent { value } => {
                    if *value <= Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
                        bail!("discount '{}' percent {} outside (0, 100]", rule.id, value);
                    }
                }
                DiscountKind::Flat { value } => check_rate(&format!("discount.{}", rule.id), *value)?,
            }
        }

        check_rate("delivery.base_rate", self.delivery_rate.base_rate)?;

        Ok(RateTable {
            version: self.version,
            effective_date: self.effective_date,
            trailer_rates,
            usage_multipliers: self.usage_multipliers,
            seasonal_multipliers,
            extras_catalog,
            tax_rates: TaxRates {
                by_state_city,
                by_state,
                default_rate: self.tax_rates.default_rate,
            },
            delivery_zones,
            branches,
            discount_rules: self.discounts,
            delivery_rate: self.delivery_rate,
        })
    }
}

// ── Loader ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum RatesSource {
    Url(String),
    File(PathBuf),
}

/// Fetches and validates rate-table snapshots from the configured source.
#[derive(Clone)]
pub struct RatesLoader {
    client: reqwest::Client,
    source: RatesSource,
}

impl RatesLoader {
    pub fn new(source: RatesSource) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("HaulQuote-RatesSync/1.0")
                .build()
                .expect("failed to build rates HTTP client"),
            source,
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Result<Self> {
        let source = match (&cfg.rates_file, &cfg.rates_url) {
            (Some(file), _) => RatesSource::File(PathBuf::from(file)),
            (None, Some(url)) => RatesSource::Url(url.clone()),
            (None, None) => bail!("no rate-table source configured"),
        };
        Ok(Self::new(source))
    }

    /// Fetch, parse, and validate one snapshot. Callers decide whether a
    /// failure is fatal (initial load) or keeps the old snapshot (refresh).
    pub async fn load(&self) -> Result<RateTable> {
        let raw = self.fetch_raw().await?;
        let doc: RawRateDocument =
            serde_json::from_str(&raw).context("rate document is not valid JSON")?;
        doc.validate().context("rate document failed validation")
    }

    async fn fetch_raw(&self) -> Result<String> {
        match &self.source {
            RatesSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read rates file {}", path.display())),
            RatesSource::Url(url) => {
                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("rates fetch failed: {}", url))?;
                if !resp.status().is_success() {
                    bail!("rates fetch returned {}", resp.status());
                }
                resp.text().await.context("rates fetch body read failed")
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
