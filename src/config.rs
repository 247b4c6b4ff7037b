use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Application configuration
///
/// Every knob has a default; `load()` reads overrides from the environment
/// (a `.env` file is honored when present).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub imagery: ImageryConfig,
    pub weather: WeatherConfig,
    pub alerts: AlertsConfig,
    pub analysis: AnalysisConfig,
    pub planner: PlannerConfig,
    pub cache: CacheConfig,
}

/// Imagery provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageryConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Acquisitions above this cloud percentage are rejected outright;
    /// results between 0 and this value degrade confidence.
    pub max_cloud_pct: f64,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

/// Retry policy for transient provider failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_ms: u64,
    pub factor: f64,
    pub jitter_pct: u32,
}

/// Weather provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub thresholds: WeatherThresholds,
}

/// Agronomic thresholds for weather-driven alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherThresholds {
    pub frost_temp_c: f64,
    pub frost_humidity_pct: f64,
    pub frost_wind_ms: f64,
    pub heat_temp_c: f64,
    pub wind_speed_ms: f64,
    pub precipitation_probability_pct: f64,
    pub drought_dry_days: u32,
    /// Dry-day count at which weather drought saturates to its worst band.
    pub drought_reference_days: u32,
    pub fire_index_threshold: f64,
}

/// Alert engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub dedup_window_hours: i64,
    pub dispatch_critical_and_above_only: bool,
    pub drought_trigger: f64,
    pub drought_emergency: f64,
    pub disease_trigger: f64,
    pub disease_critical: f64,
    pub nutrient_trigger: f64,
    pub nutrient_critical: f64,
    pub pest_trigger: f64,
    pub pest_critical: f64,
    pub decline_health_threshold: u8,
    pub decline_critical_health: u8,
}

/// Analysis engine and orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Concurrent field analyses per farm run.
    pub concurrency: usize,
    pub per_field_timeout_ms: u64,
    pub persistence_timeout_ms: u64,
}

/// Variable-rate multipliers per management-zone band
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneMultipliers {
    pub stressed: f64,
    pub moderate: f64,
    pub healthy: f64,
}

/// Precision planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub fertilizer_multipliers: ZoneMultipliers,
    pub irrigation_multipliers: ZoneMultipliers,
    pub seed_multipliers: ZoneMultipliers,
    pub pesticide_multipliers: ZoneMultipliers,
    pub lime_multipliers: ZoneMultipliers,
}

/// Cache TTLs, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub weather_current_ttl_s: u64,
    pub weather_forecast_ttl_s: u64,
    pub analysis_history_ttl_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            imagery: ImageryConfig {
                base_url: "https://api.spectral.example.com".to_string(),
                api_key: None,
                max_cloud_pct: 30.0,
                timeout_ms: 20_000,
                retry: RetryConfig {
                    attempts: 4,
                    base_ms: 250,
                    factor: 2.0,
                    jitter_pct: 20,
                },
            },
            weather: WeatherConfig {
                base_url: "https://api.meteo.example.com".to_string(),
                api_key: None,
                timeout_ms: 10_000,
                thresholds: WeatherThresholds {
                    frost_temp_c: 2.0,
                    frost_humidity_pct: 80.0,
                    frost_wind_ms: 3.0,
                    heat_temp_c: 35.0,
                    wind_speed_ms: 15.0,
                    precipitation_probability_pct: 80.0,
                    drought_dry_days: 7,
                    drought_reference_days: 14,
                    fire_index_threshold: 100.0,
                },
            },
            alerts: AlertsConfig {
                dedup_window_hours: 24,
                dispatch_critical_and_above_only: true,
                drought_trigger: 0.6,
                drought_emergency: 0.9,
                disease_trigger: 0.7,
                disease_critical: 0.85,
                nutrient_trigger: 0.7,
                nutrient_critical: 0.85,
                pest_trigger: 0.6,
                pest_critical: 0.8,
                decline_health_threshold: 30,
                decline_critical_health: 20,
            },
            analysis: AnalysisConfig {
                concurrency: 8,
                per_field_timeout_ms: 60_000,
                persistence_timeout_ms: 5_000,
            },
            planner: PlannerConfig {
                fertilizer_multipliers: ZoneMultipliers {
                    stressed: 1.4,
                    moderate: 1.1,
                    healthy: 0.9,
                },
                irrigation_multipliers: ZoneMultipliers {
                    stressed: 1.5,
                    moderate: 1.2,
                    healthy: 0.8,
                },
                seed_multipliers: ZoneMultipliers {
                    stressed: 1.2,
                    moderate: 1.05,
                    healthy: 0.95,
                },
                pesticide_multipliers: ZoneMultipliers {
                    stressed: 1.35,
                    moderate: 1.1,
                    healthy: 0.85,
                },
                lime_multipliers: ZoneMultipliers {
                    stressed: 1.25,
                    moderate: 1.0,
                    healthy: 0.9,
                },
            },
            cache: CacheConfig {
                weather_current_ttl_s: 600,
                weather_forecast_ttl_s: 1800,
                analysis_history_ttl_s: 86_400,
            },
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {key}")),
        Err(_) => Ok(default),
    }
}

fn parse_multipliers(key: &str, default: ZoneMultipliers) -> Result<ZoneMultipliers> {
    let raw = match env::var(key) {
        Ok(raw) => raw,
        Err(_) => return Ok(default),
    };
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        anyhow::bail!("{key} must be three comma-separated values (stressed,moderate,healthy)");
    }
    Ok(ZoneMultipliers {
        stressed: parts[0].parse().with_context(|| format!("Invalid {key}"))?,
        moderate: parts[1].parse().with_context(|| format!("Invalid {key}"))?,
        healthy: parts[2].parse().with_context(|| format!("Invalid {key}"))?,
    })
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            imagery: ImageryConfig {
                base_url: env::var("IMAGERY_BASE_URL").unwrap_or(defaults.imagery.base_url),
                api_key: env::var("IMAGERY_API_KEY").ok(),
                max_cloud_pct: parse_env("IMAGERY_MAX_CLOUD_PCT", defaults.imagery.max_cloud_pct)?,
                timeout_ms: parse_env("IMAGERY_TIMEOUT_MS", defaults.imagery.timeout_ms)?,
                retry: RetryConfig {
                    attempts: parse_env("IMAGERY_RETRY_ATTEMPTS", defaults.imagery.retry.attempts)?,
                    base_ms: parse_env("IMAGERY_RETRY_BASE_MS", defaults.imagery.retry.base_ms)?,
                    factor: parse_env("IMAGERY_RETRY_FACTOR", defaults.imagery.retry.factor)?,
                    jitter_pct: parse_env(
                        "IMAGERY_RETRY_JITTER_PCT",
                        defaults.imagery.retry.jitter_pct,
                    )?,
                },
            },
            weather: WeatherConfig {
                base_url: env::var("WEATHER_BASE_URL").unwrap_or(defaults.weather.base_url),
                api_key: env::var("WEATHER_API_KEY").ok(),
                timeout_ms: parse_env("WEATHER_TIMEOUT_MS", defaults.weather.timeout_ms)?,
                thresholds: WeatherThresholds {
                    frost_temp_c: parse_env(
                        "WEATHER_FROST_TEMP_C",
                        defaults.weather.thresholds.frost_temp_c,
                    )?,
                    frost_humidity_pct: parse_env(
                        "WEATHER_FROST_HUMIDITY_PCT",
                        defaults.weather.thresholds.frost_humidity_pct,
                    )?,
                    frost_wind_ms: parse_env(
                        "WEATHER_FROST_WIND_MS",
                        defaults.weather.thresholds.frost_wind_ms,
                    )?,
                    heat_temp_c: parse_env(
                        "WEATHER_HEAT_TEMP_C",
                        defaults.weather.thresholds.heat_temp_c,
                    )?,
                    wind_speed_ms: parse_env(
                        "WEATHER_WIND_SPEED_MS",
                        defaults.weather.thresholds.wind_speed_ms,
                    )?,
                    precipitation_probability_pct: parse_env(
                        "WEATHER_PRECIPITATION_PROBABILITY_PCT",
                        defaults.weather.thresholds.precipitation_probability_pct,
                    )?,
                    drought_dry_days: parse_env(
                        "WEATHER_DROUGHT_DRY_DAYS",
                        defaults.weather.thresholds.drought_dry_days,
                    )?,
                    drought_reference_days: parse_env(
                        "WEATHER_DROUGHT_REFERENCE_DAYS",
                        defaults.weather.thresholds.drought_reference_days,
                    )?,
                    fire_index_threshold: parse_env(
                        "WEATHER_FIRE_INDEX_THRESHOLD",
                        defaults.weather.thresholds.fire_index_threshold,
                    )?,
                },
            },
            alerts: AlertsConfig {
                dedup_window_hours: parse_env(
                    "ALERTS_DEDUP_WINDOW_HOURS",
                    defaults.alerts.dedup_window_hours,
                )?,
                dispatch_critical_and_above_only: parse_env(
                    "ALERTS_DISPATCH_CRITICAL_AND_ABOVE_ONLY",
                    defaults.alerts.dispatch_critical_and_above_only,
                )?,
                drought_trigger: parse_env("ALERTS_DROUGHT_TRIGGER", defaults.alerts.drought_trigger)?,
                drought_emergency: parse_env(
                    "ALERTS_DROUGHT_EMERGENCY",
                    defaults.alerts.drought_emergency,
                )?,
                disease_trigger: parse_env("ALERTS_DISEASE_TRIGGER", defaults.alerts.disease_trigger)?,
                disease_critical: parse_env(
                    "ALERTS_DISEASE_CRITICAL",
                    defaults.alerts.disease_critical,
                )?,
                nutrient_trigger: parse_env(
                    "ALERTS_NUTRIENT_TRIGGER",
                    defaults.alerts.nutrient_trigger,
                )?,
                nutrient_critical: parse_env(
                    "ALERTS_NUTRIENT_CRITICAL",
                    defaults.alerts.nutrient_critical,
                )?,
                pest_trigger: parse_env("ALERTS_PEST_TRIGGER", defaults.alerts.pest_trigger)?,
                pest_critical: parse_env("ALERTS_PEST_CRITICAL", defaults.alerts.pest_critical)?,
                decline_health_threshold: parse_env(
                    "ALERTS_DECLINE_HEALTH_THRESHOLD",
                    defaults.alerts.decline_health_threshold,
                )?,
                decline_critical_health: parse_env(
                    "ALERTS_DECLINE_CRITICAL_HEALTH",
                    defaults.alerts.decline_critical_health,
                )?,
            },
            analysis: AnalysisConfig {
                concurrency: parse_env("ANALYSIS_CONCURRENCY", defaults.analysis.concurrency)?,
                per_field_timeout_ms: parse_env(
                    "ANALYSIS_PER_FIELD_TIMEOUT_MS",
                    defaults.analysis.per_field_timeout_ms,
                )?,
                persistence_timeout_ms: parse_env(
                    "ANALYSIS_PERSISTENCE_TIMEOUT_MS",
                    defaults.analysis.persistence_timeout_ms,
                )?,
            },
            planner: PlannerConfig {
                fertilizer_multipliers: parse_multipliers(
                    "PLANNER_FERTILIZER_MULTIPLIERS",
                    defaults.planner.fertilizer_multipliers,
                )?,
                irrigation_multipliers: parse_multipliers(
                    "PLANNER_IRRIGATION_MULTIPLIERS",
                    defaults.planner.irrigation_multipliers,
                )?,
                seed_multipliers: parse_multipliers(
                    "PLANNER_SEED_MULTIPLIERS",
                    defaults.planner.seed_multipliers,
                )?,
                pesticide_multipliers: parse_multipliers(
                    "PLANNER_PESTICIDE_MULTIPLIERS",
                    defaults.planner.pesticide_multipliers,
                )?,
                lime_multipliers: parse_multipliers(
                    "PLANNER_LIME_MULTIPLIERS",
                    defaults.planner.lime_multipliers,
                )?,
            },
            cache: CacheConfig {
                weather_current_ttl_s: parse_env(
                    "CACHE_WEATHER_CURRENT_TTL_S",
                    defaults.cache.weather_current_ttl_s,
                )?,
                weather_forecast_ttl_s: parse_env(
                    "CACHE_WEATHER_FORECAST_TTL_S",
                    defaults.cache.weather_forecast_ttl_s,
                )?,
                analysis_history_ttl_s: parse_env(
                    "CACHE_ANALYSIS_HISTORY_TTL_S",
                    defaults.cache.analysis_history_ttl_s,
                )?,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.imagery.max_cloud_pct) {
            anyhow::bail!("IMAGERY_MAX_CLOUD_PCT must be between 0 and 100");
        }

        if self.imagery.retry.attempts == 0 {
            anyhow::bail!("IMAGERY_RETRY_ATTEMPTS must be greater than 0");
        }

        if self.imagery.retry.factor < 1.0 {
            anyhow::bail!("IMAGERY_RETRY_FACTOR must be at least 1.0");
        }

        if self.imagery.retry.jitter_pct > 100 {
            anyhow::bail!("IMAGERY_RETRY_JITTER_PCT must be at most 100");
        }

        if self.analysis.concurrency == 0 {
            anyhow::bail!("ANALYSIS_CONCURRENCY must be greater than 0");
        }

        if self.alerts.dedup_window_hours <= 0 {
            anyhow::bail!("ALERTS_DEDUP_WINDOW_HOURS must be greater than 0");
        }

        if self.alerts.drought_trigger >= self.alerts.drought_emergency {
            anyhow::bail!("ALERTS_DROUGHT_TRIGGER must be below ALERTS_DROUGHT_EMERGENCY");
        }

        if self.alerts.decline_critical_health >= self.alerts.decline_health_threshold {
            anyhow::bail!(
                "ALERTS_DECLINE_CRITICAL_HEALTH must be below ALERTS_DECLINE_HEALTH_THRESHOLD"
            );
        }

        if self.weather.thresholds.drought_reference_days < self.weather.thresholds.drought_dry_days
        {
            anyhow::bail!(
                "WEATHER_DROUGHT_REFERENCE_DAYS must be at least WEATHER_DROUGHT_DRY_DAYS"
            );
        }

        for (name, m) in [
            ("fertilizer", &self.planner.fertilizer_multipliers),
            ("irrigation", &self.planner.irrigation_multipliers),
            ("seed", &self.planner.seed_multipliers),
            ("pesticide", &self.planner.pesticide_multipliers),
            ("lime", &self.planner.lime_multipliers),
        ] {
            if m.stressed <= 0.0 || m.moderate <= 0.0 || m.healthy <= 0.0 {
                anyhow::bail!("planner {name} zone multipliers must all be positive");
            }
        }

        Ok(())
    }
}
