use crate::config_validator;
use crate::error::DecisionError;
use crate::model::{ConfidenceTier, MarketRegime};
use crate::reason_tags::ReasonTag;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::env;
use std::ops::Deref;
use tracing::info;

/// Upper bound for every duration setting: 30 days.
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 3600;

/// Seconds to milliseconds, saturating instead of wrapping.
pub fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs)
        .ok()
        .and_then(|s| s.checked_mul(1000))
        .unwrap_or(i64::MAX)
}

/// Same shape for every regime so a missing regime is a type error, not a
/// runtime lookup failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerRegime<T> {
    pub trend: T,
    pub range: T,
    pub extreme: T,
}

impl<T> PerRegime<T> {
    pub fn for_regime(&self, regime: MarketRegime) -> &T {
        match regime {
            MarketRegime::Trend => &self.trend,
            MarketRegime::Range => &self.range,
            MarketRegime::Extreme => &self.extreme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentUnit {
    /// 0.5 means half a percent
    Points,
    /// 0.005 means half a percent
    Fraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionPolicy {
    NoTrade,
    HoldPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertainQualityPolicy {
    AllowReduced,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub percent_unit: PercentUnit,
    /// Sanity band for percentage fields, in percentage points
    pub max_abs_percent_change: f64,
    pub max_abs_funding_rate: f64,
    /// 0 disables the wall-clock staleness check
    pub max_snapshot_age_secs: u64,
    /// Strictly increasing observations before a volume series is treated as cumulative
    pub cumulative_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRegimeThresholds {
    pub min_abs_price_change_1h: f64,
    pub min_abs_price_change_6h: f64,
    pub min_abs_imbalance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRegimeThresholds {
    pub max_abs_price_change_1h: f64,
    pub max_abs_imbalance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeConfig {
    pub extreme_abs_price_change_1h: f64,
    pub extreme_abs_oi_change_1h: f64,
    pub trend: TrendRegimeThresholds,
    pub range: RangeRegimeThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_abs_funding_rate: f64,
    pub max_oi_crowding_6h: f64,
    pub volume_spike_ratio: f64,
    /// Magnitudes; the cascade check looks for moves of at least this size downward
    pub liquidation_price_change_1h: f64,
    pub liquidation_oi_change_1h: f64,
    pub block_extreme_regime: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    pub min_volume_ratio: f64,
    pub poor_volume_ratio: f64,
    pub elevated_funding_rate: f64,
    pub divergence_price_change: f64,
    pub divergence_imbalance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// K in the K-of-N vote
    pub required_signals: u32,
    pub price_change_1h: f64,
    pub price_change_6h: f64,
    pub imbalance: f64,
    pub volume_ratio: f64,
    pub oi_change_1h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    pub high_margin: u32,
    pub ultra_margin: u32,
    pub uncertain_cap: ConfidenceTier,
    pub executable_floor: ConfidenceTier,
    pub allow_min_tier: ConfidenceTier,
    pub reduced_min_tier: ConfidenceTier,
    pub uncertain_quality_policy: UncertainQualityPolicy,
    pub regime_cap: PerRegime<ConfidenceTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyConfig {
    pub min_decision_interval_secs: u64,
    pub cooldown_secs: u64,
    pub flip_backoff_cap: u32,
    pub idle_after_no_trade: u32,
    pub suppression_policy: SuppressionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualConfig {
    pub agreement_boost: bool,
    pub partial_downgrade_tiers: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonTagConfig {
    /// Reason tag identifier -> display label
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ReasonTagConfig {
    /// Label keys may arrive lowercased from file or env sources.
    pub fn label_for(&self, tag: ReasonTag) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(tag.as_str()))
            .map(|(_, label)| label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub data: DataConfig,
    pub regime: RegimeConfig,
    pub risk: RiskConfig,
    pub quality: QualityConfig,
    pub signal: PerRegime<SignalThresholds>,
    pub confidence: ConfidenceConfig,
    pub frequency: FrequencyConfig,
    pub dual: DualConfig,
    #[serde(default)]
    pub reason_tags: ReasonTagConfig,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                percent_unit: PercentUnit::Points,
                max_abs_percent_change: 200.0,
                max_abs_funding_rate: 0.05,
                max_snapshot_age_secs: 0,
                cumulative_streak: 6,
            },
            regime: RegimeConfig {
                extreme_abs_price_change_1h: 4.0,
                extreme_abs_oi_change_1h: 12.0,
                trend: TrendRegimeThresholds {
                    min_abs_price_change_1h: 0.8,
                    min_abs_price_change_6h: 1.5,
                    min_abs_imbalance: 0.25,
                },
                range: RangeRegimeThresholds {
                    max_abs_price_change_1h: 0.4,
                    max_abs_imbalance: 0.15,
                },
            },
            risk: RiskConfig {
                max_abs_funding_rate: 0.001,
                max_oi_crowding_6h: 20.0,
                volume_spike_ratio: 5.0,
                liquidation_price_change_1h: 3.0,
                liquidation_oi_change_1h: 8.0,
                block_extreme_regime: true,
            },
            quality: QualityConfig {
                min_volume_ratio: 0.5,
                poor_volume_ratio: 0.2,
                elevated_funding_rate: 0.0005,
                divergence_price_change: 1.0,
                divergence_imbalance: 0.3,
            },
            signal: PerRegime {
                trend: SignalThresholds {
                    required_signals: 3,
                    price_change_1h: 0.5,
                    price_change_6h: 1.0,
                    imbalance: 0.2,
                    volume_ratio: 1.2,
                    oi_change_1h: 1.0,
                },
                range: SignalThresholds {
                    required_signals: 4,
                    price_change_1h: 0.8,
                    price_change_6h: 1.5,
                    imbalance: 0.35,
                    volume_ratio: 1.5,
                    oi_change_1h: 2.0,
                },
                extreme: SignalThresholds {
                    required_signals: 5,
                    price_change_1h: 1.5,
                    price_change_6h: 3.0,
                    imbalance: 0.5,
                    volume_ratio: 2.0,
                    oi_change_1h: 3.0,
                },
            },
            confidence: ConfidenceConfig {
                high_margin: 1,
                ultra_margin: 2,
                uncertain_cap: ConfidenceTier::High,
                executable_floor: ConfidenceTier::Medium,
                allow_min_tier: ConfidenceTier::High,
                reduced_min_tier: ConfidenceTier::Medium,
                uncertain_quality_policy: UncertainQualityPolicy::AllowReduced,
                regime_cap: PerRegime {
                    trend: ConfidenceTier::Ultra,
                    range: ConfidenceTier::High,
                    extreme: ConfidenceTier::Low,
                },
            },
            frequency: FrequencyConfig {
                min_decision_interval_secs: 300,
                cooldown_secs: 1800,
                flip_backoff_cap: 4,
                idle_after_no_trade: 3,
                suppression_policy: SuppressionPolicy::NoTrade,
            },
            dual: DualConfig {
                agreement_boost: true,
                partial_downgrade_tiers: 1,
            },
            reason_tags: ReasonTagConfig::default(),
        }
    }
}

impl ThresholdConfig {
    /// Build from an untyped document, reporting every missing key before
    /// attempting typed deserialization.
    pub fn from_value(document: serde_json::Value) -> Result<Self, DecisionError> {
        let missing = config_validator::check_required_keys(&document);
        if !missing.is_empty() {
            return Err(DecisionError::InvalidConfig(missing));
        }
        serde_json::from_value(document).map_err(|e| DecisionError::ConfigParse(e.to_string()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, DecisionError> {
        let document = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize::<serde_json::Value>()?;
        Self::from_value(document)
    }

    pub fn to_toml_string(&self) -> Result<String, DecisionError> {
        toml::to_string_pretty(self).map_err(|e| DecisionError::ConfigParse(e.to_string()))
    }

    /// Stable hash of the canonical JSON form (object keys sorted).
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Validate and seal. The only way to obtain a `ValidatedConfig`.
    pub fn validate(self) -> Result<ValidatedConfig, DecisionError> {
        config_validator::validate(&self).map_err(DecisionError::InvalidConfig)?;
        let fingerprint = self.fingerprint();
        info!(fingerprint = %fingerprint, "🛡️ Threshold configuration validated");
        Ok(ValidatedConfig {
            inner: self,
            fingerprint,
        })
    }
}

/// A `ThresholdConfig` that has passed every validator check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    inner: ThresholdConfig,
    fingerprint: String,
}

impl ValidatedConfig {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn into_inner(self) -> ThresholdConfig {
        self.inner
    }
}

impl Deref for ValidatedConfig {
    type Target = ThresholdConfig;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: ThresholdConfig,
}

impl Settings {
    /// Layered load: global file, project file, local override, then
    /// `TITAN__SECTION__KEY` environment variables.
    pub fn new() -> Result<Self, DecisionError> {
        let home = env::var("HOME").unwrap_or_else(|_| ".".into());
        let project = env::var("TITAN_DECISION_CONFIG").unwrap_or_else(|_| "config/decision".into());

        let document = Config::builder()
            // 1. Global config from ~/.titan/decision.{toml,json}
            .add_source(File::with_name(&format!("{}/.titan/decision", home)).required(false))
            // 2. Project config (checked in)
            .add_source(File::with_name(&project).required(false))
            // 3. Local overrides (not checked in)
            .add_source(File::with_name("config/local").required(false))
            // 4. e.g. TITAN__FREQUENCY__COOLDOWN_SECS=900
            .add_source(
                Environment::with_prefix("TITAN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<serde_json::Value>()?;

        let thresholds = ThresholdConfig::from_value(document)?;
        Ok(Self { thresholds })
    }
}
