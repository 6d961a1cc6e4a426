//! Configuration loading and parsing for the `schedule` command

use anyhow::{anyhow, bail, Context, Result};
use can_codec::{MessageCatalog, MessageDefinition, SchedulerConfig, SignalCodec, StaticValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Application configuration (loaded from a TOML file)
///
/// ```toml
/// [scheduler]
/// dispatch_queue_depth = 32
/// range_policy = "clamp"
///
/// [values.BMS_Limits]
/// Max_Charge_Power = 150.0
///
/// [values.BPS_Status]
/// BPS_State = "MPPT_CHARGING"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Message name -> signal name -> value
    #[serde(default)]
    pub values: BTreeMap<String, BTreeMap<String, ValueSetting>>,
}

/// A configured signal value: physical number or value-table label
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ValueSetting {
    Number(f64),
    Label(String),
}

impl ValueSetting {
    /// Parse command-line text: a number if it parses as one, otherwise a label
    pub fn parse(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(value) => ValueSetting::Number(value),
            Err(_) => ValueSetting::Label(text.to_string()),
        }
    }

    /// Physical value for a signal, looking labels up in its value table
    pub fn resolve(&self, message: &MessageDefinition, signal_name: &str) -> Result<f64> {
        let signal = message
            .signal(signal_name)
            .ok_or_else(|| anyhow!("Signal '{}' not found in {}", signal_name, message.name))?;

        match self {
            ValueSetting::Number(value) => Ok(*value),
            ValueSetting::Label(label) => {
                let table = message.value_table(signal_name).ok_or_else(|| {
                    anyhow!("Signal '{}' has no value table for label '{}'", signal_name, label)
                })?;
                let raw = table.raw_for_label(label).ok_or_else(|| {
                    anyhow!("Unknown label '{}' for signal '{}'", label, signal_name)
                })?;
                Ok(SignalCodec::raw_to_physical(signal, raw as i128))
            }
        }
    }
}

impl AppConfig {
    /// Turn the `[values]` tables into a value source for the scheduler
    pub fn initial_values(&self, catalog: &MessageCatalog) -> Result<StaticValues> {
        let values = StaticValues::new();

        for (message_name, signals) in &self.values {
            let Some(message) = catalog.lookup_by_name(message_name) else {
                bail!("Message '{}' in [values] is not in the catalog", message_name);
            };

            for (signal_name, setting) in signals {
                let physical = setting.resolve(message, signal_name).with_context(|| {
                    format!("Invalid value for {}.{}", message_name, signal_name)
                })?;
                values.set(message.id, signal_name.clone(), physical);
            }
        }

        Ok(values)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
