// Configuration management with layered configuration (file, env)

use crate::errors::ValidationError;
use crate::models::JobKey;
use crate::registry::JobClass;
use crate::schedule::parse_timezone;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub observability: ObservabilityConfig,
    pub scheduler: SchedulerConfig,
    /// Job classes the control plane may instantiate
    pub job_classes: Vec<JobClass>,
    /// Jobs registered through `add_job` at startup
    pub jobs: Vec<JobSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
    /// 0 disables the Prometheus exporter
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_port: 9090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the daemon audits the inventory (in seconds)
    pub audit_interval_seconds: u64,
    /// Whether audits normalize triggers too
    pub include_triggers: bool,
    /// Time zone of cron triggers created by the control plane
    pub default_timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            audit_interval_seconds: 60,
            include_triggers: true,
            default_timezone: "UTC".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn time_zone(&self) -> Result<Tz, ValidationError> {
        parse_timezone(&self.default_timezone).map_err(|e| ValidationError::InvalidFieldValue {
            field: "scheduler.default_timezone".to_string(),
            reason: e.to_string(),
        })
    }
}

/// A job to register at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSeed {
    pub group: String,
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub description: String,
    pub cron: String,
    #[serde(default)]
    pub replace: bool,
}

impl JobSeed {
    pub fn key(&self) -> JobKey {
        JobKey::new(self.group.clone(), self.name.clone())
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.observability.log_level.trim().is_empty() {
            return Err(ValidationError::MissingField(
                "observability.log_level".to_string(),
            ));
        }

        if self.scheduler.audit_interval_seconds == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "scheduler.audit_interval_seconds".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        self.scheduler.time_zone()?;

        let mut class_names = HashSet::new();
        for class in &self.job_classes {
            if class.name.trim().is_empty() {
                return Err(ValidationError::MissingField("job_classes.name".to_string()));
            }
            if !class_names.insert(class.name.as_str()) {
                return Err(ValidationError::Duplicate(format!("job class {}", class.name)));
            }
        }

        let mut job_keys = HashSet::new();
        for (index, job) in self.jobs.iter().enumerate() {
            for (field, value) in [
                ("name", &job.name),
                ("class", &job.class),
                ("cron", &job.cron),
            ] {
                if value.trim().is_empty() {
                    return Err(ValidationError::MissingField(format!(
                        "jobs[{}].{}",
                        index, field
                    )));
                }
            }
            if !job_keys.insert(job.key()) {
                return Err(ValidationError::Duplicate(format!("job {}", job.key())));
            }
        }

        Ok(())
    }
}
