use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, bail};
use serde_derive::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub mqtt: Option<MqttConfig>,
    pub devices: Option<Vec<DeviceConfig>>,
    pub scan: Option<ScanConfig>,
    pub targets: Option<Vec<TargetConfig>>,
    pub arming: Option<ArmingConfig>,
    pub notify: Option<NotifyConfig>,
    pub dispatch: Option<DispatchConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("loading config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::de::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let scan = self.scan.clone().unwrap_or_default();
        let dispatch = self.dispatch.clone().unwrap_or_default();
        for (name, value) in [
            ("scan.timeout_seconds", scan.timeout()),
            ("scan.check_interval_seconds", scan.check_interval()),
            ("scan.poll_interval_seconds", scan.poll_interval()),
            ("dispatch.timeout_seconds", dispatch.timeout()),
        ] {
            if value.is_zero() {
                bail!("{} must be greater than zero", name);
            }
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeviceConfig {
    pub address: String,
    pub name: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub interface: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub check_interval_seconds: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
}

impl ScanConfig {
    pub fn command(&self) -> String {
        self.command.clone().unwrap_or_else(|| "arp-scan".to_string())
    }

    /// Arguments for the scan command, with `-I <interface>` in front when an
    /// interface is configured.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(interface) = &self.interface {
            args.push("-I".to_string());
            args.push(interface.clone());
        }
        match &self.args {
            Some(configured) => args.extend(configured.iter().cloned()),
            None => args.extend(["-l", "-r", "10"].map(String::from)),
        }
        args
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(120))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.unwrap_or(5))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.unwrap_or(60))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetConfig {
    Local { id: String },
    Remote { reference: String },
}

/// Hook used to arm local targets, run as `<command> <args..> <target> <on|off>`.
#[derive(Deserialize, Debug, Clone)]
pub struct ArmingConfig {
    pub command: String,
    pub args: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    pub username: Option<String>,
    pub prefix: Option<String>,
}

impl NotifyConfig {
    pub fn prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| "meye".to_string())
    }
}

/// Deadline for each arming or notification call.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct DispatchConfig {
    pub timeout_seconds: Option<u64>,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(30))
    }
}
