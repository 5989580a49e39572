use std::process::Stdio;

use anyhow::{Context as _, anyhow, bail};
use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use crate::config::ArmingConfig;
use crate::dispatch::ArmingBackend;
use crate::messages::ArmMode;
use crate::mqtt::MqttClient;

/// Applies armed modes: local targets through a hook command (which is
/// expected to rewrite the camera config and restart the monitoring process),
/// remote ones over MQTT.
pub struct Arming {
    hook: Option<ArmingConfig>,
    mqtt: Option<MqttClient>,
}

impl Arming {
    pub fn new(hook: Option<ArmingConfig>, mqtt: Option<MqttClient>) -> Self {
        Arming { hook, mqtt }
    }
}

#[async_trait]
impl ArmingBackend for Arming {
    async fn set_armed(&self, target_id: &str, armed: bool) -> anyhow::Result<()> {
        let hook = self
            .hook
            .as_ref()
            .ok_or_else(|| anyhow!("no arming command configured"))?;
        let mode = ArmMode::from_armed(armed);

        info!("Setting local target {} to {}", target_id, mode);
        let status = Command::new(&hook.command)
            .args(hook.args.iter().flatten())
            .arg(target_id)
            .arg(mode.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("running {}", hook.command))?;

        if !status.success() {
            bail!("{} exited with {}", hook.command, status);
        }
        debug!("Local target {} is now {}", target_id, mode);
        Ok(())
    }

    async fn set_armed_remote(&self, target_ref: &str, mode: ArmMode) -> anyhow::Result<()> {
        let mqtt = self
            .mqtt
            .as_ref()
            .ok_or_else(|| anyhow!("remote targets need an [mqtt] section"))?;
        mqtt.publish_armed(target_ref, mode)?;
        Ok(())
    }
}
