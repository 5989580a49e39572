use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info};

use crate::config::TargetConfig;
use crate::error::DispatchError;
use crate::messages::ArmMode;
use crate::presence::Transition;

/// Something whose detection mode follows presence: a camera handled on this
/// host, or one managed by another instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagedTarget {
    Local(String),
    Remote(String),
}

impl ManagedTarget {
    pub fn name(&self) -> &str {
        match self {
            ManagedTarget::Local(id) => id,
            ManagedTarget::Remote(reference) => reference,
        }
    }
}

impl From<&TargetConfig> for ManagedTarget {
    fn from(config: &TargetConfig) -> Self {
        match config {
            TargetConfig::Local { id } => ManagedTarget::Local(id.clone()),
            TargetConfig::Remote { reference } => ManagedTarget::Remote(reference.clone()),
        }
    }
}

#[async_trait]
pub trait ArmingBackend: Send + Sync {
    /// Sets and applies the armed mode of a locally managed target.
    async fn set_armed(&self, target_id: &str, armed: bool) -> anyhow::Result<()>;

    async fn set_armed_remote(&self, target_ref: &str, mode: ArmMode) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}

pub fn format_message(prefix: &str, transition: &Transition) -> String {
    if transition.devices.is_empty() {
        format!("{}: No devices found", prefix)
    } else {
        format!(
            "{}: Found device(s): {}",
            prefix,
            transition.devices.labels().join(", ")
        )
    }
}

pub struct ActionDispatcher {
    targets: Vec<ManagedTarget>,
    arming: Arc<dyn ArmingBackend>,
    notifier: Arc<dyn Notifier>,
    prefix: String,
    call_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(
        targets: Vec<ManagedTarget>,
        arming: Arc<dyn ArmingBackend>,
        notifier: Arc<dyn Notifier>,
        prefix: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        ActionDispatcher {
            targets,
            arming,
            notifier,
            prefix: prefix.into(),
            call_timeout,
        }
    }

    /// Arms or disarms every target and sends the notification. Each of these
    /// is independent: a failure is logged and returned, never rolled back.
    /// Every collaborator call is cut off after `call_timeout`.
    pub async fn dispatch(&self, transition: &Transition) -> Vec<DispatchError> {
        let armed = transition.armed();
        info!(
            "Presence changed from {} to {}, {} {} target(s)",
            transition.from,
            transition.to,
            if armed { "arming" } else { "disarming" },
            self.targets.len()
        );

        let arming = join_all(self.targets.iter().map(|target| self.apply(target, armed)));
        let message = format_message(&self.prefix, transition);
        let notification = async {
            bounded(self.call_timeout, self.notifier.notify(&message))
                .await
                .map_err(DispatchError::Notification)
        };
        let (arming_results, notification_result) = futures::join!(arming, notification);

        let failures: Vec<DispatchError> = arming_results
            .into_iter()
            .chain(std::iter::once(notification_result))
            .filter_map(Result::err)
            .collect();

        for failure in &failures {
            error!("{}", failure);
        }

        failures
    }

    async fn apply(&self, target: &ManagedTarget, armed: bool) -> Result<(), DispatchError> {
        let call = match target {
            ManagedTarget::Local(id) => self.arming.set_armed(id, armed),
            ManagedTarget::Remote(reference) => self
                .arming
                .set_armed_remote(reference, ArmMode::from_armed(armed)),
        };
        let result = bounded(self.call_timeout, call).await;
        result.map_err(|source| DispatchError::Arming {
            target: target.name().to_string(),
            source,
        })
    }
}

async fn bounded<F>(limit: Duration, call: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(anyhow!("no response within {:?}", limit)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::devices::{DeviceRegistry, KnownDevice, PresentDeviceSet};
    use crate::messages::PresenceState;

    const CALL_TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct RecordingArming {
        calls: Mutex<Vec<(String, String)>>,
        failing_target: Option<String>,
        hanging_target: Option<String>,
    }

    #[async_trait]
    impl ArmingBackend for RecordingArming {
        async fn set_armed(&self, target_id: &str, armed: bool) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((target_id.to_string(), armed.to_string()));
            if self.hanging_target.as_deref() == Some(target_id) {
                std::future::pending::<()>().await;
            }
            if self.failing_target.as_deref() == Some(target_id) {
                anyhow::bail!("motion restart failed");
            }
            Ok(())
        }

        async fn set_armed_remote(&self, target_ref: &str, mode: ArmMode) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((target_ref.to_string(), mode.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
        fail: bool,
        hang: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> anyhow::Result<()> {
            self.messages.lock().unwrap().push(message.to_string());
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                anyhow::bail!("webhook returned 500");
            }
            Ok(())
        }
    }

    fn arrived() -> Transition {
        let devices = DeviceRegistry::new(vec![
            KnownDevice::new("aa:aa:aa:aa:aa:aa", "Phone"),
            KnownDevice::new("bb:bb:bb:bb:bb:bb", "Tablet"),
        ])
        .unwrap()
        .match_output("aa:aa:aa:aa:aa:aa bb:bb:bb:bb:bb:bb");
        Transition {
            from: PresenceState::Unknown,
            to: PresenceState::Present,
            devices,
        }
    }

    fn departed() -> Transition {
        Transition {
            from: PresenceState::Present,
            to: PresenceState::Absent,
            devices: PresentDeviceSet::default(),
        }
    }

    fn targets() -> Vec<ManagedTarget> {
        vec![
            ManagedTarget::Local("1".to_string()),
            ManagedTarget::Local("2".to_string()),
            ManagedTarget::Remote("http://garage:8765/config/1".to_string()),
        ]
    }

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message("meye", &arrived()),
            "meye: Found device(s): Phone, Tablet"
        );
        assert_eq!(format_message("meye", &departed()), "meye: No devices found");
    }

    #[tokio::test]
    async fn test_arrival_disarms_all_targets() {
        let arming = Arc::new(RecordingArming::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = ActionDispatcher::new(
            targets(),
            arming.clone(),
            notifier.clone(),
            "meye",
            CALL_TIMEOUT,
        );

        let failures = dispatcher.dispatch(&arrived()).await;
        assert!(failures.is_empty());

        let calls = arming.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("1".to_string(), "false".to_string()),
                ("2".to_string(), "false".to_string()),
                ("http://garage:8765/config/1".to_string(), "off".to_string()),
            ]
        );
        assert_eq!(
            *notifier.messages.lock().unwrap(),
            vec!["meye: Found device(s): Phone, Tablet".to_string()]
        );
    }

    #[tokio::test]
    async fn test_departure_arms_all_targets() {
        let arming = Arc::new(RecordingArming::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = ActionDispatcher::new(
            targets(),
            arming.clone(),
            notifier.clone(),
            "meye",
            CALL_TIMEOUT,
        );

        dispatcher.dispatch(&departed()).await;

        let calls = arming.calls.lock().unwrap().clone();
        assert!(calls[..2].iter().all(|(_, armed)| armed == "true"));
        assert_eq!(calls[2].1, "on");
        assert_eq!(
            *notifier.messages.lock().unwrap(),
            vec!["meye: No devices found".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failures_are_independent() {
        let arming = Arc::new(RecordingArming {
            failing_target: Some("1".to_string()),
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let dispatcher = ActionDispatcher::new(
            targets(),
            arming.clone(),
            notifier.clone(),
            "meye",
            CALL_TIMEOUT,
        );

        let failures = dispatcher.dispatch(&departed()).await;

        // Every target was still attempted and the notification still sent.
        assert_eq!(arming.calls.lock().unwrap().len(), 3);
        assert_eq!(notifier.messages.lock().unwrap().len(), 1);
        assert_eq!(failures.len(), 2);
        assert!(matches!(&failures[0], DispatchError::Arming { target, .. } if target == "1"));
        assert!(matches!(failures[1], DispatchError::Notification(_)));
    }

    #[tokio::test]
    async fn test_hung_collaborators_are_cut_off() {
        let arming = Arc::new(RecordingArming {
            hanging_target: Some("2".to_string()),
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier {
            hang: true,
            ..Default::default()
        });
        let dispatcher = ActionDispatcher::new(
            targets(),
            arming.clone(),
            notifier.clone(),
            "meye",
            Duration::from_millis(100),
        );

        let failures = tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(&arrived()))
            .await
            .expect("dispatch should not wait on a hung collaborator");

        assert_eq!(arming.calls.lock().unwrap().len(), 3);
        assert_eq!(failures.len(), 2);
        assert!(matches!(&failures[0], DispatchError::Arming { target, .. } if target == "2"));
        assert!(matches!(failures[1], DispatchError::Notification(_)));
    }
}
