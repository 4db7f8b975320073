use std::sync::Arc;

use anyhow::Result;
use comms_integration::{CallEvent, CallHandle, VoiceDevice};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::SessionEvent;

#[derive(Default)]
struct CallState {
    active: bool,
    call: Option<Arc<dyn CallHandle>>,
    event_task: Option<JoinHandle<()>>,
}

/// Two-state toggle over the optional voice capability. Connect is
/// confirmed by the capability's `Accepted` signal; disconnect from the
/// local side transitions immediately without waiting for confirmation.
pub struct CallController {
    device: Option<Arc<dyn VoiceDevice>>,
    state: Mutex<CallState>,
    events: broadcast::Sender<SessionEvent>,
}

impl CallController {
    pub fn new(
        device: Option<Arc<dyn VoiceDevice>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            device,
            state: Mutex::new(CallState::default()),
            events,
        })
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    pub async fn toggle(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.call.is_some() {
            info!("ending voice call");
            if let Some(call) = state.call.take() {
                if let Err(err) = call.disconnect().await {
                    warn!("call disconnect failed: {err}");
                }
            }
            if let Some(task) = state.event_task.take() {
                task.abort();
            }
            state.active = false;
            let _ = self
                .events
                .send(SessionEvent::CallStateChanged { active: false });
            return Ok(());
        }

        let Some(device) = self.device.clone() else {
            warn!("voice device not initialized; ignoring call request");
            return Ok(());
        };

        info!("starting voice call");
        let call = match device.connect().await {
            Ok(call) => call,
            Err(err) => {
                warn!("voice connect failed: {err}");
                return Ok(());
            }
        };

        // stays inactive until the capability confirms with Accepted
        state.event_task = Some(self.spawn_call_event_task(Arc::clone(&call)));
        state.call = Some(call);
        Ok(())
    }

    fn spawn_call_event_task(self: &Arc<Self>, call: Arc<dyn CallHandle>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut events = call.subscribe_events();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    CallEvent::Accepted => {
                        info!("call accepted");
                        controller.state.lock().await.active = true;
                        let _ = controller
                            .events
                            .send(SessionEvent::CallStateChanged { active: true });
                    }
                    CallEvent::Disconnected => {
                        info!("call ended");
                        {
                            let mut state = controller.state.lock().await;
                            state.active = false;
                            state.call = None;
                            state.event_task = None;
                        }
                        let _ = controller
                            .events
                            .send(SessionEvent::CallStateChanged { active: false });
                        break;
                    }
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(call) = state.call.take() {
            let _ = call.disconnect().await;
        }
        if let Some(task) = state.event_task.take() {
            task.abort();
        }
        state.active = false;
    }
}
