//! Pipeline supervisor
//!
//! A single task owns the running pipeline. Operator requests arrive over a
//! channel and unexpected exits are observed in the same select loop, so
//! there is never more than one pipeline and no lock around it.

use super::guard::{CrashLoopGuard, RestartDecision};
use super::launcher::{PipelineLauncher, PipelineProcess};
use super::DeviceStatus;
use crate::camera::CameraConfig;
use anyhow::{anyhow, Result};
use racecast_shared::StreamingStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

enum Control {
    Start(CameraConfig, oneshot::Sender<Result<()>>),
    Switch(CameraConfig, oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<()>>),
    Fault(String),
}

/// Handle to the supervisor task
#[derive(Clone)]
pub struct PipelineSupervisor {
    control: mpsc::Sender<Control>,
    status: watch::Receiver<DeviceStatus>,
}

impl PipelineSupervisor {
    pub fn spawn(
        launcher: Arc<dyn PipelineLauncher>,
        guard: CrashLoopGuard,
        restart_delay: Duration,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(DeviceStatus::default());

        let task = SupervisorTask {
            launcher,
            guard,
            restart_delay,
            status: status_tx,
            running: None,
        };
        tokio::spawn(task.run(control_rx));

        Self {
            control: control_tx,
            status: status_rx,
        }
    }

    /// Stream from `camera`, replacing whatever is running. Resets the
    /// crash-loop guard.
    pub async fn start(&self, camera: CameraConfig) -> Result<()> {
        self.request(|reply| Control::Start(camera, reply)).await
    }

    /// Move a live stream to another camera
    pub async fn switch_camera(&self, camera: CameraConfig) -> Result<()> {
        self.request(|reply| Control::Switch(camera, reply)).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Control::Stop).await
    }

    /// Stop streaming and report `message` as the streaming error
    pub async fn report_error(&self, message: impl Into<String>) -> Result<()> {
        self.control
            .send(Control::Fault(message.into()))
            .await
            .map_err(|_| anyhow!("pipeline supervisor stopped"))
    }

    pub fn status(&self) -> DeviceStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceStatus> {
        self.status.clone()
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> Control,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(make(reply_tx))
            .await
            .map_err(|_| anyhow!("pipeline supervisor stopped"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("pipeline supervisor dropped the request"))?
    }
}

struct Running {
    camera: CameraConfig,
    process: Box<dyn PipelineProcess>,
}

enum Event {
    Control(Control),
    Exited(String),
}

struct SupervisorTask {
    launcher: Arc<dyn PipelineLauncher>,
    guard: CrashLoopGuard,
    restart_delay: Duration,
    status: watch::Sender<DeviceStatus>,
    running: Option<Running>,
}

impl SupervisorTask {
    async fn run(mut self, mut control_rx: mpsc::Receiver<Control>) {
        loop {
            let event = tokio::select! {
                msg = control_rx.recv() => match msg {
                    Some(msg) => Event::Control(msg),
                    None => break,
                },
                reason = wait_exit(self.running.as_mut()) => Event::Exited(reason),
            };

            match event {
                Event::Control(Control::Start(camera, reply)) => {
                    let _ = reply.send(self.start(camera).await);
                }
                Event::Control(Control::Switch(camera, reply)) => {
                    let _ = reply.send(self.switch(camera).await);
                }
                Event::Control(Control::Stop(reply)) => {
                    self.stop().await;
                    let _ = reply.send(Ok(()));
                }
                Event::Control(Control::Fault(message)) => {
                    self.kill_running().await;
                    self.publish(StreamingStatus::Error, None, Some(message));
                }
                Event::Exited(reason) => self.restart_after_exit(reason).await,
            }
        }

        self.kill_running().await;
    }

    async fn start(&mut self, camera: CameraConfig) -> Result<()> {
        if self.is_streaming(&camera) {
            return Ok(());
        }

        self.guard.reset();
        self.kill_running().await;
        self.publish(StreamingStatus::Starting, None, None);
        self.launch(camera).await
    }

    async fn switch(&mut self, camera: CameraConfig) -> Result<()> {
        if self.running.is_none() {
            return Err(anyhow!("not streaming, cannot switch to {}", camera.name));
        }
        if self.is_streaming(&camera) {
            return Ok(());
        }

        // The capture device must be released before the new one opens
        self.kill_running().await;
        self.launch(camera).await
    }

    async fn stop(&mut self) {
        if self.running.is_some() {
            self.publish(StreamingStatus::Stopping, None, None);
            self.kill_running().await;
        }
        self.publish(StreamingStatus::Idle, None, None);
    }

    async fn restart_after_exit(&mut self, reason: String) {
        let Some(Running { camera, .. }) = self.running.take() else {
            return;
        };
        warn!(camera = %camera.name, %reason, "pipeline exited unexpectedly");

        loop {
            if self.guard.record_failure(Instant::now()) == RestartDecision::LimitHit {
                let message = self.guard.limit_message();
                error!(camera = %camera.name, "{}", message);
                self.publish(StreamingStatus::Error, None, Some(message));
                return;
            }

            self.publish(StreamingStatus::Starting, None, None);
            tokio::time::sleep(self.restart_delay).await;

            match self.launch(camera.clone()).await {
                Ok(()) => return,
                Err(e) => warn!(camera = %camera.name, "relaunch failed: {}", e),
            }
        }
    }

    /// Spawn the pipeline and report it live, or report the launch error
    async fn launch(&mut self, camera: CameraConfig) -> Result<()> {
        match self.launcher.launch(&camera).await {
            Ok(process) => {
                info!(camera = %camera.name, device = %camera.device.display(), "pipeline running");
                self.publish(StreamingStatus::Live, Some(camera.name.clone()), None);
                self.running = Some(Running { camera, process });
                Ok(())
            }
            Err(e) => {
                self.publish(StreamingStatus::Error, None, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn kill_running(&mut self) {
        if let Some(mut running) = self.running.take() {
            if let Err(e) = running.process.kill().await {
                warn!(camera = %running.camera.name, "failed to kill pipeline: {}", e);
            }
        }
    }

    fn is_streaming(&self, camera: &CameraConfig) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| r.camera.name == camera.name)
    }

    fn publish(&self, status: StreamingStatus, camera: Option<String>, error: Option<String>) {
        self.status.send_if_modified(|current| {
            let next = DeviceStatus {
                status,
                camera,
                error,
            };
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Resolves when the running pipeline exits; never resolves when idle
async fn wait_exit(running: Option<&mut Running>) -> String {
    match running {
        Some(running) => match running.process.wait().await {
            Ok(reason) => reason,
            Err(e) => e.to_string(),
        },
        None => std::future::pending().await,
    }
}
