//! Pipeline process launching

use crate::camera::CameraConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

/// A running streaming pipeline
#[async_trait]
pub trait PipelineProcess: Send {
    /// Resolves when the process exits on its own, describing how
    async fn wait(&mut self) -> Result<String>;
    async fn kill(&mut self) -> Result<()>;
}

#[async_trait]
pub trait PipelineLauncher: Send + Sync {
    async fn launch(&self, camera: &CameraConfig) -> Result<Box<dyn PipelineProcess>>;
}

/// Spawns the configured command line as a child process
pub struct ProcessLauncher {
    template: Vec<String>,
    destination: Option<String>,
}

impl ProcessLauncher {
    pub fn new(template: Vec<String>, destination: Option<String>) -> Self {
        Self {
            template,
            destination,
        }
    }

    fn render(&self, camera: &CameraConfig) -> Result<Vec<String>> {
        let device = camera.device.to_string_lossy();
        self.template
            .iter()
            .map(|arg| {
                let mut arg = arg
                    .replace("{device}", &device)
                    .replace("{camera}", &camera.name);
                if arg.contains("{destination}") {
                    let destination = self
                        .destination
                        .as_deref()
                        .ok_or_else(|| anyhow!("stream destination not configured"))?;
                    arg = arg.replace("{destination}", destination);
                }
                Ok(arg)
            })
            .collect()
    }
}

#[async_trait]
impl PipelineLauncher for ProcessLauncher {
    async fn launch(&self, camera: &CameraConfig) -> Result<Box<dyn PipelineProcess>> {
        let argv = self.render(camera)?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty pipeline command"))?;

        debug!(camera = %camera.name, %program, "spawning pipeline");
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("pipeline failed to spawn: {program}"))?;

        Ok(Box::new(ChildProcess(child)))
    }
}

struct ChildProcess(Child);

#[async_trait]
impl PipelineProcess for ChildProcess {
    async fn wait(&mut self) -> Result<String> {
        let status = self.0.wait().await?;
        Ok(format!("pipeline exited: {status}"))
    }

    async fn kill(&mut self) -> Result<()> {
        self.0.kill().await?;
        Ok(())
    }
}
