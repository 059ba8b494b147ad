//! Camera inventory

use racecast_shared::{CameraInfo, CameraStatus};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub name: String,
    pub device: PathBuf,
}

impl CameraConfig {
    pub fn new(name: impl Into<String>, device: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
        }
    }

    /// Whether the capture device is currently present
    pub fn is_present(&self) -> bool {
        self.device.exists()
    }
}

pub fn find<'a>(cameras: &'a [CameraConfig], name: &str) -> Option<&'a CameraConfig> {
    cameras.iter().find(|c| c.name == name)
}

/// Report every configured camera. The one being streamed is `Active` even if
/// its node briefly disappears.
pub fn inventory(cameras: &[CameraConfig], active: Option<&str>) -> Vec<CameraInfo> {
    cameras
        .iter()
        .map(|camera| {
            let status = if active == Some(camera.name.as_str()) {
                CameraStatus::Active
            } else if camera.is_present() {
                CameraStatus::Available
            } else {
                CameraStatus::Unavailable
            };
            CameraInfo::new(camera.name.clone(), status)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_statuses() {
        let dir = std::env::temp_dir();
        let cameras = vec![
            CameraConfig::new("main", &dir),
            CameraConfig::new("cockpit", &dir),
            CameraConfig::new("rear", "/nonexistent/video9"),
        ];

        let list = inventory(&cameras, Some("cockpit"));
        let status = |name: &str| {
            list.iter()
                .find(|c| c.name == name)
                .map(|c| c.status())
                .unwrap()
        };
        assert_eq!(status("main"), CameraStatus::Available);
        assert_eq!(status("cockpit"), CameraStatus::Active);
        assert_eq!(status("rear"), CameraStatus::Unavailable);
        assert!(find(&cameras, "rear").is_some());
        assert!(find(&cameras, "roof").is_none());
    }
}
