//! Discovery of the locally attached scanner.
//!
//! Device listings are scraped from the scan tool's console output, which has
//! no stable format across driver backends. The [`DeviceResolver`] trait keeps
//! that fragility behind one seam so another discovery strategy can be
//! dropped in without touching the profile synchronizer.

use crate::error::DeviceError;
use crate::scanner::tool::ScanTool;
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Driver backends understood by the scan tool's `--driver` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Wia,
    Twain,
    Sane,
    Escl,
    Apple,
}

impl Driver {
    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Wia => "wia",
            Driver::Twain => "twain",
            Driver::Sane => "sane",
            Driver::Escl => "escl",
            Driver::Apple => "apple",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wia" => Ok(Driver::Wia),
            "twain" => Ok(Driver::Twain),
            "sane" => Ok(Driver::Sane),
            "escl" => Ok(Driver::Escl),
            "apple" => Ok(Driver::Apple),
            other => Err(format!("unknown driver: {}", other)),
        }
    }
}

/// A scanner found during discovery. Lives for one synchronization only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub driver: Driver,
}

pub trait DeviceResolver: Send + Sync {
    fn resolve(&self) -> Result<Device, DeviceError>;

    /// Short label used in "tried: ..." diagnostics.
    fn describe(&self) -> String;
}

/// Asks the scan tool for the devices visible through a single driver.
pub struct Naps2DeviceLister {
    tool: ScanTool,
    driver: Driver,
    timeout: Duration,
}

impl Naps2DeviceLister {
    pub fn new(tool: ScanTool, driver: Driver, timeout: Duration) -> Self {
        Self {
            tool,
            driver,
            timeout,
        }
    }
}

impl DeviceResolver for Naps2DeviceLister {
    fn resolve(&self) -> Result<Device, DeviceError> {
        let output = self.tool.list_devices(self.driver.as_str(), self.timeout)?;
        if !output.status.success() {
            debug!(
                "Device listing via {} exited with {}: {}",
                self.driver,
                output.status,
                output.combined.trim()
            );
            return Err(DeviceError::NotFound {
                tried: self.describe(),
            });
        }

        // The first non-blank line doubles as identifier and display name;
        // the listing format differs per driver and tool version.
        let line = first_device_line(&output.combined).ok_or_else(|| DeviceError::NotFound {
            tried: self.describe(),
        })?;

        Ok(Device {
            id: line.to_string(),
            name: line.to_string(),
            driver: self.driver,
        })
    }

    fn describe(&self) -> String {
        self.driver.to_string()
    }
}

/// Tries each resolver in priority order and stops at the first hit.
pub struct FirstAvailable {
    resolvers: Vec<Box<dyn DeviceResolver>>,
}

impl FirstAvailable {
    pub fn new(resolvers: Vec<Box<dyn DeviceResolver>>) -> Self {
        Self { resolvers }
    }

    /// One lister per configured driver, in the configured order.
    pub fn naps2(tool: &ScanTool, drivers: &[Driver], timeout: Duration) -> Self {
        Self::new(
            drivers
                .iter()
                .map(|&driver| {
                    Box::new(Naps2DeviceLister::new(tool.clone(), driver, timeout))
                        as Box<dyn DeviceResolver>
                })
                .collect(),
        )
    }
}

impl DeviceResolver for FirstAvailable {
    fn resolve(&self) -> Result<Device, DeviceError> {
        for resolver in &self.resolvers {
            match resolver.resolve() {
                Ok(device) => {
                    info!(
                        "Found scanner {:?} via {} driver",
                        device.name, device.driver
                    );
                    return Ok(device);
                }
                Err(e) => debug!("No device via {}: {}", resolver.describe(), e),
            }
        }
        Err(DeviceError::NotFound {
            tried: self.describe(),
        })
    }

    fn describe(&self) -> String {
        self.resolvers
            .iter()
            .map(|r| r.describe())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn first_device_line(listing: &str) -> Option<&str> {
    listing.lines().map(str::trim).find(|line| !line.is_empty())
}
