//! Board configuration loaded from TOML.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use spifpga_core::LogLevel;
use spifpga_drivers::board;
use spifpga_kernel::driver_api::{PlatformDevice, Resource};

/// Board file as written on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardFile {
    #[serde(default)]
    log: LogSection,
    bridge: Option<BridgeSection>,
    #[serde(default, rename = "device")]
    devices: Vec<DeviceSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: Option<String>,
}

/// Physical window of the FPGA-to-HPS bridge.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BridgeSection {
    base: u64,
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceSection {
    name: String,
    compatible: Option<String>,
    id: Option<u32>,
    #[serde(default)]
    resources: Vec<ResourceSection>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ResourceSection {
    Mem {
        start: u64,
        end: u64,
        name: Option<String>,
    },
    Irq {
        start: u32,
    },
}

impl ResourceSection {
    fn to_resource(&self) -> Resource {
        match self {
            Self::Mem { start, end, name } => {
                let res = Resource::mem(*start, *end);
                match name {
                    Some(name) => res.named(name),
                    None => res,
                }
            }
            Self::Irq { start } => Resource::irq(*start),
        }
    }
}

impl DeviceSection {
    fn to_device(&self) -> PlatformDevice {
        let mut dev = PlatformDevice::new(&self.name);
        if let Some(id) = self.id {
            dev = dev.with_id(id);
        }
        if let Some(compatible) = &self.compatible {
            dev = dev.with_compatible(compatible);
        }
        self.resources
            .iter()
            .fold(dev, |dev, res| dev.with_resource(res.to_resource()))
    }
}

/// A resolved board: what the bus should be built from.
#[derive(Debug)]
pub struct Board {
    /// Log level from the file, if set.
    pub log_level: Option<LogLevel>,
    /// Bridge aperture as `(base, size)`, if restricted.
    pub aperture: Option<(u64, u64)>,
    /// Devices in registration order.
    pub devices: Vec<PlatformDevice>,
}

impl Board {
    /// The built-in board: `fpga_spi` and `platform_spi`, no aperture.
    pub fn built_in() -> Self {
        Self {
            log_level: None,
            aperture: None,
            devices: board::devices(),
        }
    }

    /// Loads `path`, or the built-in board when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::built_in());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parses a board description.
    pub fn parse(content: &str) -> Result<Self> {
        let file: BoardFile = toml::from_str(content)?;

        let log_level = file.log.level.as_deref().map(parse_level).transpose()?;
        let aperture = file.bridge.map(|bridge| (bridge.base, bridge.size));
        if file.devices.is_empty() {
            bail!("board defines no devices");
        }
        let devices = file.devices.iter().map(DeviceSection::to_device).collect();

        Ok(Self {
            log_level,
            aperture,
            devices,
        })
    }
}

/// Parses a log level name (`error`, `warn`, `info`, `debug`, `trace`).
pub fn parse_level(name: &str) -> Result<LogLevel> {
    LogLevel::from_name(name).with_context(|| format!("unknown log level `{name}`"))
}

#[cfg(test)]
mod tests {
    use spifpga_kernel::driver_api::ResourceFlags;

    use super::*;

    const SOC_BOARD: &str = r#"
[log]
level = "debug"

[bridge]
base = 0xC0000000
size = 0x20000000

[[device]]
name = "fpga_spi"
compatible = "altr,fpga_spi"
resources = [
    { kind = "mem", start = 0xC0000000, end = 0xC000003F, name = "spi" },
    { kind = "irq", start = 0 },
]

[[device]]
name = "custom_spi"
id = 1
resources = [{ kind = "mem", start = 0xC0001000, end = 0xC0001FFF }]
"#;

    #[test]
    fn parses_soc_board() {
        let board = Board::parse(SOC_BOARD).unwrap();
        assert_eq!(board.log_level, Some(LogLevel::Debug));
        assert_eq!(board.aperture, Some((0xC000_0000, 0x2000_0000)));
        assert_eq!(board.devices.len(), 2);

        let spi = &board.devices[0];
        assert_eq!(spi.dev_name(), "fpga_spi");
        assert_eq!(spi.compatible(), Some("altr,fpga_spi"));
        let mem = spi.resource(ResourceFlags::MEM, 0).unwrap();
        assert_eq!((mem.start(), mem.end(), mem.name()), (0xC000_0000, 0xC000_003F, Some("spi")));
        assert_eq!(spi.irq(0).map(|irq| irq.line()), Some(0));

        assert_eq!(board.devices[1].dev_name(), "custom_spi.1");
    }

    #[test]
    fn unknown_resource_kind_is_an_error() {
        let text = r#"
[[device]]
name = "x"
resources = [{ kind = "dma", start = 1 }]
"#;
        assert!(Board::parse(text).is_err());
    }

    #[test]
    fn unknown_log_level_is_an_error() {
        let text = r#"
[log]
level = "loud"

[[device]]
name = "x"
"#;
        let err = Board::parse(text).unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn empty_board_is_an_error() {
        assert!(Board::parse("").is_err());
    }

    #[test]
    fn missing_path_uses_built_in_board() {
        let board = Board::load(None).unwrap();
        let names: Vec<_> = board.devices.iter().map(PlatformDevice::dev_name).collect();
        assert_eq!(names, ["fpga_spi", "platform_spi"]);
        assert!(board.aperture.is_none());
    }

    #[test]
    fn unreadable_path_reports_file() {
        let err = Board::load(Some(Path::new("/nonexistent/board.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/board.toml"));
    }
}
