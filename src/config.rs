// Config Module - Configuration file handling and command-line argument parsing
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::staleness::DEFAULT_STALE_AFTER;
use crate::types::{Category, CategoryTable, Rgb};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Visualize live network packets as pulses on an LED strip",
    long_about = "Captures packets on a network interface, classifies each one (TCP, UDP, ARP, DNS, ...)\n\
                  and sends a colored pulse along a WLED strip via DDP. Locally originated packets travel\n\
                  away from the first LED, everything else travels towards it."
)]
pub struct Args {
    /// Network interface to capture on
    #[arg(short = 'i', long)]
    pub device: Option<String>,

    /// Pixels the pulse advances per frame
    #[arg(short, long)]
    pub speed: Option<usize>,

    /// Log every packet's category and delay
    #[arg(short, long)]
    pub debug: bool,

    /// Disable ARP pulses
    #[arg(long)]
    pub narp: bool,

    /// Disable TCP pulses
    #[arg(long)]
    pub ntcp: bool,

    /// Disable UDP pulses
    #[arg(long)]
    pub nudp: bool,

    /// Turn every LED off and exit
    #[arg(long)]
    pub reset: bool,

    /// Show the interface's IPv4 address in binary and exit
    #[arg(long)]
    pub ipaddr: bool,

    /// WLED device address
    #[arg(short, long)]
    pub wled_ip: Option<String>,

    /// Total number of LEDs
    #[arg(short = 'L', long)]
    pub leds: Option<usize>,

    /// Length of the fading trail behind each pulse
    #[arg(long)]
    pub trail: Option<usize>,

    /// Maximum frames per second sent to the strip
    #[arg(long)]
    pub fps: Option<f64>,

    /// Global brightness multiplier (0.0 to 1.0)
    #[arg(long)]
    pub brightness: Option<f64>,

    /// Draw the strip in the terminal instead of sending it to WLED
    #[arg(long)]
    pub preview: bool,

    /// Config file path or name (e.g., --cfg /full/path or --cfg desk for ~/.config/illumi-packet/desk.conf)
    #[arg(long)]
    pub cfg: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOverride {
    pub color: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllumiConfig {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,  // Where the config was loaded from (not serialized)

    pub interface: String,
    pub speed: usize,
    pub debug: bool,
    pub sink: String,  // "ddp" or "terminal"
    pub wled_ip: String,
    pub total_leds: usize,
    pub trail_length: usize,
    pub fps: f64,
    pub global_brightness: f64,
    pub snapshot_len: i32,
    pub promiscuous: bool,
    pub read_timeout_ms: i32,
    pub stale_after_ms: u64,  // Packets older than this are skipped
    pub categories: BTreeMap<String, CategoryOverride>,
}

impl Default for IllumiConfig {
    fn default() -> Self {
        IllumiConfig {
            config_path: None,
            interface: "eth0".to_string(),
            speed: 1,
            debug: false,
            sink: "ddp".to_string(),
            wled_ip: "led.local".to_string(),
            total_leds: 144,
            trail_length: 6,
            fps: 200.0,
            global_brightness: 250.0 / 255.0,
            snapshot_len: 1024,
            promiscuous: false,
            read_timeout_ms: 50,
            stale_after_ms: DEFAULT_STALE_AFTER.as_millis() as u64,
            categories: BTreeMap::new(),
        }
    }
}

impl IllumiConfig {
    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        // Track if any args were actually provided
        let mut args_provided = false;

        if let Some(ref device) = args.device {
            self.interface = device.clone();
            args_provided = true;
        }

        if let Some(speed) = args.speed {
            self.speed = speed;
            args_provided = true;
        }

        if args.debug {
            self.debug = true;
            args_provided = true;
        }

        if let Some(ref wled_ip) = args.wled_ip {
            self.wled_ip = wled_ip.clone();
            args_provided = true;
        }

        if let Some(leds) = args.leds {
            self.total_leds = leds;
            args_provided = true;
        }

        if let Some(trail) = args.trail {
            self.trail_length = trail;
            args_provided = true;
        }

        if let Some(fps) = args.fps {
            self.fps = fps;
            args_provided = true;
        }

        if let Some(brightness) = args.brightness {
            self.global_brightness = brightness;
            args_provided = true;
        }

        if args.preview {
            self.sink = "terminal".to_string();
            args_provided = true;
        }

        for (flag, category) in [(args.narp, Category::Arp), (args.ntcp, Category::Tcp), (args.nudp, Category::Udp)] {
            if flag {
                self.categories
                    .entry(category_key(category.name()))
                    .or_default()
                    .enabled = Some(false);
                args_provided = true;
            }
        }

        self.sanitize();
        args_provided
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        if let Some(cfg) = cfg_arg {
            // Check if it's an absolute path
            let path = PathBuf::from(cfg);
            if path.is_absolute() {
                return Ok(path);
            }

            // Check if it contains path separators (relative path)
            if cfg.contains('/') || cfg.contains('\\') {
                return Ok(path);
            }

            // Otherwise treat as config name in config directory
            let filename = if cfg.ends_with(".conf") {
                cfg.to_string()
            } else {
                format!("{}.conf", cfg)
            };
            Ok(Self::config_dir()?.join(filename))
        } else {
            Ok(Self::config_dir()?.join("config.conf"))
        }
    }

    fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config").join("illumi-packet"))
    }

    /// Loads the config file if there is one. A missing default file means defaults;
    /// a missing file named with `--cfg` is an error.
    pub fn load_with_path(cfg_arg: Option<&str>) -> Result<Self> {
        let path = Self::config_path(cfg_arg)?;
        if !path.exists() {
            if cfg_arg.is_some() {
                bail!("Config file {} does not exist", path.display());
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut parsed = Self::parse(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        parsed.config_path = Some(path);
        Ok(parsed)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut parsed: Self = toml::from_str(contents)?;
        parsed.sanitize();
        Ok(parsed)
    }

    /// Sanitize config values to handle common formatting issues
    pub fn sanitize(&mut self) {
        self.interface = self.interface.trim().to_string();
        self.wled_ip = self.wled_ip.trim().to_string();
        self.sink = self.sink.trim().to_lowercase();

        // Clamp numeric values to reasonable ranges
        self.total_leds = self.total_leds.clamp(1, 100000);
        self.trail_length = self.trail_length.clamp(1, self.total_leds);
        self.speed = self.speed.clamp(1, self.total_leds);
        self.fps = self.fps.clamp(0.0, 2000.0);
        self.global_brightness = self.global_brightness.clamp(0.0, 1.0);
        self.snapshot_len = self.snapshot_len.clamp(64, 65535);
        self.read_timeout_ms = self.read_timeout_ms.clamp(1, 10000);
        self.stale_after_ms = self.stale_after_ms.min(3_600_000);

        // Category names are case-insensitive; fold spellings of one name into a single entry
        let categories = std::mem::take(&mut self.categories);
        for (name, entry) in categories {
            let slot = self.categories.entry(category_key(&name)).or_default();
            if entry.color.is_some() {
                slot.color = entry.color;
            }
            if entry.enabled.is_some() {
                slot.enabled = entry.enabled;
            }
        }
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            interface: self.interface.clone(),
            snapshot_len: self.snapshot_len,
            promiscuous: self.promiscuous,
            read_timeout_ms: self.read_timeout_ms,
        }
    }

    /// Builds the read-only category table from defaults plus `[categories]` overrides.
    pub fn category_table(&self) -> Result<CategoryTable> {
        let mut table = CategoryTable::default();
        for (name, entry) in &self.categories {
            let Some(category) = Category::from_name(name) else {
                bail!("Unknown category '{}' in config", name);
            };
            if let Some(ref color) = entry.color {
                let rgb = Rgb::from_hex(color)
                    .with_context(|| format!("Invalid color for category {}", category))?;
                table.set_color(category, rgb.packed());
            }
            if let Some(enabled) = entry.enabled {
                table.set_enabled(category, enabled);
            }
        }
        Ok(table)
    }
}

fn category_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryMeta, ORANGE};

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["illumi-packet"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = IllumiConfig::default();
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.total_leds, 144);
        assert_eq!(config.trail_length, 6);
        assert_eq!(config.stale_after(), Duration::from_secs(5));
        let capture = config.capture_config();
        assert_eq!(capture.snapshot_len, 1024);
        assert!(!capture.promiscuous);
        assert_eq!(capture.read_timeout_ms, 50);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = IllumiConfig::parse(
            r##"
interface = " wlan0 "
total_leds = 60
trail_length = 500
speed = 0

[categories.lldp]
enabled = true

[categories.TCP]
color = "#FF8800"
"##,
        )
        .unwrap();

        assert_eq!(config.interface, "wlan0");
        assert_eq!(config.total_leds, 60);
        assert_eq!(config.trail_length, 60);
        assert_eq!(config.speed, 1);
        assert_eq!(config.wled_ip, "led.local");

        let table = config.category_table().unwrap();
        assert!(table.get(Category::Lldp).enabled);
        assert_eq!(table.get(Category::Tcp), CategoryMeta { color: 0xFF8800, enabled: true });
    }

    #[test]
    fn test_bad_category_entries() {
        let unknown = IllumiConfig::parse("[categories.quic]\nenabled = false\n").unwrap();
        assert!(unknown.category_table().is_err());

        let bad_color = IllumiConfig::parse("[categories.arp]\ncolor = \"orange\"\n").unwrap();
        assert!(bad_color.category_table().is_err());

        assert!(IllumiConfig::parse("total_leds = \"many\"").is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = IllumiConfig::default();
        assert!(!config.merge_with_args(&args(&[])));

        let provided = config.merge_with_args(&args(&["-i", "wlan0", "-s", "3", "--narp", "--preview", "-L", "30"]));
        assert!(provided);
        assert_eq!(config.interface, "wlan0");
        assert_eq!(config.speed, 3);
        assert_eq!(config.total_leds, 30);
        assert_eq!(config.sink, "terminal");

        let table = config.category_table().unwrap();
        assert!(!table.get(Category::Arp).enabled);
        assert_eq!(table.get(Category::Arp).color, ORANGE);
        assert!(table.get(Category::Tcp).enabled);
        assert!(table.get(Category::Udp).enabled);
    }

    #[test]
    fn test_disable_flags_override_config_file() {
        let mut config = IllumiConfig::parse("[categories.udp]\nenabled = true\n").unwrap();
        config.merge_with_args(&args(&["--nudp", "--ntcp"]));
        let table = config.category_table().unwrap();
        assert!(!table.get(Category::Udp).enabled);
        assert!(!table.get(Category::Tcp).enabled);
    }

    #[test]
    fn test_disable_flags_win_over_any_key_spelling() {
        let file = "[categories.Arp]\nenabled = true\ncolor = \"#112233\"\n\n[categories.TCP]\nenabled = true\n";
        let mut config = IllumiConfig::parse(file).unwrap();
        assert_eq!(config.categories.len(), 2);
        assert!(config.categories.contains_key("arp"));

        config.merge_with_args(&args(&["--narp", "--ntcp"]));
        assert_eq!(config.categories.len(), 2);
        let table = config.category_table().unwrap();
        assert!(!table.get(Category::Arp).enabled);
        assert!(!table.get(Category::Tcp).enabled);
        // Only the enable flag is overridden
        assert_eq!(table.get(Category::Arp).color, 0x112233);
    }

    #[test]
    fn test_config_path() {
        assert_eq!(
            IllumiConfig::config_path(Some("/etc/illumi.conf")).unwrap(),
            PathBuf::from("/etc/illumi.conf")
        );
        assert_eq!(
            IllumiConfig::config_path(Some("./local.conf")).unwrap(),
            PathBuf::from("./local.conf")
        );
        if std::env::var("HOME").is_ok() {
            let named = IllumiConfig::config_path(Some("desk")).unwrap();
            assert!(named.ends_with(".config/illumi-packet/desk.conf"));
        }
    }

    #[test]
    fn test_missing_named_config_is_an_error() {
        assert!(IllumiConfig::load_with_path(Some("/nonexistent/illumi-packet.conf")).is_err());
    }
}
