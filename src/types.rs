// Shared types module - Traffic categories, their colors and the category table
use anyhow::Result;
use std::fmt;

// Traffic category assigned to every captured packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Others,
    Anomaly,
    Tcp,
    Udp,
    Arp,
    Icmp,
    Igmp,
    Dhcp,
    Dns,
    Lldp,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Others,
        Category::Anomaly,
        Category::Tcp,
        Category::Udp,
        Category::Arp,
        Category::Icmp,
        Category::Igmp,
        Category::Dhcp,
        Category::Dns,
        Category::Lldp,
    ];

    /// Classification order, most specific first. `Others` is the fallback.
    pub const PRIORITY: [Category; 10] = [
        Category::Anomaly,
        Category::Lldp,
        Category::Dns,
        Category::Icmp,
        Category::Dhcp,
        Category::Arp,
        Category::Igmp,
        Category::Udp,
        Category::Tcp,
        Category::Others,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Others => "Others",
            Category::Anomaly => "Anomaly",
            Category::Tcp => "TCP",
            Category::Udp => "UDP",
            Category::Arp => "ARP",
            Category::Icmp => "ICMP",
            Category::Igmp => "IGMP",
            Category::Dhcp => "DHCP",
            Category::Dns => "DNS",
            Category::Lldp => "LLDP",
        }
    }

    /// Case-insensitive lookup used by the config file's `[categories]` table
    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Packed 0xRRGGBB colors
pub const WHITE: u32 = 0xFFFFFF;
pub const GREEN: u32 = 0x008800;
pub const RED: u32 = 0xFF0000;
pub const BLUE: u32 = 0x0000FF;
pub const PURPLE: u32 = 0x800080;
pub const PINK: u32 = 0xFF00FF;
pub const YELLOW: u32 = 0xFFFF00;
pub const ORANGE: u32 = 0xFFA500;
pub const CYAN: u32 = 0x00FFFF;
pub const LIME: u32 = 0x00FF00;
pub const GRAY: u32 = 0x888888;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMeta {
    pub color: u32,
    pub enabled: bool,
}

// Built once at startup, read-only while packets flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    entries: [CategoryMeta; 10],
}

impl Default for CategoryTable {
    fn default() -> Self {
        let mut entries = [CategoryMeta { color: WHITE, enabled: true }; 10];
        entries[Category::Anomaly.index()].color = RED;
        entries[Category::Tcp.index()].color = BLUE;
        entries[Category::Igmp.index()].color = PURPLE;
        entries[Category::Icmp.index()].color = PINK;
        entries[Category::Udp.index()].color = YELLOW;
        entries[Category::Arp.index()].color = ORANGE;
        entries[Category::Dhcp.index()].color = CYAN;
        entries[Category::Dns.index()].color = LIME;
        // LLDP is recognised but hidden unless the config enables it
        entries[Category::Lldp.index()] = CategoryMeta { color: GRAY, enabled: false };
        CategoryTable { entries }
    }
}

impl CategoryTable {
    pub fn get(&self, category: Category) -> CategoryMeta {
        self.entries[category.index()]
    }

    pub fn set_color(&mut self, category: Category, color: u32) {
        self.entries[category.index()].color = color & 0xFFFFFF;
    }

    pub fn set_enabled(&mut self, category: Category, enabled: bool) {
        self.entries[category.index()].enabled = enabled;
    }
}

// RGB color representation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid hex color: {}", hex);
        }
        Ok(Rgb {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
        })
    }

    pub fn from_packed(color: u32) -> Self {
        Rgb {
            r: ((color >> 16) & 0xFF) as u8,
            g: ((color >> 8) & 0xFF) as u8,
            b: (color & 0xFF) as u8,
        }
    }

    pub fn packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub fn scaled(self, brightness: f64) -> Self {
        let scale = |c: u8| (c as f64 * brightness).round().clamp(0.0, 255.0) as u8;
        Rgb { r: scale(self.r), g: scale(self.g), b: scale(self.b) }
    }
}
