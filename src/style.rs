//! Inline style handling – declaration lists, lengths and CSS colours.
//!
//! The surface keeps every element's inline `style` attribute as an ordered
//! [`InlineStyle`]; the rasterizers read geometry and colours out of it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        let doubled = |i: usize| channel(&hex[i..i + 1].repeat(2));
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 | 4 => Some(Self {
                r: doubled(0)?,
                g: doubled(1)?,
                b: doubled(2)?,
                a: if hex.len() == 4 { doubled(3)? } else { 1.0 },
            }),
            6 | 8 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 },
            }),
            _ => None,
        }
    }

    /// Quantise to 8-bit RGBA.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

/// Parse a CSS colour value.
///
/// Supported: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` in
/// comma or space syntax (numbers or percentages, optional `/ alpha`), and a
/// small set of keywords. Any other functional notation (`oklch()`, `lab()`,
/// `color-mix()` ...) is reported as an unsupported colour function.
pub fn parse_color(value: &str) -> Result<Color, String> {
    let v = value.trim().to_ascii_lowercase();
    if v.starts_with('#') {
        return Color::from_hex(&v).ok_or_else(|| format!("malformed hex color `{value}`"));
    }
    if let Some(open) = v.find('(') {
        let func = v[..open].trim();
        let Some(args) = v[open + 1..].strip_suffix(')') else {
            return Err(format!("unterminated color function `{value}`"));
        };
        return match func {
            "rgb" | "rgba" => parse_rgb_args(args).ok_or_else(|| format!("malformed {func}() color `{value}`")),
            _ => Err(format!("unsupported color function `{value}`")),
        };
    }
    named_color(&v).ok_or_else(|| format!("unknown color `{value}`"))
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let (channels, alpha) = match args.split_once('/') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (args, None),
    };
    let mut parts: Vec<&str> = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    let alpha = match (alpha, parts.len()) {
        (Some(a), 3) => Some(a),
        (None, 4) => parts.pop(),
        (None, 3) => None,
        _ => return None,
    };

    let channel = |p: &str| -> Option<f32> {
        match p.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f32>().ok().map(|v| v / 100.0),
            None => p.parse::<f32>().ok().map(|v| v / 255.0),
        }
    };
    let a = match alpha {
        Some(a) => match a.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f32>().ok()? / 100.0,
            None => a.parse::<f32>().ok()?,
        },
        None => 1.0,
    };
    Some(Color {
        r: channel(parts[0])?.clamp(0.0, 1.0),
        g: channel(parts[1])?.clamp(0.0, 1.0),
        b: channel(parts[2])?.clamp(0.0, 1.0),
        a: a.clamp(0.0, 1.0),
    })
}

fn named_color(name: &str) -> Option<Color> {
    let c = match name {
        "transparent" => Color::TRANSPARENT,
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "red" => Color::rgb(1.0, 0.0, 0.0),
        "green" => Color::rgb(0.0, 128.0 / 255.0, 0.0),
        "blue" => Color::rgb(0.0, 0.0, 1.0),
        "yellow" => Color::rgb(1.0, 1.0, 0.0),
        "orange" => Color::rgb(1.0, 165.0 / 255.0, 0.0),
        "gray" | "grey" => Color::rgb(128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0),
        "silver" => Color::rgb(192.0 / 255.0, 192.0 / 255.0, 192.0 / 255.0),
        _ => return None,
    };
    Some(c)
}

/// Parse a pixel length (`12`, `12px`, `12.5px`).
pub fn parse_px(s: &str) -> Option<f32> {
    let s = s.trim().trim_end_matches("px").trim();
    s.parse().ok().filter(|v: &f32| v.is_finite())
}

/// An ordered list of inline `property: value` declarations.
///
/// Property names are stored lowercased; setting an existing property keeps
/// its position so a save/restore round trip reproduces the same attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(style_str: &str) -> Self {
        let mut style = Self::default();
        for decl in style_str.split(';') {
            let Some((prop, val)) = decl.split_once(':') else {
                continue;
            };
            let (prop, val) = (prop.trim(), val.trim());
            if !prop.is_empty() && !val.is_empty() {
                style.set(prop, val);
            }
        }
        style
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        let property = property.to_ascii_lowercase();
        self.declarations
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, property: &str, value: &str) {
        let property = property.to_ascii_lowercase();
        match self.declarations.iter_mut().find(|(p, _)| *p == property) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.declarations.push((property, value.to_string())),
        }
    }

    /// Remove a declaration, returning its previous value.
    pub fn remove(&mut self, property: &str) -> Option<String> {
        let property = property.to_ascii_lowercase();
        let idx = self.declarations.iter().position(|(p, _)| *p == property)?;
        Some(self.declarations.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn px(&self, property: &str) -> Option<f32> {
        self.get(property).and_then(parse_px)
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (p, v)) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{p}: {v};")?;
        }
        Ok(())
    }
}
