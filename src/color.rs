//! CSS-style color strings: `rgb()`, `rgba()`, `#rgb`, `#rrggbb`.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0..=1
    pub a: f32,
}

pub const DEFAULT_PRIMARY: Rgba = Rgba::rgb(100, 180, 255);

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let (body, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest, true)
        } else if let Some(rest) = s.strip_prefix("rgb(") {
            (rest, false)
        } else {
            return None;
        };
        let body = body.strip_suffix(')')?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        let channel = |p: &str| -> Option<u8> {
            let v: f32 = p.parse().ok()?;
            Some(v.round().clamp(0.0, 255.0) as u8)
        };
        match *parts.as_slice() {
            [r, g, b] => Some(Self::rgb(channel(r)?, channel(g)?, channel(b)?)),
            [r, g, b, a] if has_alpha => {
                let a: f32 = a.parse().ok()?;
                Some(Self {
                    a: a.clamp(0.0, 1.0),
                    ..Self::rgb(channel(r)?, channel(g)?, channel(b)?)
                })
            }
            _ => None,
        }
    }

    /// Same channels with alpha replaced.
    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn lerp(a: Rgba, b: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let lerp1 = |x: u8, y: u8| -> u8 {
            (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8
        };
        Rgba {
            r: lerp1(a.r, b.r),
            g: lerp1(a.g, b.g),
            b: lerp1(a.b, b.b),
            a: a.a + (b.a - a.a) * t,
        }
    }

    pub fn to_crossterm(self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some(Rgba::rgb(byte(0)?, byte(2)?, byte(4)?))
}

/// Parse `value`, or derive a translucent variant of `primary` when absent or unparsable.
pub fn resolve_or_derive(value: Option<&str>, primary: Rgba, alpha: f32) -> Rgba {
    value
        .and_then(Rgba::parse)
        .unwrap_or_else(|| primary.with_alpha(alpha))
}
