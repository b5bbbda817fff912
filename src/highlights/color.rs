//! Hex color parsing and overlap blending

use super::segments::Cover;
use super::types::DEFAULT_HIGHLIGHT_COLOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#RRGGBB` or `#RGB`
    pub fn parse_hex(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self {
                r: channel(hex.get(0..2)?)?,
                g: channel(hex.get(2..4)?)?,
                b: channel(hex.get(4..6)?)?,
            }),
            3 => {
                let double = |i: usize| hex.get(i..i + 1).and_then(|c| channel(&c.repeat(2)));
                Some(Self {
                    r: double(0)?,
                    g: double(1)?,
                    b: double(2)?,
                })
            }
            _ => None,
        }
    }

    /// Parse a record color, falling back to the default highlight color
    pub fn from_record_color(color: &str) -> Self {
        Self::parse_hex(color).unwrap_or_else(|| {
            log::warn!("Invalid highlight color {:?}, using {}", color, DEFAULT_HIGHLIGHT_COLOR);
            Self::parse_hex(DEFAULT_HIGHLIGHT_COLOR).unwrap_or(Self { r: 255, g: 235, b: 59 })
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(self, opacity: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, round3(clamp_opacity(opacity)))
    }
}

pub fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        0.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Channel-wise average, rounded
pub fn blend(colors: &[Rgb]) -> Option<Rgb> {
    if colors.is_empty() {
        return None;
    }
    let count = colors.len() as f64;
    let average = |channel: fn(&Rgb) -> u8| {
        let total: f64 = colors.iter().map(|c| f64::from(channel(c))).sum();
        (total / count).round() as u8
    };
    Some(Rgb {
        r: average(|c| c.r),
        g: average(|c| c.g),
        b: average(|c| c.b),
    })
}

/// CSS background declaration for a segment's covering set
///
/// One cover paints its own color at its own opacity. Several covers either
/// paint a left-to-right gradient with one stop per cover, or the averaged
/// color at the averaged opacity.
pub fn segment_background(covers: &[Cover], base_opacity: f64, use_gradient: bool) -> String {
    let paints: Vec<(Rgb, f64)> = covers
        .iter()
        .map(|cover| {
            (
                Rgb::from_record_color(&cover.color),
                clamp_opacity(cover.opacity.unwrap_or(base_opacity)),
            )
        })
        .collect();

    match paints.as_slice() {
        [] => String::new(),
        [(color, opacity)] => format!("background-color: {}", color.to_rgba(*opacity)),
        _ if use_gradient => {
            let count = paints.len() as f64;
            let stops: Vec<String> = paints
                .iter()
                .enumerate()
                .map(|(i, (color, opacity))| {
                    format!("{} {}%", color.to_rgba(*opacity), round3(i as f64 / count * 100.0))
                })
                .collect();
            format!("background: linear-gradient(to right, {})", stops.join(", "))
        }
        _ => {
            let colors: Vec<Rgb> = paints.iter().map(|(color, _)| *color).collect();
            let opacity = paints.iter().map(|(_, opacity)| opacity).sum::<f64>() / paints.len() as f64;
            let color = blend(&colors).unwrap_or_else(|| Rgb::from_record_color(DEFAULT_HIGHLIGHT_COLOR));
            format!("background-color: {}", color.to_rgba(opacity))
        }
    }
}
