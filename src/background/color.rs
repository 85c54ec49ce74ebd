use super::BackgroundError;
use image::Rgba;

/// The preset swatches offered on the configuration page, plus a few
/// common names
const NAMED: &[(&str, [u8; 4])] = &[
    ("white", [255, 255, 255, 255]),
    ("black", [0, 0, 0, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("pink", [255, 192, 203, 255]),
    ("purple", [128, 0, 128, 255]),
    ("orange", [255, 165, 0, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("transparent", [0, 0, 0, 0]),
];

/// A CSS color string together with the RGBA value it denotes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssColor {
    css: String,
    rgba: Rgba<u8>,
}

impl CssColor {
    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
    /// `rgba(r, g, b, a)` and the named palette
    pub fn parse(css: &str) -> Result<Self, BackgroundError> {
        let trimmed = css.trim();
        let lower = trimmed.to_ascii_lowercase();
        let unknown = || BackgroundError::UnknownColor(trimmed.to_string());

        let rgba = if let Some(hex) = lower.strip_prefix('#') {
            parse_hex(hex).ok_or_else(unknown)?
        } else if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            let args = args.strip_suffix(')').ok_or_else(unknown)?;
            parse_functional(args).ok_or_else(unknown)?
        } else {
            NAMED
                .iter()
                .find(|(name, _)| *name == lower)
                .map(|(_, rgba)| Rgba(*rgba))
                .ok_or_else(unknown)?
        };

        Ok(Self {
            css: trimmed.to_string(),
            rgba,
        })
    }

    pub fn rgba(&self) -> Rgba<u8> {
        self.rgba
    }

    pub fn as_str(&self) -> &str {
        &self.css
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
            Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255]))
        }
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.round().clamp(0.0, 255.0) as u8);
    match parts.as_slice() {
        [r, g, b] => Some(Rgba([channel(r)?, channel(g)?, channel(b)?, 255])),
        [r, g, b, a] => {
            let alpha = a.parse::<f32>().ok()?.clamp(0.0, 1.0);
            Some(Rgba([
                channel(r)?,
                channel(g)?,
                channel(b)?,
                (alpha * 255.0).round() as u8,
            ]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert_eq!(CssColor::parse("#fff").unwrap().rgba(), Rgba([255, 255, 255, 255]));
        assert_eq!(CssColor::parse("#1A2b3C").unwrap().rgba(), Rgba([0x1a, 0x2b, 0x3c, 255]));
        assert_eq!(CssColor::parse("#00000080").unwrap().rgba(), Rgba([0, 0, 0, 0x80]));
        assert!(CssColor::parse("#12345").is_err());
        assert!(CssColor::parse("#ggg").is_err());
    }

    #[test]
    fn test_functional_forms() {
        // What a browser reports for an inline swatch color
        assert_eq!(
            CssColor::parse("rgb(255, 192, 203)").unwrap().rgba(),
            Rgba([255, 192, 203, 255])
        );
        assert_eq!(
            CssColor::parse("rgba(10, 20, 30, 0.5)").unwrap().rgba(),
            Rgba([10, 20, 30, 128])
        );
        assert!(CssColor::parse("rgb(1, 2)").is_err());
        assert!(CssColor::parse("rgb(1, 2, 3").is_err());
    }

    #[test]
    fn test_named_colors_keep_their_text() {
        let color = CssColor::parse("  Pink ").unwrap();
        assert_eq!(color.rgba(), Rgba([255, 192, 203, 255]));
        assert_eq!(color.as_str(), "Pink");
        assert!(matches!(
            CssColor::parse("chartreuse-ish"),
            Err(BackgroundError::UnknownColor(_))
        ));
    }
}
