use data::config::ColorScheme;
use iced_core::Color;

/// Concrete colors for one scheme. Bid flow paints red-side, ask flow
/// green-side, matching the delta sign convention (ask - bid).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub bullish: Color,
    pub bearish: Color,
    pub bid: Color,
    pub ask: Color,
    pub poc: Color,
    pub imbalance_bid: Color,
    pub imbalance_ask: Color,
    pub grid: Color,
    pub label: Color,
    pub spine: Color,
}

impl Palette {
    pub fn from_scheme(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Dark => Self {
                background: Color::from_rgb8(0x11, 0x14, 0x18),
                bullish: Color::from_rgb8(0x26, 0xa6, 0x9a),
                bearish: Color::from_rgb8(0xef, 0x53, 0x50),
                bid: Color::from_rgb8(0xf2, 0x36, 0x45),
                ask: Color::from_rgb8(0x08, 0x99, 0x81),
                poc: Color::from_rgb8(0xff, 0xb7, 0x4d),
                imbalance_bid: Color::from_rgb8(0xff, 0x52, 0x52),
                imbalance_ask: Color::from_rgb8(0x00, 0xe6, 0x76),
                grid: Color::from_rgb8(0x2a, 0x2e, 0x39),
                label: Color::from_rgb8(0xb2, 0xb5, 0xbe),
                spine: Color::from_rgb8(0x78, 0x7b, 0x86),
            },
            ColorScheme::Light => Self {
                background: Color::from_rgb8(0xff, 0xff, 0xff),
                bullish: Color::from_rgb8(0x08, 0x99, 0x81),
                bearish: Color::from_rgb8(0xf2, 0x36, 0x45),
                bid: Color::from_rgb8(0xd3, 0x2f, 0x2f),
                ask: Color::from_rgb8(0x2e, 0x7d, 0x32),
                poc: Color::from_rgb8(0xe6, 0x8a, 0x00),
                imbalance_bid: Color::from_rgb8(0xc6, 0x28, 0x28),
                imbalance_ask: Color::from_rgb8(0x1b, 0x5e, 0x20),
                grid: Color::from_rgb8(0xe0, 0xe3, 0xeb),
                label: Color::from_rgb8(0x43, 0x48, 0x51),
                spine: Color::from_rgb8(0x9a, 0x9e, 0xa6),
            },
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_scheme(ColorScheme::default())
    }
}
