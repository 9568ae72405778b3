// THEORY:
// The `pixel` module is the lowest layer of the engine: a single 3-channel sample
// and the color representations derived from it. Everything above (profiling,
// segmentation, classification) is built from these conversions, so they have to
// agree exactly with the 8-bit conventions the thresholds were tuned against.
//
// Key principles:
// 1) Single-pixel scope: nothing here reads neighbors or history.
// 2) Channel order is explicit. Video devices hand us BGR, decoders hand us RGB;
//    a `Pixel` is always stored as red/green/blue once constructed.
// 3) HSV follows the 8-bit convention: hue is degrees halved into [0, 180),
//    saturation and value span [0, 255]. Classifier bands are written in this scale.

pub mod pixel {
    use serde::{Deserialize, Serialize};

    pub type Channel = u8;
    pub type Gray = u8;

    /// Maximum hue in the halved-degree scale (exclusive).
    pub const HUE_RANGE: u16 = 180;

    /// Byte order of the interleaved channels in a frame buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ChannelOrder {
        Bgr,
        Rgb,
    }

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    /// An 8-bit HSV triple: hue in [0, 180), saturation and value in [0, 255].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Hsv {
        pub hue: u8,
        pub saturation: u8,
        pub value: u8,
    }

    impl Hsv {
        pub fn new(hue: u8, saturation: u8, value: u8) -> Self {
            Self { hue, saturation, value }
        }

        /// True when every channel sits at or below `floor`.
        pub fn is_below_floor(&self, floor: u8) -> bool {
            self.hue <= floor && self.saturation <= floor && self.value <= floor
        }
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// Builds a pixel from three bytes in the given channel order.
        pub fn from_ordered(bytes: [u8; 3], order: ChannelOrder) -> Self {
            match order {
                ChannelOrder::Rgb => Self::new(bytes[0], bytes[1], bytes[2]),
                ChannelOrder::Bgr => Self::new(bytes[2], bytes[1], bytes[0]),
            }
        }

        /// Rec. 601 luma, rounded to the nearest integer.
        pub fn gray(&self) -> Gray {
            let luma = 0.299 * self.red as f32 + 0.587 * self.green as f32 + 0.114 * self.blue as f32;
            luma.round().clamp(0.0, 255.0) as Gray
        }

        /// Converts to 8-bit HSV.
        /// - V is the largest channel.
        /// - S is the chroma relative to V, scaled to 255 (0 for black).
        /// - H is the color-wheel angle in degrees, halved and rounded; 180 wraps to 0.
        pub fn hsv(&self) -> Hsv {
            let r = self.red as f32;
            let g = self.green as f32;
            let b = self.blue as f32;
            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            let chroma = max - min;

            let saturation = if max > 0.0 { (255.0 * chroma / max).round() } else { 0.0 };

            let hue_degrees = if chroma == 0.0 {
                0.0
            } else if max == r {
                60.0 * (g - b) / chroma
            } else if max == g {
                120.0 + 60.0 * (b - r) / chroma
            } else {
                240.0 + 60.0 * (r - g) / chroma
            };
            let hue_degrees = if hue_degrees < 0.0 { hue_degrees + 360.0 } else { hue_degrees };
            let mut hue = (hue_degrees / 2.0).round() as u16;
            if hue >= HUE_RANGE {
                hue -= HUE_RANGE;
            }

            Hsv {
                hue: hue as u8,
                saturation: saturation as u8,
                value: max as u8,
            }
        }
    }

    impl From<Hsv> for (f64, f64, f64) {
        fn from(hsv: Hsv) -> Self {
            (hsv.hue as f64, hsv.saturation as f64, hsv.value as f64)
        }
    }
}


// -----------------------------------------------------------------------------
// Glossary: 8-bit HSV
//
// - Hue: angle on the color wheel. Stored as degrees / 2 so it fits a byte; brown
//   and beige shells fall roughly in 10..30, greenish casts above 40.
//
// - Saturation: chroma (max - min) relative to value. Washed-out shells are low,
//   stained or discolored shells read higher.
//
// - Value: the brightest channel. Empty, dark conveyor background sits near zero,
//   which is what the noise floor filters out.
