use image::{Rgba, RgbaImage};

use crate::models::filter::FilterKind;

/// Applies a colour filter. `FilterKind::None` hands the image back untouched;
/// every other kind produces a new buffer of the same size with alpha copied
/// through.
pub fn apply(image: RgbaImage, kind: FilterKind) -> RgbaImage {
    match kind {
        FilterKind::None => image,
        FilterKind::Grayscale => map_pixels(&image, |r, g, b| {
            let gray = clamp_channel(luma(r, g, b));
            [gray, gray, gray]
        }),
        FilterKind::Vintage => map_pixels(&image, |r, g, b| {
            [
                clamp_channel(r * 1.1 + 10.0),
                clamp_channel(g * 0.95 + 5.0),
                clamp_channel(b * 0.9),
            ]
        }),
        FilterKind::Bright => scale_channels(&image, [1.3, 1.3, 1.3]),
        FilterKind::Dark => scale_channels(&image, [0.7, 0.7, 0.7]),
        FilterKind::Warm => scale_channels(&image, [1.2, 1.1, 0.95]),
        FilterKind::Cool => scale_channels(&image, [0.95, 1.05, 1.2]),
        FilterKind::Sepia => map_pixels(&image, |r, g, b| {
            // Sepia tints the truncated gray level, not the raw luma.
            let gray = clamp_channel(luma(r, g, b)) as f64;
            [
                clamp_channel(gray * 1.2),
                clamp_channel(gray * 1.0),
                clamp_channel(gray * 0.8),
            ]
        }),
        FilterKind::Contrast => map_pixels(&image, |r, g, b| {
            let stretch = |c: f64| clamp_channel((c - 128.0) * 1.5 + 128.0);
            [stretch(r), stretch(g), stretch(b)]
        }),
        FilterKind::Saturate => map_pixels(&image, |r, g, b| {
            let (h, s, v) = rgb_to_hsb(r as u8, g as u8, b as u8);
            hsb_to_rgb(h, (s * 1.5).min(1.0), v)
        }),
    }
}

fn luma(r: f64, g: f64, b: f64) -> f64 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Clamps to the channel range and truncates toward zero.
fn clamp_channel(v: f64) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

fn scale_channels(image: &RgbaImage, factors: [f64; 3]) -> RgbaImage {
    map_pixels(image, |r, g, b| {
        [
            clamp_channel(r * factors[0]),
            clamp_channel(g * factors[1]),
            clamp_channel(b * factors[2]),
        ]
    })
}

fn map_pixels<F>(image: &RgbaImage, f: F) -> RgbaImage
where
    F: Fn(f64, f64, f64) -> [u8; 3],
{
    let mut output = RgbaImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(output.pixels_mut()) {
        let [r, g, b] = f(src[0] as f64, src[1] as f64, src[2] as f64);
        *dst = Rgba([r, g, b, src[3]]);
    }
    output
}

/// Hue, saturation and brightness in `[0, 1]`.
fn rgb_to_hsb(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let cmax = r.max(g).max(b) as f32;
    let cmin = r.min(g).min(b) as f32;
    let (r, g, b) = (r as f32, g as f32, b as f32);

    let brightness = cmax / 255.0;
    let saturation = if cmax != 0.0 { (cmax - cmin) / cmax } else { 0.0 };
    if saturation == 0.0 {
        return (0.0, 0.0, brightness);
    }

    let span = cmax - cmin;
    let redc = (cmax - r) / span;
    let greenc = (cmax - g) / span;
    let bluec = (cmax - b) / span;
    let mut hue = if r == cmax {
        bluec - greenc
    } else if g == cmax {
        2.0 + redc - bluec
    } else {
        4.0 + greenc - redc
    };
    hue /= 6.0;
    if hue < 0.0 {
        hue += 1.0;
    }
    (hue, saturation, brightness)
}

fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> [u8; 3] {
    let to_channel = |v: f32| (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
    if saturation == 0.0 {
        let v = to_channel(brightness);
        return [v, v, v];
    }

    let h = (hue - hue.floor()) * 6.0;
    let f = h - h.floor();
    let p = brightness * (1.0 - saturation);
    let q = brightness * (1.0 - saturation * f);
    let t = brightness * (1.0 - saturation * (1.0 - f));
    let (r, g, b) = match h as u32 {
        0 => (brightness, t, p),
        1 => (q, brightness, p),
        2 => (p, brightness, t),
        3 => (p, q, brightness),
        4 => (t, p, brightness),
        _ => (brightness, p, q),
    };
    [to_channel(r), to_channel(g), to_channel(b)]
}
