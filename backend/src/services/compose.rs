use image::{Rgb, RgbaImage};

use crate::models::text_style::{TextPosition, TextStyle};
use crate::services::typeface::{GlyphMask, Typeface};

/// Horizontal margin kept free on each side of a caption line.
const SIDE_MARGIN: i32 = 40;
/// Distance between the caption block and the top or bottom edge.
const EDGE_MARGIN: i32 = 40;
const SHADOW_ALPHA: f32 = 128.0 / 255.0;
/// Outline radius ceiling; each unit adds a ring of full-line draws.
const MAX_STROKE_RADIUS: i32 = 16;

/// Overlays `text` onto a copy of `image` using `style`. The output has the
/// same dimensions as the input; pixels outside glyph coverage are left
/// untouched. Empty text returns an identical copy.
pub fn compose(image: &RgbaImage, text: &str, style: &TextStyle, face: &dyn Typeface) -> RgbaImage {
    if text.is_empty() {
        return image.clone();
    }

    let (width, height) = (image.width() as i32, image.height() as i32);
    // A glyph taller or wider than the whole image cannot be seen in full.
    let px = style.font_px().min(width.max(height) as f32);
    let line_height = face.metrics(px).line_height();
    let line_spacing = (line_height as f32 * 0.2) as i32;
    let max_width = (width - 2 * SIDE_MARGIN) as f32;

    let lines = wrap_text(text, face, px, max_width);
    let count = lines.len() as i32;
    let total_height = count * line_height + (count - 1) * line_spacing;

    let start_y = match style.position {
        TextPosition::Top => line_height + EDGE_MARGIN,
        TextPosition::Bottom => height - total_height - EDGE_MARGIN,
        TextPosition::Center => (height - total_height) / 2 + line_height,
    };

    let stroke = style.stroke_rgb();
    let fill = style.text_rgb();
    let shadow = style.shadow_rgb();
    let radius = style.stroke_radius().min(MAX_STROKE_RADIUS);
    let angle = style.rotation_radians();

    let mut overlay = Overlay::new(image.width(), image.height());
    for (i, line) in lines.iter().enumerate() {
        let mask = face.rasterize(line, px);
        if mask.is_empty() {
            continue;
        }
        let line_width = face.measure(line, px);
        let x = ((width as f32 - line_width) / 2.0) as i32;
        let y = start_y + i as i32 * (line_height + line_spacing);
        let frame = LineFrame::new(x, y, line_width, angle);

        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx.abs() + dy.abs() <= radius && (dx != 0 || dy != 0) {
                    overlay.draw(&mask, &frame, (dx, dy), stroke, 1.0);
                }
            }
        }
        if style.shadow_enabled {
            overlay.draw(
                &mask,
                &frame,
                (style.shadow_offset_x, style.shadow_offset_y),
                shadow,
                SHADOW_ALPHA,
            );
        }
        overlay.draw(&mask, &frame, (0, 0), fill, 1.0);
    }

    overlay.composite_onto(image, style.clamped_opacity())
}

/// Greedy character-wise wrap: a line grows while its measured width stays
/// within `max_width`. A character wider than `max_width` on its own still
/// gets a line.
pub fn wrap_text(text: &str, face: &dyn Typeface, px: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if current.chars().nth(1).is_some() && face.measure(&current, px) > max_width {
            current.pop();
            lines.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Placement of one caption line: pen origin on the baseline plus the
/// rotation about the line's horizontal centre on that baseline.
struct LineFrame {
    origin: (f32, f32),
    pivot: (f32, f32),
    cos: f32,
    sin: f32,
}

impl LineFrame {
    fn new(x: i32, baseline: i32, line_width: f32, angle: f32) -> Self {
        Self {
            origin: (x as f32, baseline as f32),
            pivot: (x as f32 + line_width / 2.0, baseline as f32),
            cos: angle.cos(),
            sin: angle.sin(),
        }
    }

    fn forward(&self, px: f32, py: f32) -> (f32, f32) {
        let (dx, dy) = (px - self.pivot.0, py - self.pivot.1);
        (
            self.pivot.0 + dx * self.cos - dy * self.sin,
            self.pivot.1 + dx * self.sin + dy * self.cos,
        )
    }

    fn inverse(&self, qx: f32, qy: f32) -> (f32, f32) {
        let (dx, dy) = (qx - self.pivot.0, qy - self.pivot.1);
        (
            self.pivot.0 + dx * self.cos + dy * self.sin,
            self.pivot.1 - dx * self.sin + dy * self.cos,
        )
    }
}

/// Premultiplied RGBA layer holding every caption draw before it is blended
/// onto the image in one pass.
struct Overlay {
    width: u32,
    height: u32,
    data: Vec<[f32; 4]>,
}

impl Overlay {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Source-over draw of `mask` in `color`, shifted by `offset` inside the
    /// line frame.
    fn draw(&mut self, mask: &GlyphMask, frame: &LineFrame, offset: (i32, i32), color: Rgb<u8>, alpha: f32) {
        let left = frame.origin.0 + (mask.left + offset.0) as f32;
        let top = frame.origin.1 + (mask.top + offset.1) as f32;
        let right = left + mask.width as f32;
        let bottom = top + mask.height as f32;

        let corners = [
            frame.forward(left, top),
            frame.forward(right, top),
            frame.forward(left, bottom),
            frame.forward(right, bottom),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as i64;
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as i64;
        let max_x = (corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil() as i64)
            .min(self.width as i64);
        let max_y = (corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil() as i64)
            .min(self.height as i64);

        let rgb = [
            color[0] as f32 / 255.0,
            color[1] as f32 / 255.0,
            color[2] as f32 / 255.0,
        ];

        for y in min_y..max_y {
            for x in min_x..max_x {
                let (sx, sy) = frame.inverse(x as f32 + 0.5, y as f32 + 0.5);
                let mx = (sx - left).floor() as i32;
                let my = (sy - top).floor() as i32;
                let coverage = mask.at(mx, my);
                if coverage <= 0.0 {
                    continue;
                }

                let sa = coverage * alpha;
                let cell = &mut self.data[y as usize * self.width as usize + x as usize];
                for c in 0..3 {
                    cell[c] = rgb[c] * sa + cell[c] * (1.0 - sa);
                }
                cell[3] = sa + cell[3] * (1.0 - sa);
            }
        }
    }

    /// Blends the layer onto a copy of `base`, scaling the whole layer by
    /// `opacity`.
    fn composite_onto(&self, base: &RgbaImage, opacity: f32) -> RgbaImage {
        let mut output = base.clone();
        for (cell, pixel) in self.data.iter().zip(output.pixels_mut()) {
            let sa = cell[3] * opacity;
            if sa <= 0.0 {
                continue;
            }
            let ba = pixel[3] as f32 / 255.0;
            let out_a = sa + ba * (1.0 - sa);
            for c in 0..3 {
                let src = cell[c] * opacity;
                let dst = pixel[c] as f32 / 255.0 * ba * (1.0 - sa);
                pixel[c] = to_channel((src + dst) / out_a);
            }
            pixel[3] = to_channel(out_a);
        }
        output
    }
}

fn to_channel(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::typeface::BlockFace;
    use image::Rgba;

    fn canvas(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([30, 90, 160, 255]))
    }

    fn changed_rows(before: &RgbaImage, after: &RgbaImage) -> (u32, u32) {
        let rows: Vec<u32> = (0..before.height())
            .filter(|&y| (0..before.width()).any(|x| before.get_pixel(x, y) != after.get_pixel(x, y)))
            .collect();
        (*rows.first().unwrap(), *rows.last().unwrap())
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let lines = wrap_text("hi there", &BlockFace, 40.0, 400.0);
        assert_eq!(lines, vec!["hi there"]);
    }

    #[test]
    fn long_text_wraps_within_max_width() {
        let face = BlockFace;
        let text = "when the build passes on the first try and nobody believes you";
        let max_width = 320.0;
        assert!(face.measure(text, 40.0) > max_width);

        let lines = wrap_text(text, &face, 40.0, max_width);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(face.measure(line, 40.0) <= max_width, "{:?} too wide", line);
        }
        assert_eq!(lines.concat(), text);
    }

    #[test]
    fn over_wide_character_gets_its_own_line() {
        // Wide glyphs are 40px, ASCII 20px, limit 30px.
        let lines = wrap_text("a高b", &BlockFace, 40.0, 30.0);
        assert_eq!(lines, vec!["a", "高", "b"]);

        let lines = wrap_text("高高", &BlockFace, 40.0, 10.0);
        assert_eq!(lines, vec!["高", "高"]);
    }

    #[test]
    fn empty_text_is_pixel_identical() {
        let img = canvas(200, 120);
        let out = compose(&img, "", &TextStyle::default(), &BlockFace);
        assert_eq!(out, img);
    }

    #[test]
    fn compose_keeps_dimensions_and_draws_fill() {
        let img = canvas(400, 300);
        let style = TextStyle {
            text_color: "255,0,0".to_string(),
            ..TextStyle::default()
        };
        let out = compose(&img, "AB", &style, &BlockFace);
        assert_eq!(out.dimensions(), img.dimensions());

        // "AB" at 40px is 40px wide, centred at x = 180; centre baseline is
        // (300 - 40) / 2 + 40 = 170, glyph rows 142..170.
        assert_eq!(out.get_pixel(190, 160).0, [255, 0, 0, 255]);
        // Outline sits just outside the fill.
        assert_eq!(out.get_pixel(180, 160).0, [0, 0, 0, 255]);
        // Far away from the text nothing changes.
        assert_eq!(out.get_pixel(10, 10), img.get_pixel(10, 10));
    }

    #[test]
    fn position_moves_the_block() {
        let img = canvas(300, 400);
        let top = TextStyle { position: TextPosition::Top, ..TextStyle::default() };
        let bottom = TextStyle { position: TextPosition::Bottom, ..TextStyle::default() };

        let (top_first, _) = changed_rows(&img, &compose(&img, "x", &top, &BlockFace));
        let (bottom_first, _) = changed_rows(&img, &compose(&img, "x", &bottom, &BlockFace));
        assert!(top_first < 100);
        assert!(bottom_first > 250);
    }

    #[test]
    fn huge_font_and_stroke_are_bounded_by_the_image() {
        let img = canvas(400, 300);
        let style = TextStyle {
            font_size: 100_000,
            stroke_width: u32::MAX,
            text_color: "255,0,0".to_string(),
            ..TextStyle::default()
        };

        let out = compose(&img, "ab", &style, &BlockFace);
        assert_eq!(out.dimensions(), img.dimensions());
        assert_ne!(out, img);
        assert!(out.pixels().any(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn zero_opacity_leaves_image_unchanged() {
        let img = canvas(200, 200);
        let style = TextStyle { opacity: 0.0, ..TextStyle::default() };
        assert_eq!(compose(&img, "hello", &style, &BlockFace), img);
    }

    #[test]
    fn half_opacity_blends_fill() {
        let img = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255]));
        let style = TextStyle { opacity: 0.5, ..TextStyle::default() };
        let out = compose(&img, "AB", &style, &BlockFace);
        let p = out.get_pixel(190, 160);
        assert!((126..=129).contains(&p[0]), "{:?}", p);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn shadow_is_drawn_when_enabled() {
        let img = RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]));
        let plain = TextStyle {
            stroke_color: "255,255,255".to_string(),
            text_color: "255,255,255".to_string(),
            ..TextStyle::default()
        };
        let shadowed = TextStyle {
            shadow_enabled: true,
            shadow_color: "0,0,255".to_string(),
            shadow_offset_x: 20,
            shadow_offset_y: 20,
            ..plain.clone()
        };
        assert_eq!(compose(&img, "AB", &plain, &BlockFace), img);

        let out = compose(&img, "AB", &shadowed, &BlockFace);
        // Shadow lands 20px right/down of the fill, at roughly half alpha.
        let p = out.get_pixel(215, 175);
        assert_eq!(p[2], 255);
        assert!((126..=128).contains(&p[0]), "{:?}", p);
    }

    #[test]
    fn rotation_changes_coverage_but_not_size() {
        let img = canvas(400, 300);
        let straight = compose(&img, "ABCD", &TextStyle::default(), &BlockFace);
        let rotated = compose(
            &img,
            "ABCD",
            &TextStyle { rotation_degrees: 30.0, ..TextStyle::default() },
            &BlockFace,
        );
        assert_eq!(rotated.dimensions(), img.dimensions());
        assert_ne!(straight, rotated);

        let (first, last) = changed_rows(&img, &straight);
        let (rot_first, rot_last) = changed_rows(&img, &rotated);
        assert!(rot_last - rot_first > last - first);
    }

    #[test]
    fn text_never_touches_alpha_of_opaque_images() {
        let img = canvas(300, 200);
        let out = compose(&img, "alpha check", &TextStyle::default(), &BlockFace);
        assert!(out.pixels().all(|p| p[3] == 255));
    }
}
