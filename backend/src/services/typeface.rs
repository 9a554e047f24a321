use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rusttype::{point, Font, Scale};
use tracing::{info, warn};

/// Upper bound on the coverage buffer of one rasterised line.
pub const MAX_MASK_PIXELS: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from baseline to the top of the tallest glyph.
    pub ascent: f32,
    /// Distance from baseline to the bottom of the lowest glyph (positive).
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    pub fn line_height(&self) -> i32 {
        ((self.ascent + self.descent + self.line_gap).round() as i32).max(1)
    }
}

/// Glyph coverage of one line of text, positioned relative to the pen start
/// (x = 0) and the baseline (y = 0).
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<f32>,
}

impl GlyphMask {
    pub fn empty() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
            coverage: Vec::new(),
        }
    }

    /// Zero-filled mask over the given box. Boxes above [`MAX_MASK_PIXELS`]
    /// come back empty.
    fn with_bounds(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        if max_x <= min_x || max_y <= min_y {
            return Self::empty();
        }
        let width = (max_x as i64 - min_x as i64) as usize;
        let height = (max_y as i64 - min_y as i64) as usize;
        let Some(len) = width.checked_mul(height).filter(|&n| n <= MAX_MASK_PIXELS) else {
            warn!(width, height, "Glyph mask too large, skipping line");
            return Self::empty();
        };
        Self {
            left: min_x,
            top: min_y,
            width: width as u32,
            height: height as u32,
            coverage: vec![0.0; len],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage at mask-local coordinates, zero outside the mask.
    pub fn at(&self, mx: i32, my: i32) -> f32 {
        if mx < 0 || my < 0 || mx >= self.width as i32 || my >= self.height as i32 {
            return 0.0;
        }
        self.coverage[my as usize * self.width as usize + mx as usize]
    }

    /// Accumulates coverage at baseline-relative coordinates.
    fn add(&mut self, x: i32, y: i32, v: f32) {
        let mx = x - self.left;
        let my = y - self.top;
        if mx < 0 || my < 0 || mx >= self.width as i32 || my >= self.height as i32 {
            return;
        }
        let cell = &mut self.coverage[my as usize * self.width as usize + mx as usize];
        *cell = (*cell + v).min(1.0);
    }
}

/// Measures and rasterises text for the caption compositor.
pub trait Typeface: Send + Sync {
    fn metrics(&self, px: f32) -> LineMetrics;

    /// Rendered advance width of `text` at `px`.
    fn measure(&self, text: &str, px: f32) -> f32;

    fn rasterize(&self, text: &str, px: f32) -> GlyphMask;
}

/// A TrueType/OpenType font loaded from disk.
pub struct TrueTypeFace {
    font: Font<'static>,
}

impl TrueTypeFace {
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        Font::try_from_vec(data).map(|font| Self { font })
    }
}

impl Typeface for TrueTypeFace {
    fn metrics(&self, px: f32) -> LineMetrics {
        let v = self.font.v_metrics(Scale::uniform(px));
        LineMetrics {
            ascent: v.ascent,
            descent: -v.descent,
            line_gap: v.line_gap,
        }
    }

    fn measure(&self, text: &str, px: f32) -> f32 {
        let scale = Scale::uniform(px);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    fn rasterize(&self, text: &str, px: f32) -> GlyphMask {
        let glyphs: Vec<_> = self
            .font
            .layout(text, Scale::uniform(px), point(0.0, 0.0))
            .collect();

        let boxes: Vec<_> = glyphs.iter().filter_map(|g| g.pixel_bounding_box()).collect();
        let Some(first) = boxes.first() else {
            return GlyphMask::empty();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) =
            (first.min.x, first.min.y, first.max.x, first.max.y);
        for bb in &boxes {
            min_x = min_x.min(bb.min.x);
            min_y = min_y.min(bb.min.y);
            max_x = max_x.max(bb.max.x);
            max_y = max_y.max(bb.max.y);
        }

        let mut mask = GlyphMask::with_bounds(min_x, min_y, max_x, max_y);
        for glyph in &glyphs {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    mask.add(gx as i32 + bb.min.x, gy as i32 + bb.min.y, v);
                });
            }
        }
        mask
    }
}

/// Built-in face drawing every visible character as a solid block. Used when
/// no font file is available so captions still render, and in tests for
/// exact geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockFace;

impl BlockFace {
    fn advance(ch: char, px: f32) -> f32 {
        if ch.is_ascii() {
            (px * 0.5).round()
        } else {
            px.round()
        }
    }
}

impl Typeface for BlockFace {
    fn metrics(&self, px: f32) -> LineMetrics {
        LineMetrics {
            ascent: px * 0.8,
            descent: px * 0.2,
            line_gap: 0.0,
        }
    }

    fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().map(|c| Self::advance(c, px)).sum()
    }

    fn rasterize(&self, text: &str, px: f32) -> GlyphMask {
        let top = -(px * 0.7).round() as i32;
        let width = self.measure(text, px).ceil() as i32;
        let mut mask = GlyphMask::with_bounds(0, top, width, 0);
        if mask.is_empty() {
            return mask;
        }

        let mut pen = 0.0f32;
        for ch in text.chars() {
            let advance = Self::advance(ch, px);
            if !ch.is_whitespace() {
                let inset = (advance * 0.1).round() as i32;
                let x0 = pen as i32 + inset;
                let x1 = (pen + advance) as i32 - inset;
                for y in top..0 {
                    for x in x0..x1 {
                        mask.add(x, y, 1.0);
                    }
                }
            }
            pen += advance;
        }
        mask
    }
}

/// Fonts available to the compositor, keyed by lowercase family name (the
/// file stem). Loaded once at startup and read-only afterwards.
#[derive(Default)]
pub struct FontLibrary {
    faces: HashMap<String, Arc<dyn Typeface>>,
    default_family: String,
}

impl FontLibrary {
    /// Loads every `.ttf`, `.otf` and `.ttc` file in `dir`. A missing
    /// directory yields an empty library.
    pub fn load_dir(dir: impl AsRef<Path>, default_family: &str) -> Self {
        let dir = dir.as_ref();
        let mut library = Self {
            faces: HashMap::new(),
            default_family: default_family.to_lowercase(),
        };

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Font directory unavailable, captions use block glyphs");
                return library;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
                .unwrap_or(false);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_font {
                continue;
            }

            match std::fs::read(&path).ok().and_then(TrueTypeFace::from_bytes) {
                Some(face) => {
                    info!(family = %stem, "Loaded font");
                    library.insert(stem, Arc::new(face));
                }
                None => warn!(path = %path.display(), "Skipping unreadable font file"),
            }
        }

        library
    }

    pub fn insert(&mut self, family: &str, face: Arc<dyn Typeface>) {
        self.faces.insert(family.to_lowercase(), face);
    }

    /// Requested family, then the default family, then [`BlockFace`].
    pub fn resolve(&self, family: &str) -> Arc<dyn Typeface> {
        self.faces
            .get(&family.trim().to_lowercase())
            .or_else(|| self.faces.get(&self.default_family))
            .cloned()
            .unwrap_or_else(|| Arc::new(BlockFace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_face_measures_ascii_and_wide_characters() {
        let face = BlockFace;
        assert_eq!(face.measure("ab", 40.0), 40.0);
        assert_eq!(face.measure("高兴", 40.0), 80.0);
        assert_eq!(face.measure("", 40.0), 0.0);
        assert_eq!(face.metrics(40.0).line_height(), 40);
    }

    #[test]
    fn block_face_leaves_spaces_blank() {
        let mask = BlockFace.rasterize("a b", 20.0);
        assert_eq!(mask.width, 30);
        assert_eq!(mask.top, -14);
        // inside the first glyph
        assert_eq!(mask.at(5, 5), 1.0);
        // inside the space
        assert_eq!(mask.at(15, 5), 0.0);
        assert_eq!(mask.at(25, 5), 1.0);
    }

    #[test]
    fn whitespace_only_text_rasterises_to_blank_mask() {
        let mask = BlockFace.rasterize("   ", 20.0);
        assert!(mask.coverage.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn oversized_masks_are_not_allocated() {
        assert!(GlyphMask::with_bounds(0, -70_000, 100_000, 0).is_empty());
        assert!(GlyphMask::with_bounds(i32::MIN, i32::MIN, i32::MAX, i32::MAX).is_empty());
        assert!(BlockFace.rasterize("ab", 100_000.0).is_empty());
        assert_eq!(GlyphMask::with_bounds(0, -10, 20, 0).coverage.len(), 200);
    }

    #[test]
    fn library_falls_back_to_default_then_block() {
        let mut library = FontLibrary::load_dir("/nonexistent/fonts", "Main");
        let fallback = library.resolve("Anything");
        assert_eq!(fallback.measure("ab", 40.0), 40.0);

        struct Wide;
        impl Typeface for Wide {
            fn metrics(&self, px: f32) -> LineMetrics {
                BlockFace.metrics(px)
            }
            fn measure(&self, text: &str, px: f32) -> f32 {
                text.chars().count() as f32 * px
            }
            fn rasterize(&self, text: &str, px: f32) -> GlyphMask {
                BlockFace.rasterize(text, px)
            }
        }
        library.insert("main", Arc::new(Wide));
        assert_eq!(library.resolve("Unknown").measure("ab", 10.0), 20.0);
        assert_eq!(library.resolve("MAIN").measure("ab", 10.0), 20.0);
    }
}
