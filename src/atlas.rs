//! Glyph atlas: the immutable character-to-bitmap lookup shared by all
//! workers for the lifetime of a transcode run.

use std::fs;
use std::path::Path;

use image::GrayImage;

use crate::error::AtlasError;

/// One matching candidate: a character and its fixed-size grayscale bitmap.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub ch: char,
    pub bitmap: GrayImage,
}

/// The complete glyph set for one font and block size.
///
/// Built once before any frame processing starts and never mutated after
/// construction, so it is shared across workers by plain reference. Glyphs
/// are kept sorted by character code, which makes enumeration order (and
/// therefore the matcher's first-wins tie-break) reproducible across runs
/// and worker counts.
#[derive(Debug, Clone)]
pub struct GlyphAtlas {
    glyphs: Vec<Glyph>,
    glyph_w: u32,
    glyph_h: u32,
}

impl GlyphAtlas {
    /// Build an atlas from an in-memory glyph collection.
    ///
    /// Fails if the collection is empty or if any two bitmaps differ in
    /// width or height.
    pub fn from_glyphs(mut glyphs: Vec<Glyph>) -> Result<Self, AtlasError> {
        let first = glyphs
            .first()
            .ok_or_else(|| AtlasError::Empty(Path::new("<memory>").to_path_buf()))?;
        let (glyph_w, glyph_h) = first.bitmap.dimensions();

        for glyph in &glyphs {
            let (w, h) = glyph.bitmap.dimensions();
            if (w, h) != (glyph_w, glyph_h) {
                return Err(AtlasError::InconsistentDimensions {
                    ch: glyph.ch,
                    expected_w: glyph_w,
                    expected_h: glyph_h,
                    found_w: w,
                    found_h: h,
                });
            }
        }

        glyphs.sort_by_key(|g| g.ch);
        Ok(Self { glyphs, glyph_w, glyph_h })
    }

    /// Load an atlas from a directory of PNG files whose stem is the decimal
    /// code point of the glyph's character (`65.png` -> 'A').
    ///
    /// Entries that are not PNGs are ignored; PNG entries that are empty,
    /// undecodable, or not named by a valid code point are a hard error so
    /// that a broken glyph set is never silently narrowed.
    pub fn load_dir(dir: &Path) -> Result<Self, AtlasError> {
        let entries = fs::read_dir(dir).map_err(|e| AtlasError::UnreadableGlyph {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut glyphs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AtlasError::UnreadableGlyph {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if !path.extension().map(|e| e == "png").unwrap_or(false) {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            let ch = stem
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| AtlasError::UnreadableGlyph {
                    path: path.clone(),
                    reason: format!("file stem '{}' is not a valid code point", stem),
                })?;

            let meta = fs::metadata(&path).map_err(|e| AtlasError::UnreadableGlyph {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            if meta.len() == 0 {
                return Err(AtlasError::UnreadableGlyph {
                    path,
                    reason: "zero-byte file".to_string(),
                });
            }

            let bitmap = image::open(&path)
                .map_err(|e| AtlasError::UnreadableGlyph {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
                .to_luma8();
            glyphs.push(Glyph { ch, bitmap });
        }

        if glyphs.is_empty() {
            return Err(AtlasError::Empty(dir.to_path_buf()));
        }
        Self::from_glyphs(glyphs)
    }

    pub fn glyph_width(&self) -> u32 {
        self.glyph_w
    }

    pub fn glyph_height(&self) -> u32 {
        self.glyph_h
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Glyphs in ascending character-code order.
    pub fn iter(&self) -> impl Iterator<Item = &Glyph> {
        self.glyphs.iter()
    }

    pub fn get(&self, ch: char) -> Option<&Glyph> {
        self.glyphs
            .binary_search_by_key(&ch, |g| g.ch)
            .ok()
            .map(|i| &self.glyphs[i])
    }
}
