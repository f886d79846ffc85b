//! Glyph rasterization: render a character set from a TTF/OTF font into
//! fixed-size grayscale bitmaps and build an atlas from them.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale};
use image::{GrayImage, Luma};

use crate::atlas::{Glyph, GlyphAtlas};
use crate::error::{AtlasError, FontError};

/// The default character set offered for matching.
pub const DEFAULT_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789.,!?-()[]{}<>:;'\"/\\@#$%^&*~`+=_|";

/// Distinct charset characters in ascending code-point order.
pub fn charset_chars(charset: &str) -> Vec<char> {
    let set: BTreeSet<char> = charset.chars().collect();
    set.into_iter().collect()
}

/// Render every distinct charset character to a `block_size`-square bitmap
/// (white background, black centered glyph) and build an atlas.
pub fn render_atlas(
    font_path: &Path,
    charset: &str,
    block_size: u32,
) -> Result<GlyphAtlas, FontError> {
    let data = fs::read(font_path).map_err(|e| FontError::Read {
        path: font_path.to_path_buf(),
        source: e,
    })?;
    let font = FontVec::try_from_vec(data).map_err(|_| FontError::Parse {
        path: font_path.to_path_buf(),
    })?;

    let mut glyphs = Vec::new();
    for ch in charset_chars(charset) {
        glyphs.push(Glyph {
            ch,
            bitmap: render_glyph(&font, ch, block_size),
        });
    }

    if glyphs.is_empty() {
        return Err(AtlasError::Empty(font_path.to_path_buf()).into());
    }
    Ok(GlyphAtlas::from_glyphs(glyphs)?)
}

/// Rasterize one character: black ink on a white square, with the outline
/// bounding box centered. Characters with no outline (e.g. space) come out
/// as a blank white bitmap.
fn render_glyph(font: &FontVec, ch: char, block_size: u32) -> GrayImage {
    let mut bitmap = GrayImage::from_pixel(block_size, block_size, Luma([255]));
    let scale = PxScale::from(block_size as f32);
    let glyph = font
        .glyph_id(ch)
        .with_scale_and_position(scale, ab_glyph::point(0.0, 0.0));

    if let Some(outlined) = font.outline_glyph(glyph) {
        let bounds = outlined.px_bounds();
        let off_x = ((block_size as f32 - bounds.width()) / 2.0).round() as i32;
        let off_y = ((block_size as f32 - bounds.height()) / 2.0).round() as i32;

        outlined.draw(|x, y, coverage| {
            let px = x as i32 + off_x;
            let py = y as i32 + off_y;
            if px >= 0 && py >= 0 && (px as u32) < block_size && (py as u32) < block_size {
                let ink = 255 - (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                let current = bitmap.get_pixel(px as u32, py as u32)[0];
                bitmap.put_pixel(px as u32, py as u32, Luma([current.min(ink)]));
            }
        });
    }
    bitmap
}

/// Write an atlas back out as code-point-named PNGs (`65.png` for 'A'),
/// the same layout `GlyphAtlas::load_dir` consumes.
pub fn export_glyph_dir(atlas: &GlyphAtlas, dir: &Path) -> Result<(), AtlasError> {
    fs::create_dir_all(dir).map_err(|e| AtlasError::UnreadableGlyph {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    for glyph in atlas.iter() {
        let path = dir.join(format!("{}.png", glyph.ch as u32));
        glyph
            .bitmap
            .save(&path)
            .map_err(|e| AtlasError::UnreadableGlyph { path, reason: e.to_string() })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn charset_is_deduplicated_and_sorted() {
        let chars = charset_chars("cba<a<");
        assert_eq!(chars, vec!['<', 'a', 'b', 'c']);
    }

    #[test]
    fn default_charset_is_ascii() {
        assert!(DEFAULT_CHARSET.is_ascii());
        assert!(!charset_chars(DEFAULT_CHARSET).is_empty());
    }

    #[test]
    fn export_round_trips_through_load_dir() {
        let atlas = GlyphAtlas::from_glyphs(vec![
            Glyph { ch: 'A', bitmap: GrayImage::from_pixel(4, 4, Luma([0])) },
            Glyph { ch: 'B', bitmap: GrayImage::from_pixel(4, 4, Luma([255])) },
        ])
        .unwrap();

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir: PathBuf = std::env::temp_dir().join(format!(
            "mosascii_font_export_{}_{}",
            std::process::id(),
            stamp
        ));

        export_glyph_dir(&atlas, &dir).unwrap();
        let reloaded = GlyphAtlas::load_dir(&dir).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get('A').unwrap().bitmap.as_raw(),
            atlas.get('A').unwrap().bitmap.as_raw()
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
