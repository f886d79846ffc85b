//! Nearest-glyph matching: brute-force L2 scan of one pixel block against
//! every glyph in the atlas.

use image::GrayImage;

use crate::atlas::{Glyph, GlyphAtlas};
use crate::error::BlockShapeError;

/// The winning glyph for one block plus its distance score.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    pub glyph: &'a Glyph,
    pub distance: f64,
}

/// Find the glyph whose bitmap is closest to `block` under the Euclidean
/// norm over corresponding pixels.
///
/// The scan runs in the atlas's enumeration order (ascending character
/// code); only a strictly smaller distance replaces the current best, so
/// ties keep the first-encountered glyph. Blocks at the right and bottom
/// frame edges may be smaller than the glyph size; those are compared
/// against the top-left sub-region of each glyph of the same extent.
pub fn match_block<'a>(
    block: &GrayImage,
    atlas: &'a GlyphAtlas,
) -> Result<MatchResult<'a>, BlockShapeError> {
    let (bw, bh) = block.dimensions();
    if bw > atlas.glyph_width() || bh > atlas.glyph_height() || bw == 0 || bh == 0 {
        return Err(BlockShapeError {
            block_w: bw,
            block_h: bh,
            glyph_w: atlas.glyph_width(),
            glyph_h: atlas.glyph_height(),
        });
    }

    let mut best: Option<MatchResult<'a>> = None;
    for glyph in atlas.iter() {
        let distance = block_distance(block, &glyph.bitmap);
        let better = match best {
            Some(ref b) => distance < b.distance,
            None => true,
        };
        if better {
            best = Some(MatchResult { glyph, distance });
        }
    }

    // The atlas is non-empty by construction.
    Ok(best.expect("atlas invariant: at least one glyph"))
}

/// L2 norm between `block` and the equally-sized top-left sub-region of
/// `glyph`. Sums squared differences and takes one square root at the end.
fn block_distance(block: &GrayImage, glyph: &GrayImage) -> f64 {
    let (bw, bh) = block.dimensions();
    let mut sum_sq = 0.0f64;
    for y in 0..bh {
        for x in 0..bw {
            let b = block.get_pixel(x, y)[0] as f64;
            let g = glyph.get_pixel(x, y)[0] as f64;
            let d = b - g;
            sum_sq += d * d;
        }
    }
    sum_sq.sqrt()
}
