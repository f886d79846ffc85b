//! Per-frame transcoding: partition a frame into glyph-sized blocks, match
//! each block against the atlas, and assemble the reconstructed raster plus
//! the character grid.

use image::imageops;
use image::GrayImage;

use crate::atlas::GlyphAtlas;
use crate::error::BlockShapeError;
use crate::matcher::match_block;

/// Transcode one frame against an atlas.
///
/// The frame is partitioned row-major (top-to-bottom, left-to-right) into
/// blocks of the atlas glyph size; the last row and column may be partial
/// when the frame dimensions are not multiples of it. Returns the
/// reconstructed raster (same dimensions as the input frame) and the
/// character grid, one `String` per block row.
///
/// This is a pure function of its inputs: identical frame and atlas always
/// produce byte-identical outputs, whatever the surrounding parallelism.
pub fn transcode_frame(
    frame: &GrayImage,
    atlas: &GlyphAtlas,
) -> Result<(GrayImage, Vec<String>), BlockShapeError> {
    let (width, height) = frame.dimensions();
    let block_w = atlas.glyph_width();
    let block_h = atlas.glyph_height();

    let rows = height.div_ceil(block_h);
    let cols = width.div_ceil(block_w);

    let mut raster = GrayImage::new(width, height);
    let mut grid = Vec::with_capacity(rows as usize);

    for row in 0..rows {
        let y = row * block_h;
        let bh = block_h.min(height - y);
        let mut row_chars = String::with_capacity(cols as usize);

        for col in 0..cols {
            let x = col * block_w;
            let bw = block_w.min(width - x);

            let block = imageops::crop_imm(frame, x, y, bw, bh).to_image();
            let result = match_block(&block, atlas)?;

            for by in 0..bh {
                for bx in 0..bw {
                    raster.put_pixel(x + bx, y + by, *result.glyph.bitmap.get_pixel(bx, by));
                }
            }
            row_chars.push(result.glyph.ch);
        }
        grid.push(row_chars);
    }

    Ok((raster, grid))
}

/// Serialize a character grid: one row per line, no separators within a
/// row, each row terminated by a newline, no trailing metadata.
pub fn grid_to_text(grid: &[String]) -> String {
    let mut out = String::with_capacity(grid.iter().map(|r| r.len() + 1).sum());
    for row in grid {
        out.push_str(row);
        out.push('\n');
    }
    out
}
