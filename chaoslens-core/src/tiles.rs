use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// One tile of a larger render, in bottom-up render space.
///
/// `(x, y)` is also the `tile_offset` the shader adds to its fragment coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    pub tx: u32,
    pub ty: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn offset(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// RGBA bytes read back for this tile.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }

    /// First output-image row (top-down) covered by this tile.
    pub fn image_top_row(&self, image_height: u32) -> u32 {
        image_height - (self.y + self.height)
    }
}

/// Row-major tiling of a `width x height` image by square tiles of `tile_size`.
///
/// Only the last column and row can be smaller than `tile_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles_x: u32,
    tiles_y: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidDimensions {
                width: width as u64,
                height: height as u64,
            });
        }
        if tile_size == 0 {
            return Err(CaptureError::ZeroTileSize);
        }
        Ok(Self {
            width,
            height,
            tile_size,
            tiles_x: width.div_ceil(tile_size),
            tiles_y: height.div_ceil(tile_size),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn len(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile at grid position `(tx, ty)`; `ty = 0` is the bottom row of the image.
    pub fn tile(&self, tx: u32, ty: u32) -> Option<TileRect> {
        if tx >= self.tiles_x || ty >= self.tiles_y {
            return None;
        }
        let x = tx * self.tile_size;
        let y = ty * self.tile_size;
        Some(TileRect {
            tx,
            ty,
            x,
            y,
            width: self.tile_size.min(self.width - x),
            height: self.tile_size.min(self.height - y),
        })
    }

    /// Tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileRect> + '_ {
        (0..self.tiles_y)
            .flat_map(move |ty| (0..self.tiles_x).filter_map(move |tx| self.tile(tx, ty)))
    }
}

/// Copy a tile's bottom-up readback into a top-down RGBA image.
///
/// Source row `r` lands on image row `height - 1 - (tile.y + r)`.
pub fn composite_tile_flipped(
    image: &mut [u8],
    image_width: u32,
    image_height: u32,
    tile: &TileRect,
    pixels: &[u8],
) {
    let row_bytes = tile.width as usize * 4;
    let image_stride = image_width as usize * 4;
    let column = tile.x as usize * 4;

    for (row, src) in pixels.chunks_exact(row_bytes).take(tile.height as usize).enumerate() {
        let dest_row = (image_height - 1 - (tile.y + row as u32)) as usize;
        let start = dest_row * image_stride + column;
        image[start..start + row_bytes].copy_from_slice(src);
    }
}

/// Bytes of the `row`-th tile row counted from the tile's top edge in the output image.
pub fn extract_tile_row<'a>(
    image: &'a [u8],
    image_width: u32,
    image_height: u32,
    tile: &TileRect,
    row: u32,
) -> &'a [u8] {
    let image_row = (tile.image_top_row(image_height) + row) as usize;
    let start = image_row * image_width as usize * 4 + tile.x as usize * 4;
    &image[start..start + tile.width as usize * 4]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_thousand_square_uses_three_by_three_tiles() {
        let grid = TileGrid::new(5000, 5000, 2048).unwrap();
        assert_eq!(grid.tiles_x(), 3);
        assert_eq!(grid.tiles_y(), 3);
        let widths: Vec<u32> = (0..3).map(|tx| grid.tile(tx, 0).unwrap().width).collect();
        assert_eq!(widths, vec![2048, 2048, 904]);
        let corner = grid.tile(2, 2).unwrap();
        assert_eq!((corner.width, corner.height), (904, 904));
        assert_eq!(corner.offset(), (4096, 4096));
    }

    #[test]
    fn tiles_partition_the_image() {
        for &(w, h, t) in &[(1, 1, 1), (7, 3, 2), (64, 64, 64), (100, 37, 16), (257, 513, 128)] {
            let grid = TileGrid::new(w, h, t).unwrap();
            let mut hits = vec![0u8; (w * h) as usize];
            for tile in grid.iter() {
                assert!(tile.width <= t && tile.height <= t);
                for y in tile.y..tile.y + tile.height {
                    for x in tile.x..tile.x + tile.width {
                        hits[(y * w + x) as usize] += 1;
                    }
                }
            }
            assert!(hits.iter().all(|&n| n == 1), "{w}x{h} tile {t}");
            let total: u64 = grid.iter().map(|t| t.area()).sum();
            assert_eq!(total, w as u64 * h as u64);
        }
    }

    #[test]
    fn iteration_is_row_major() {
        let grid = TileGrid::new(30, 20, 10).unwrap();
        let order: Vec<(u32, u32)> = grid.iter().map(|t| (t.tx, t.ty)).collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(matches!(TileGrid::new(0, 10, 4), Err(CaptureError::InvalidDimensions { .. })));
        assert!(matches!(TileGrid::new(10, 0, 4), Err(CaptureError::InvalidDimensions { .. })));
        assert!(matches!(TileGrid::new(10, 10, 0), Err(CaptureError::ZeroTileSize)));
    }

    #[test]
    fn tile_outside_grid_is_none() {
        let grid = TileGrid::new(10, 10, 4).unwrap();
        assert!(grid.tile(3, 0).is_none());
        assert!(grid.tile(0, 3).is_none());
    }

    #[test]
    fn flip_is_self_consistent() {
        let (w, h) = (7u32, 5u32);
        let grid = TileGrid::new(w, h, 3).unwrap();
        let mut image = vec![0u8; (w * h * 4) as usize];
        let mut readbacks = Vec::new();

        for tile in grid.iter() {
            let pixels: Vec<u8> = (0..tile.byte_len())
                .map(|i| (i as u32 * 7 + tile.tx * 31 + tile.ty * 17) as u8)
                .collect();
            composite_tile_flipped(&mut image, w, h, &tile, &pixels);
            readbacks.push((tile, pixels));
        }

        for (tile, pixels) in &readbacks {
            let row_bytes = tile.width as usize * 4;
            for r in 0..tile.height {
                let source_row = (tile.height - 1 - r) as usize;
                let expected = &pixels[source_row * row_bytes..(source_row + 1) * row_bytes];
                assert_eq!(extract_tile_row(&image, w, h, tile, r), expected);
            }
        }
    }

    #[test]
    fn bottom_tile_row_zero_lands_on_last_image_row() {
        let grid = TileGrid::new(2, 2, 2).unwrap();
        let tile = grid.tile(0, 0).unwrap();
        let pixels = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
        let mut image = vec![0u8; 16];
        composite_tile_flipped(&mut image, 2, 2, &tile, &pixels);
        assert_eq!(&image[8..16], &pixels[0..8]);
        assert_eq!(&image[0..8], &pixels[8..16]);
    }
}
