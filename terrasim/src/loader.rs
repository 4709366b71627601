//! Map image decoding.
//!
//! Two images of identical dimensions define the world: the base map
//! (land-color pixels are land, water-color pixels are water) and the
//! resource overlay (four palette colors mark ore, iron, salt and horse
//! cells wherever alpha is nonzero). A third optional spawn-zone image
//! restricts random polity founding to its magenta pixels.
//!
//! Any missing, unreadable or size-mismatched image is fatal; the
//! simulation refuses to start on a broken map.

use anyhow::{bail, Context, Result};
use image::{Rgba, RgbaImage};
use std::path::Path;
use terrasim_core::config::FoodConfig;
use terrasim_core::grid::{CellPos, ResourceKind, Terrain};

pub const LAND_COLOR: Rgba<u8> = Rgba([0, 128, 0, 255]);
pub const WATER_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const SPAWN_ZONE_COLOR: Rgba<u8> = Rgba([255, 132, 255, 255]);

// Resource overlay palette.
const ORE_COLOR: [u8; 3] = [128, 128, 128];
const IRON_COLOR: [u8; 3] = [90, 90, 110];
const SALT_COLOR: [u8; 3] = [240, 240, 240];
const HORSES_COLOR: [u8; 3] = [139, 69, 19];

#[derive(Debug)]
pub struct LoadedMap {
    pub terrain: Terrain,
    /// Cells where random founding is allowed; empty means anywhere on land.
    pub spawn_cells: Vec<CellPos>,
}

pub fn load_map(
    base_path: &Path,
    resource_path: &Path,
    spawn_path: Option<&Path>,
    food: &FoodConfig,
) -> Result<LoadedMap> {
    let base = open_rgba(base_path)?;
    let resources = open_rgba(resource_path)?;
    if base.dimensions() != resources.dimensions() {
        bail!(
            "map size mismatch: base {:?} vs resources {:?}",
            base.dimensions(),
            resources.dimensions()
        );
    }
    let spawn = match spawn_path {
        Some(path) => {
            let img = open_rgba(path)?;
            if img.dimensions() != base.dimensions() {
                bail!(
                    "map size mismatch: base {:?} vs spawn zones {:?}",
                    base.dimensions(),
                    img.dimensions()
                );
            }
            Some(img)
        }
        None => None,
    };

    let (width, height) = base.dimensions();
    let cells = (width * height) as usize;
    let mut is_land = vec![false; cells];
    let mut food_layer = vec![0.0f32; cells];
    let mut resource_layer = vec![ResourceKind::None; cells];
    let mut biome = vec![0u8; cells];
    let mut spawn_cells = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let pixel = *base.get_pixel(x, y);
            let land = rgb_matches(pixel, LAND_COLOR);
            is_land[idx] = land;
            if !land {
                continue;
            }

            // Base yield, with a coastal bonus where the sea is one step away.
            let coastal = [(1i64, 0i64), (-1, 0), (0, 1), (0, -1)].iter().any(|&(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    return true;
                }
                !rgb_matches(*base.get_pixel(nx as u32, ny as u32), LAND_COLOR)
            });
            let mut yield_value = (food.base_farming + food.base_foraging) as f32;
            if coastal {
                yield_value += food.coastal_bonus as f32;
            }
            food_layer[idx] = yield_value.max(food.riverland_food_floor as f32 * 0.5);

            // The green channel shades the biome band.
            biome[idx] = (pixel.0[1] / 32).min(8);

            let overlay = *resources.get_pixel(x, y);
            if overlay.0[3] > 0 {
                resource_layer[idx] = match overlay.0 {
                    [r, g, b, _] if [r, g, b] == ORE_COLOR || [r, g, b] == IRON_COLOR => {
                        ResourceKind::Ore
                    }
                    [r, g, b, _] if [r, g, b] == SALT_COLOR || [r, g, b] == HORSES_COLOR => {
                        ResourceKind::Food
                    }
                    _ => ResourceKind::None,
                };
            }

            if let Some(zones) = &spawn {
                if rgb_matches(*zones.get_pixel(x, y), SPAWN_ZONE_COLOR) {
                    spawn_cells.push(CellPos::new(x as i32, y as i32));
                }
            }
        }
    }

    let terrain = Terrain::new(
        width as i32,
        height as i32,
        is_land,
        food_layer,
        resource_layer,
        biome,
    );
    Ok(LoadedMap {
        terrain,
        spawn_cells,
    })
}

fn open_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path)
        .with_context(|| format!("cannot read map image '{}'", path.display()))?;
    Ok(img.to_rgba8())
}

fn rgb_matches(pixel: Rgba<u8>, reference: Rgba<u8>) -> bool {
    pixel.0[0] == reference.0[0] && pixel.0[1] == reference.0[1] && pixel.0[2] == reference.0[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_map(dir: &Path, name: &str, width: u32, height: u32, land: &[(u32, u32)]) -> std::path::PathBuf {
        let mut img = RgbaImage::from_pixel(width, height, WATER_COLOR);
        for &(x, y) in land {
            img.put_pixel(x, y, LAND_COLOR);
        }
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn land_and_water_decode_from_the_palette() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_test_map(dir.path(), "base.png", 4, 4, &[(1, 1), (2, 1)]);
        let overlay = write_test_map(dir.path(), "res.png", 4, 4, &[]);
        let map = load_map(&base, &overlay, None, &FoodConfig::default()).unwrap();
        assert!(map.terrain.is_land(CellPos::new(1, 1)));
        assert!(map.terrain.is_land(CellPos::new(2, 1)));
        assert!(!map.terrain.is_land(CellPos::new(0, 0)));
        assert!(map.terrain.food(CellPos::new(1, 1)) > 0.0);
        assert!(map.spawn_cells.is_empty());
    }

    #[test]
    fn size_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_test_map(dir.path(), "base.png", 4, 4, &[(1, 1)]);
        let overlay = write_test_map(dir.path(), "res.png", 5, 4, &[]);
        let err = load_map(&base, &overlay, None, &FoodConfig::default()).unwrap_err();
        assert!(err.to_string().contains("size mismatch"));
    }

    #[test]
    fn missing_image_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_test_map(dir.path(), "base.png", 4, 4, &[(1, 1)]);
        let err = load_map(
            &base,
            Path::new("/no/such/overlay.png"),
            None,
            &FoodConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot read map image"));
    }

    #[test]
    fn spawn_zones_collect_magenta_cells() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_test_map(dir.path(), "base.png", 4, 4, &[(1, 1), (2, 2)]);
        let overlay = write_test_map(dir.path(), "res.png", 4, 4, &[]);
        let mut zones = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        zones.put_pixel(1, 1, SPAWN_ZONE_COLOR);
        let zones_path = dir.path().join("zones.png");
        zones.save(&zones_path).unwrap();
        let map = load_map(&base, &overlay, Some(&zones_path), &FoodConfig::default()).unwrap();
        assert_eq!(map.spawn_cells, vec![CellPos::new(1, 1)]);
    }
}
