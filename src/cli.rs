// ============================================================================
// TileFE CLI — headless map rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   tilefe --map tilemap.json --sheet tileset.png --output flat.png
//   tilefe -m dungeon.json -s dungeon_tiles.png -o dungeon.png --tile-size 32
//
// No GUI is opened in CLI mode. The map metadata and sheet are loaded, every
// cell is re-decoded from the sheet, and the composited content layer is
// written as a PNG.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{Capability, TileCanvasBuilder};
use crate::grid::TileGrid;
use crate::io::{self, MapError};

/// TileFE headless map renderer.
///
/// Render a saved tile map (JSON + source sheet) to a flat PNG without
/// opening the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "tilefe",
    about = "TileFE headless tile-map renderer",
    long_about = "Re-decode a saved tile map from its metadata JSON and source sheet,\n\
                  then write the composited content layer as a PNG.\n\n\
                  Example:\n  \
                  tilefe --map tilemap.json --sheet tileset.png --output flat.png"
)]
pub struct CliArgs {
    /// Map metadata JSON (the `tileHash` / `tileMapSize` file).
    #[arg(short, long, value_name = "MAP.json")]
    pub map: PathBuf,

    /// Source sheet image the map's cells re-decode from.
    #[arg(short, long, value_name = "SHEET.png")]
    pub sheet: PathBuf,

    /// Output PNG path.
    #[arg(short, long, value_name = "OUT.png")]
    pub output: PathBuf,

    /// Tile pixel size used when the map was painted.
    #[arg(long, default_value_t = 16, value_name = "PX")]
    pub tile_size: u32,
}

impl CliArgs {
    /// CLI mode is entered whenever a map argument is present; otherwise the
    /// GUI starts.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--map" || a == "-m")
    }
}

pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match render_map(&args) {
        Ok(cells) => {
            println!(
                "{} → {} ({} cells, {} ms)",
                args.map.display(),
                args.output.display(),
                cells,
                start.elapsed().as_millis()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load, import, composite, and write. Returns the number of painted cells.
fn render_map(args: &CliArgs) -> Result<usize, MapError> {
    if args.tile_size == 0 {
        return Err(MapError::InvalidFormat("--tile-size must be non-zero".into()));
    }

    let meta = io::load_map_meta(&args.map)?;
    let sheet = io::load_image(&args.sheet)?;

    let mut grid = TileGrid::new((args.tile_size, args.tile_size));
    io::import(&mut grid, &meta, &sheet)?;

    // Headless mode has no GUI canvas; composite through a bare Tileable one
    // at the map's logical size.
    let mut canvas = TileCanvasBuilder::new()
        .size(
            meta.tile_map_size.width.max(1) as f32,
            meta.tile_map_size.height.max(1) as f32,
        )
        .capability(Capability::Tileable)
        .build()
        .map_err(|e| MapError::InvalidFormat(e.to_string()))?;
    if let Some(target) = canvas.grid_mut() {
        *target = grid;
    }

    io::save_map_image(&canvas.render_content(), &args.output)?;
    Ok(meta.tile_hash.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MapSize, TileMapFile};
    use crate::point::Point;
    use crate::tile::TileMeta;
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;

    fn args(dir: &std::path::Path) -> CliArgs {
        CliArgs {
            map: dir.join("map.json"),
            sheet: dir.join("sheet.png"),
            output: dir.join("out.png"),
            tile_size: 16,
        }
    }

    #[test]
    fn headless_render_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path());

        // One red tile at cell (1, 0) of a 32×32 map.
        let sheet = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        sheet.save(&args.sheet).unwrap();
        let mut tile_hash = HashMap::new();
        tile_hash.insert(
            "0|1".to_string(),
            TileMeta { source_src: "sheet.png".into(), source_coords: Point::new(0, 0) },
        );
        let meta = TileMapFile { tile_hash, tile_map_size: MapSize { width: 32, height: 32 } };
        io::save_map_meta(&meta, &args.map).unwrap();

        assert_eq!(render_map(&args).unwrap(), 1);

        let out = io::load_image(&args.output).unwrap();
        assert_eq!(out.dimensions(), (32, 32));
        assert_eq!(*out.get_pixel(20, 5), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(5, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn missing_inputs_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path());
        assert!(matches!(render_map(&args), Err(MapError::Io(_))));
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.tile_size = 0;
        assert!(matches!(render_map(&args), Err(MapError::InvalidFormat(_))));
    }
}
