// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use anyhow::{anyhow, Context};
use glob::glob;
use relief_lib as relief;
use relief::camera::{CameraFrame, DEFAULT_PADDING};
use relief::compose::{compose, ReliefParams};
use relief::face::{face_placement, FaceCode};
use relief::field::{build_fields, FieldConfig};
use relief::fit::{DesignTarget, DEFAULT_MARGIN};
use relief::interop::ToImage;
use relief::mesh::{load_stl, Orientation};
use relief::relief::{heightfield_mesh, relief_on_plane};
use log::LevelFilter;
use std::path::{Path, PathBuf};

// Default values for some of the program arguments.
const DEFAULT_OUT_DIR: &str = "out";
const DEFAULT_WIDTH_MM: f64 = 100.0;
const DEFAULT_HEIGHT_MM: f64 = 120.0;
const DEFAULT_DEPTH_MM: f64 = 2.0;
const DEFAULT_BOOST: f64 = 1.0;
const DEFAULT_STRIDE: usize = 2;
const DEFAULT_VERBOSITY: u32 = 2;

/// Entry point of the program.
fn main() {
    parse_args()
        .and_then(run)
        .unwrap_or_else(|err| eprintln!("Error: {:?}", err));
}

fn display_help() {
    eprintln!(
        r#"
relief

Photo bas-relief preview: fields, placement and camera framing.

USAGE:
    relief [FLAGS...] --mesh object.stl IMAGE_FILES...
    For example:
        relief --mesh urn.stl --face +z --depth-mm 2.5 photos/*.jpg

FLAGS:
    --help                 # Print this message and exit
    --version              # Print version and exit
    --mesh file.stl        # Object to decorate (binary or ASCII STL)
    --face code            # Face receiving the relief: +x -x +y -y +z -z (default: +z)
    --width-mm float       # Design width in mm (default: {})
    --height-mm float      # Design height in mm (default: {})
    --depth-mm float       # Relief depth in mm (default: {})
    --boost float          # Depth multiplier (default: {})
    --invert               # Carve the relief instead of raising it
    --scale float          # Extra uniform scale after the automatic fit (default: 1)
    --margin float         # Free margin around the design, in object units (default: {})
    --padding float        # Camera distance over object diagonal (default: {})
    --rotate x,y,z         # Mesh rotation in degrees, applied before mirroring
    --mirror axes          # Mesh axes to mirror, for example "x" or "yz"
    --stride int           # Sample one texel every stride for the STL grids (default: {})
    --out-dir dir/         # Output directory (default: {})
    --verbosity int        # 0: errors only ... 4: trace (default: {})
"#,
        DEFAULT_WIDTH_MM,
        DEFAULT_HEIGHT_MM,
        DEFAULT_DEPTH_MM,
        DEFAULT_BOOST,
        DEFAULT_MARGIN,
        DEFAULT_PADDING,
        DEFAULT_STRIDE,
        DEFAULT_OUT_DIR,
        DEFAULT_VERBOSITY,
    )
}

#[derive(Debug)]
/// Type holding command line arguments.
struct Args {
    mesh_path: PathBuf,
    orientation: Orientation,
    face: FaceCode,
    target: DesignTarget,
    params: ReliefParams,
    margin: f64,
    padding: f64,
    stride: usize,
    out_dir: String,
    images_paths: Vec<PathBuf>,
}

/// Function parsing the command line arguments and returning an Args object or an error.
fn parse_args() -> anyhow::Result<Args> {
    let mut args = pico_args::Arguments::from_env();

    // Retrieve command line arguments.
    let help = args.contains(["-h", "--help"]);
    let version = args.contains(["-v", "--version"]);

    // Check if the --help or --version flags are present.
    if help {
        display_help();
        std::process::exit(0);
    } else if version {
        println!("{}", std::env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    // Mandatory arguments.
    let mesh_path: PathBuf = args.value_from_str("--mesh")?;

    // Optional arguments.
    let verbosity = args
        .opt_value_from_str("--verbosity")?
        .unwrap_or(DEFAULT_VERBOSITY);
    env_logger::Builder::new()
        .filter_level(verbosity_filter(verbosity))
        .format_timestamp(None)
        .try_init()?;

    let target = DesignTarget {
        width_mm: args
            .opt_value_from_str("--width-mm")?
            .unwrap_or(DEFAULT_WIDTH_MM),
        height_mm: args
            .opt_value_from_str("--height-mm")?
            .unwrap_or(DEFAULT_HEIGHT_MM),
        ..DesignTarget::default()
    };
    let face = args
        .opt_value_from_str("--face")?
        .unwrap_or(target.default_face);
    let params = ReliefParams {
        depth_mm: args
            .opt_value_from_str("--depth-mm")?
            .unwrap_or(DEFAULT_DEPTH_MM),
        boost: args.opt_value_from_str("--boost")?.unwrap_or(DEFAULT_BOOST),
        invert: args.contains("--invert"),
        scale: args.opt_value_from_str("--scale")?.unwrap_or(1.0),
        ..ReliefParams::default()
    };
    let orientation = Orientation {
        rotation_deg: args
            .opt_value_from_fn("--rotate", parse_rotation)?
            .unwrap_or([0.0; 3]),
        mirror: args
            .opt_value_from_fn("--mirror", parse_mirror)?
            .unwrap_or([false; 3]),
    };
    let margin = args.opt_value_from_str("--margin")?.unwrap_or(DEFAULT_MARGIN);
    let padding = args
        .opt_value_from_str("--padding")?
        .unwrap_or(DEFAULT_PADDING);
    let stride = args.opt_value_from_str("--stride")?.unwrap_or(DEFAULT_STRIDE);
    let out_dir = args
        .opt_value_from_str("--out-dir")?
        .unwrap_or_else(|| DEFAULT_OUT_DIR.into());

    // Verify that images paths are correct.
    let free_args = args.free()?;
    let images_paths = absolute_file_paths(&free_args)?;
    if images_paths.is_empty() {
        return Err(anyhow!(
            "There is no such image. Use --help to know how to use this tool."
        ));
    }

    // Return Args struct.
    Ok(Args {
        mesh_path,
        orientation,
        face,
        target,
        params,
        margin,
        padding,
        stride,
        out_dir,
        images_paths,
    })
}

/// Map the --verbosity level to a log filter, 4 and above meaning trace.
fn verbosity_filter(verbosity: u32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Parse "x,y,z" rotation angles in degrees.
fn parse_rotation(s: &str) -> anyhow::Result<[f64; 3]> {
    let parts: Vec<_> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(anyhow!(
            "--rotate argument must be of the shape x,y,z with no space between elements"
        ));
    }
    Ok([parts[0].parse()?, parts[1].parse()?, parts[2].parse()?])
}

/// Parse the set of axes to mirror, like "xz".
fn parse_mirror(s: &str) -> anyhow::Result<[bool; 3]> {
    let mut mirror = [false; 3];
    for c in s.chars() {
        match c.to_ascii_lowercase() {
            'x' => mirror[0] = true,
            'y' => mirror[1] = true,
            'z' => mirror[2] = true,
            other => return Err(anyhow!("Unknown mirror axis: {}", other)),
        }
    }
    Ok(mirror)
}

/// Retrieve the absolute paths of all files matching the arguments.
fn absolute_file_paths(args: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut abs_paths = Vec::new();
    for path_glob in args {
        let mut paths = paths_from_glob(path_glob)?;
        abs_paths.append(&mut paths);
    }
    abs_paths
        .iter()
        .map(|p| p.canonicalize().map_err(|e| e.into()))
        .collect()
}

/// Retrieve the paths of files matchin the glob pattern.
fn paths_from_glob(p: &str) -> anyhow::Result<Vec<PathBuf>> {
    let paths = glob(p)?;
    Ok(paths.into_iter().filter_map(|x| x.ok()).collect())
}

/// Start actual program with command line arguments successfully parsed.
fn run(args: Args) -> anyhow::Result<()> {
    // Get the path of output directory.
    let out_dir_path = PathBuf::from(&args.out_dir);
    std::fs::create_dir_all(&out_dir_path)?;

    // Load the mesh and plan the placement once, it does not depend on the images.
    let mesh = load_stl(&args.mesh_path, &args.orientation)?;
    let placement = face_placement(&mesh.bbox, args.face);
    let fit = args.target.plan_on(&mesh.bbox, args.face, args.margin);
    log::info!(
        "Face {} is {:.4} x {:.4}, design fits at scale {:.3}{}",
        args.face,
        placement.face_width,
        placement.face_height,
        fit.scale,
        if fit.rotate_by_90 { " rotated by 90°" } else { "" }
    );
    if fit.is_empty() {
        log::warn!("No room for the design on face {}", args.face);
    }
    let camera = CameraFrame::framing(&mesh.bbox, args.padding);
    log::info!(
        "Camera at {:?} looking at {:?}, clip [{:.4}, {:.1}], orbit [{:.4}, {:.4}]",
        camera.position.coords.as_slice(),
        camera.target.coords.as_slice(),
        camera.near,
        camera.far,
        camera.min_distance,
        camera.max_distance
    );

    let config = FieldConfig::default();
    let pb = indicatif::ProgressBar::new(args.images_paths.len() as u64);
    for path in args.images_paths.iter() {
        let img = image::open(path).with_context(|| format!("Failed to load {:?}", path))?;
        let fields = build_fields(&img, &config)?;
        let plane = compose(
            &placement,
            &fit,
            &args.target,
            &args.params,
            (fields.width(), fields.height()),
        );
        if plane.overflows(&placement, args.margin) {
            log::warn!("The scaled design spills out of face {}", args.face);
        }
        log::info!(
            "Plane {:.4} x {:.4} at {:?}",
            plane.width,
            plane.height,
            plane.position.coords.as_slice()
        );

        let image_dir = out_dir_path.join(image_stem(path));
        std::fs::create_dir_all(&image_dir)?;
        fields
            .displacement_gray()
            .to_image()
            .save(image_dir.join("displacement.png"))?;
        fields
            .normal_rgb()
            .to_image()
            .save(image_dir.join("normals.png"))?;

        // Millimeter sheet of the relief alone, and the same relief placed on the object.
        let depth_mm = plane.displacement_scale * 1000.0;
        heightfield_mesh(
            &fields.displacement,
            args.target.width_mm,
            args.target.height_mm,
            depth_mm,
            args.stride,
        )
        .save_stl(image_dir.join("relief_only.stl"))?;
        relief_on_plane(&fields.displacement, &plane, args.stride)
            .save_stl(image_dir.join("relief_placed.stl"))?;
        pb.inc(1);
    }
    pb.finish();
    Ok(())
}

fn image_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string()
}
