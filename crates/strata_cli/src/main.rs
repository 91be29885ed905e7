// Renders the glyph tutorial scene to a JSON snapshot.
// Run with: cargo run --release --bin strata_glyphs -- [output_dir] [--binary] [--shape cone]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use strata_core::{DataType, Device, JsonFileBackend, LogSink, ObjectKind, OutputSettings, ParamValue, WaitMode};

const POSITIONS: [f32; 12] = [-1.0, -1.0, 3.0, -1.0, 1.0, 3.0, 1.0, -1.0, 3.0, 0.1, 0.1, 0.3];
const COLORS: [f32; 16] = [
    0.9, 0.5, 0.5, 1.0, //
    0.8, 0.8, 0.8, 1.0, //
    0.8, 0.8, 0.8, 1.0, //
    0.5, 0.9, 0.5, 1.0,
];
const ORIENTATIONS: [f32; 16] = [
    0.0, 0.0, 0.0, 1.0, //
    0.0, 0.707031, 0.0, 0.707031, //
    -0.707031, 0.00282288, 0.0, 0.707031, //
    0.96582, 0.00946808, 0.0, 0.258789,
];
const SCALES: [f32; 4] = [2.0, 0.5, 0.3, 1.0];
const INDEX: [u32; 4] = [0, 1, 2, 3];

struct Args {
    output: PathBuf,
    binary: bool,
    shape: String,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        output: PathBuf::from("strata_out"),
        binary: false,
        shape: "cone".to_string(),
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--binary" => args.binary = true,
            "--shape" => args.shape = iter.next().context("--shape needs a value")?,
            "-h" | "--help" => {
                println!("Usage: strata_glyphs [output_dir] [--binary] [--shape sphere|cone|cylinder]");
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => args.output = PathBuf::from(other),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args()?;
    log::info!("Writing glyph scene to {}", args.output.display());

    let backend = Arc::new(JsonFileBackend::new());
    let mut device = Device::new(backend.clone(), Arc::new(LogSink))?;
    device.set_device_param("usd::serialize.location", args.output.to_string_lossy().into_owned())?;
    device.set_device_param("usd::serialize.outputBinary", args.binary)?;
    device.set_device_param("usd::output.previewSurfaceShader", true)?;
    device.commit_device()?;

    let camera = device.new_camera("perspective")?;
    device.set_param(camera, "aspect", 1024.0f32 / 768.0)?;
    device.set_param(camera, "position", [0.0f32, 0.0, -100.0])?;
    device.set_param(camera, "direction", [0.1f32, 0.0, 1.0])?;
    device.set_param(camera, "up", [0.0f32, 1.0, 0.0])?;
    device.commit(camera)?;

    let geometry = device.new_geometry("glyph")?;
    let arrays = [
        ("vertex.position", device.new_array1d(DataType::Float32Vec3, 4, &POSITIONS[..])?),
        ("vertex.color", device.new_array1d(DataType::Float32Vec4, 4, &COLORS[..])?),
        ("vertex.orientation", device.new_array1d(DataType::Float32QuatIjkw, 4, &ORIENTATIONS[..])?),
        ("vertex.scale", device.new_array1d(DataType::Float32, 4, &SCALES[..])?),
        ("primitive.index", device.new_array1d(DataType::UInt32, 4, &INDEX[..])?),
    ];
    for (name, array) in arrays {
        device.set_param(geometry, name, array)?;
        device.release_array(array)?;
    }
    device.set_param(geometry, "shapeType", args.shape.as_str())?;
    device
        .commit(geometry)
        .with_context(|| format!("glyph geometry with shape '{}'", args.shape))?;

    let material = device.new_material("matte")?;
    device.set_param(material, "color", [0.8f32, 0.8, 0.8])?;
    device.commit(material)?;

    let surface = device.new_surface()?;
    device.set_param(surface, "geometry", ParamValue::geometry(geometry))?;
    device.set_param(surface, "material", ParamValue::material(material))?;
    device.commit(surface)?;

    let light = device.new_light("directional")?;
    device.set_param(light, "direction", [0.0f32, 0.0, 1.0])?;
    device.commit(light)?;

    let world = device.new_world()?;
    let surfaces = device.new_array1d(DataType::Object(ObjectKind::Surface), 1, vec![surface])?;
    let lights = device.new_array1d(DataType::Object(ObjectKind::Light), 1, vec![light])?;
    device.set_param(world, "surface", surfaces)?;
    device.set_param(world, "light", lights)?;
    device.release_array(surfaces)?;
    device.release_array(lights)?;
    device.commit(world)?;

    let frame = device.new_frame()?;
    device.set_param(frame, "name", "glyphs")?;
    device.set_param(frame, "world", ParamValue::world(world))?;
    device.set_param(frame, "camera", ParamValue::camera(camera))?;
    device.set_param(frame, "size", [1024u32, 768])?;
    device.set_param(frame, "channel.color", DataType::UFixed8Vec4)?;
    device.commit(frame)?;

    device.render_frame(frame)?;
    device.frame_ready(frame, WaitMode::Wait)?;

    let path = backend.output_path(&OutputSettings::from(device.settings()), "glyphs")?;
    println!("{}", path.display());
    Ok(())
}
