use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use glam::{IVec3, Vec3};
use tracing::{debug, info, warn};

use squall_shared::block::{register_default_blocks, BlockId};
use squall_shared::coords::{ChunkPos, CHUNK_SIZE};
use squall_shared::worldgen::WorldGenerator;

use crate::camera::Camera;
use crate::renderer::weather::geometry::WeatherKind;
use crate::renderer::weather::height_map::SurfaceDepth;
use crate::renderer::weather::WeatherEffect;
use crate::renderer::weather_pipeline::WeatherRenderer;
use crate::renderer::{
    render_weather_frame, HeadlessGpu, OffscreenTarget, COLOR_FORMAT, DEPTH_FORMAT,
};
use crate::settings::WeatherSettings;
use crate::world::ClientWorld;

const DEFAULT_SETTINGS_PATH: &str = "squall.toml";
const DEFAULT_FRAMES: u32 = 240;
const FRAME_SECONDS: f32 = 1.0 / 60.0;
const WALK_RADIUS: f32 = 12.0;
const WALK_ANGLE_PER_FRAME: f32 = 0.05;
const OVERHEAD_TOGGLE_INTERVAL: u32 = 20;
const OVERHEAD_CLEARANCE: i32 = 3;
const TARGET_WIDTH: u32 = 320;
const TARGET_HEIGHT: u32 = 180;
const USAGE: &str = "Usage: squall_client [--settings <path>] [--frames <n>] \
[--weather rain|snow|clear] [--seed <u64>] [--no-gpu]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherOverride {
    Fall(WeatherKind),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub settings_path: Option<PathBuf>,
    pub frames: Option<u32>,
    pub weather: Option<WeatherOverride>,
    pub seed: Option<u64>,
    pub no_gpu: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Help,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u32,
    pub rebuilds: u64,
    pub uploads: u32,
    pub quads: usize,
    pub surfaces: usize,
    pub block_toggles: u32,
    /// Cached depth of the column the player ended on.
    pub player_surface: Option<SurfaceDepth>,
    pub rendered_on_gpu: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} height map rebuilds, {} uploads, {} quads, {} surfaces, {} block toggles ({})",
            self.frames,
            self.rebuilds,
            self.uploads,
            self.quads,
            self.surfaces,
            self.block_toggles,
            if self.rendered_on_gpu { "gpu" } else { "cpu only" }
        )?;
        match self.player_surface.and_then(SurfaceDepth::depth) {
            Some(depth) => write!(f, ", player surface {depth} below scan start"),
            None => Ok(()),
        }
    }
}

pub fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = RunOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(value) = args.next() else {
                    return Err("--settings expects a path argument".to_string());
                };
                options.settings_path = Some(PathBuf::from(value));
            }
            "--frames" => {
                let Some(value) = args.next() else {
                    return Err("--frames expects a numeric argument".to_string());
                };
                let frames = value
                    .parse::<u32>()
                    .map_err(|err| format!("invalid frame count '{value}': {err}"))?;
                options.frames = Some(frames);
            }
            "--weather" => {
                let Some(value) = args.next() else {
                    return Err("--weather expects rain, snow or clear".to_string());
                };
                options.weather = Some(match value.as_str() {
                    "rain" => WeatherOverride::Fall(WeatherKind::Rain),
                    "snow" => WeatherOverride::Fall(WeatherKind::Snow),
                    "clear" => WeatherOverride::Clear,
                    other => return Err(format!("unknown weather '{other}'")),
                });
            }
            "--seed" => {
                let Some(value) = args.next() else {
                    return Err("--seed expects a numeric argument".to_string());
                };
                let seed = value
                    .parse::<u64>()
                    .map_err(|err| format!("invalid seed '{value}': {err}"))?;
                options.seed = Some(seed);
            }
            "--no-gpu" => options.no_gpu = true,
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Command::Run(options))
}

/// An explicitly named settings file must load; the default one is created
/// when absent.
fn resolve_settings(options: &RunOptions) -> io::Result<WeatherSettings> {
    let mut settings = match &options.settings_path {
        Some(path) => WeatherSettings::load(path).map_err(|err| {
            io::Error::new(err.kind(), format!("{}: {err}", path.display()))
        })?,
        None => WeatherSettings::load_or_create(Path::new(DEFAULT_SETTINGS_PATH)),
    };

    match options.weather {
        Some(WeatherOverride::Fall(kind)) => {
            settings.enabled = true;
            settings.kind = kind;
        }
        Some(WeatherOverride::Clear) => settings.enabled = false,
        None => {}
    }
    if let Some(seed) = options.seed {
        settings.world_seed = seed;
    }
    if options.no_gpu {
        settings.use_gpu = false;
    }
    Ok(settings)
}

struct GpuFrame {
    gpu: HeadlessGpu,
    target: OffscreenTarget,
    renderer: WeatherRenderer,
}

impl GpuFrame {
    fn try_new() -> Option<Self> {
        match HeadlessGpu::new() {
            Ok(gpu) => {
                let target = OffscreenTarget::new(&gpu.device, TARGET_WIDTH, TARGET_HEIGHT);
                let renderer = WeatherRenderer::new(&gpu.device, COLOR_FORMAT, DEPTH_FORMAT);
                debug!(
                    "Offscreen weather target {:?} on {}",
                    target.size(),
                    gpu.adapter_name
                );
                Some(Self {
                    gpu,
                    target,
                    renderer,
                })
            }
            Err(err) => {
                warn!("No GPU available ({err}); running the weather simulation on the CPU only");
                None
            }
        }
    }
}

fn vertical_chunk_range(settings: &WeatherSettings) -> std::ops::RangeInclusive<i32> {
    let size = CHUNK_SIZE as i32;
    let lowest = settings.scan_start_y - settings.scan_depth as i32 + 1;
    lowest.div_euclid(size)..=settings.scan_start_y.div_euclid(size)
}

fn walk_position(generator: &WorldGenerator, frame: u32) -> (Vec3, Vec3) {
    let angle = frame as f32 * WALK_ANGLE_PER_FRAME;
    let x = angle.cos() * WALK_RADIUS;
    let z = angle.sin() * WALK_RADIUS;
    let ground = generator.surface_height(x.floor() as i32, z.floor() as i32);
    let heading = Vec3::new(-angle.sin(), 0.0, angle.cos());
    (Vec3::new(x, ground as f32, z), heading)
}

/// Drives the weather effect along a fixed walk. Pass `None` for `gpu` to
/// keep everything on the CPU.
fn simulate(settings: &WeatherSettings, frames: u32, mut gpu: Option<GpuFrame>) -> RunSummary {
    let registry = register_default_blocks();
    let generator = WorldGenerator::new(settings.world_seed);
    let mut world = ClientWorld::default();
    world.populate_around(
        &generator,
        &registry,
        ChunkPos::new(0, 0, 0),
        settings.view_distance_chunks,
        vertical_chunk_range(settings),
    );

    let mut effect = WeatherEffect::new(settings.kind, settings.scan_params(), settings.world_seed);
    effect.set_enabled(settings.enabled);
    let mut camera = Camera::with_aspect(TARGET_WIDTH, TARGET_HEIGHT);
    let mut summary = RunSummary {
        rendered_on_gpu: gpu.is_some(),
        ..RunSummary::default()
    };

    for frame in 0..frames {
        let (player, heading) = walk_position(&generator, frame);

        if frame > 0 && frame % OVERHEAD_TOGGLE_INTERVAL == 0 {
            let overhead = player.floor().as_ivec3() + IVec3::Y * OVERHEAD_CLEARANCE;
            let next = match world.block_at(overhead) {
                Some(block) if block.is_air() => BlockId::GRANITE,
                _ => BlockId::AIR,
            };
            if world.set_block(overhead, next) {
                summary.block_toggles += 1;
            }
        }

        let drawable = effect.is_alive() && effect.update(player, &world, &registry);
        if let Some(quads) = effect.take_upload() {
            summary.uploads += 1;
            if let Some(gpu_frame) = gpu.as_mut() {
                gpu_frame
                    .renderer
                    .upload(&gpu_frame.gpu.device, &gpu_frame.gpu.queue, quads);
            }
        }

        if let Some(gpu_frame) = gpu.as_ref() {
            camera.follow(player, heading);
            if drawable {
                render_weather_frame(
                    &gpu_frame.gpu,
                    &gpu_frame.target,
                    &gpu_frame.renderer,
                    camera.view_projection_matrix(),
                    effect.origin(),
                    frame as f32 * FRAME_SECONDS,
                );
            }
        }
        summary.frames += 1;
    }

    if let Some(gpu_frame) = gpu.as_ref() {
        debug!(
            "{} weather quads resident on the GPU",
            gpu_frame.renderer.instance_count()
        );
    }
    summary.rebuilds = effect.sampler().generation();
    summary.quads = effect.quad_count();
    summary.surfaces = effect.sampler().last_rebuild().surfaces;
    summary.player_surface = effect
        .sampler()
        .center()
        .and_then(|column| effect.sampler().height(column));
    if effect.enabled() {
        debug!("Finished with {} falling", effect.kind().name());
    }
    summary
}

pub fn run_headless(options: &RunOptions) -> io::Result<RunSummary> {
    let settings = resolve_settings(options)?;
    let frames = options.frames.unwrap_or(DEFAULT_FRAMES);
    info!(
        "Simulating {} frames of {} (enabled: {}, radius {}, seed {})",
        frames,
        settings.kind.name(),
        settings.enabled,
        settings.radius,
        settings.world_seed
    );

    let gpu = if settings.use_gpu {
        GpuFrame::try_new()
    } else {
        None
    };
    if gpu.is_none() && settings.use_gpu {
        warn!("Weather frames will not be rendered");
    }

    let summary = simulate(&settings, frames, gpu);
    info!("Run finished: {summary}");
    Ok(summary)
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return;
        }
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run_headless(&options) {
        eprintln!("weather run failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{
        parse_args, resolve_settings, simulate, vertical_chunk_range, Command, RunOptions,
        RunSummary, WeatherOverride,
    };
    use crate::renderer::weather::geometry::WeatherKind;
    use crate::renderer::weather::height_map::SurfaceDepth;
    use crate::settings::WeatherSettings;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    fn small_settings() -> WeatherSettings {
        WeatherSettings {
            enabled: true,
            radius: 4,
            view_distance_chunks: 1,
            use_gpu: false,
            ..WeatherSettings::default()
        }
    }

    #[test]
    fn parses_every_flag() {
        let parsed = parse_args(args(&[
            "--settings",
            "storm.toml",
            "--frames",
            "12",
            "--weather",
            "snow",
            "--seed",
            "77",
            "--no-gpu",
        ]))
        .unwrap();

        assert_eq!(
            parsed,
            Command::Run(RunOptions {
                settings_path: Some(PathBuf::from("storm.toml")),
                frames: Some(12),
                weather: Some(WeatherOverride::Fall(WeatherKind::Snow)),
                seed: Some(77),
                no_gpu: true,
            })
        );
        assert_eq!(parse_args(args(&["-h"])).unwrap(), Command::Help);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args(&["--frames"])).is_err());
        assert!(parse_args(args(&["--frames", "many"])).is_err());
        assert!(parse_args(args(&["--weather", "hail"])).is_err());
        assert!(parse_args(args(&["--fog"])).is_err());
    }

    #[test]
    fn explicit_missing_settings_file_is_an_error() {
        let options = RunOptions {
            settings_path: Some(PathBuf::from("/nonexistent/squall/settings.toml")),
            ..RunOptions::default()
        };
        assert!(resolve_settings(&options).is_err());
    }

    #[test]
    fn scan_range_covers_the_whole_fall() {
        let settings = WeatherSettings::default();
        assert_eq!(vertical_chunk_range(&settings), 0..=4);

        let shallow = WeatherSettings {
            scan_start_y: -1,
            scan_depth: 1,
            ..WeatherSettings::default()
        };
        assert_eq!(vertical_chunk_range(&shallow), -1..=-1);
    }

    #[test]
    fn cpu_run_rebuilds_as_the_player_walks() {
        let summary = simulate(&small_settings(), 45, None);

        assert_eq!(summary.frames, 45);
        assert!(summary.rebuilds > 1);
        assert_eq!(summary.uploads as u64, summary.rebuilds);
        assert!(summary.quads > 0);
        assert!(summary.surfaces > 0);
        assert!(summary.player_surface.is_some());
        assert_eq!(summary.block_toggles, 2);
        assert!(!summary.rendered_on_gpu);
    }

    #[test]
    fn clear_weather_does_no_work() {
        let settings = WeatherSettings {
            enabled: false,
            ..small_settings()
        };
        let summary = simulate(&settings, 10, None);
        assert_eq!(summary.rebuilds, 0);
        assert_eq!(summary.quads, 0);
        assert_eq!(summary.player_surface, None);
    }

    #[test]
    fn summary_reports_the_player_surface_when_there_is_one() {
        let mut summary = RunSummary {
            frames: 3,
            ..RunSummary::default()
        };
        assert!(!summary.to_string().contains("player surface"));

        summary.player_surface = Some(SurfaceDepth::Surface(61));
        assert!(summary.to_string().ends_with(", player surface 61 below scan start"));

        summary.player_surface = Some(SurfaceDepth::NoSurface);
        assert!(!summary.to_string().contains("player surface"));
    }
}
