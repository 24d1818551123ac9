use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::IVec3;
use serde::{Deserialize, Serialize};
use squall_shared::coords::ColumnPos;

use super::height_map::ColumnHeightSampler;

/// Texture scroll speeds in pixels per second. 1023 is the largest value a
/// packed scroll channel can carry.
pub const RAIN_SCROLL_SPEED: u32 = 1023;
pub const SNOW_SCROLL_SPEED: u32 = 42;
pub const SNOW_SCROLL_SPEED_X: u32 = 16;
const SCROLL_CHANNEL_BITS: u32 = 10;
const SCROLL_CHANNEL_MAX: u32 = (1 << SCROLL_CHANNEL_BITS) - 1;
const HORIZONTAL_JITTER: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherKind {
    Rain,
    Snow,
}

impl WeatherKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rain => "rain",
            Self::Snow => "snow",
        }
    }

    /// Horizontal and vertical texture scroll speed.
    pub fn scroll_speed(self) -> (u32, u32) {
        match self {
            Self::Rain => (0, RAIN_SCROLL_SPEED),
            Self::Snow => (SNOW_SCROLL_SPEED_X, SNOW_SCROLL_SPEED),
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct QuadFlags: u32 {
        const TEXTURE_SCROLL = 1 << 0;
    }
}

/// Packs two scroll speeds into 10-bit channels (x in the low bits).
pub fn pack_scroll(x: u32, y: u32) -> u32 {
    x.min(SCROLL_CHANNEL_MAX) | (y.min(SCROLL_CHANNEL_MAX) << SCROLL_CHANNEL_BITS)
}

pub fn unpack_scroll(packed: u32) -> (u32, u32) {
    (
        packed & SCROLL_CHANNEL_MAX,
        (packed >> SCROLL_CHANNEL_BITS) & SCROLL_CHANNEL_MAX,
    )
}

/// Texture region given as centre and size; a negative height flips v.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvRect {
    pub u: f32,
    pub v: f32,
    pub width: f32,
    pub height: f32,
}

impl UvRect {
    /// The texture repeats every four blocks of fall.
    pub const WEATHER: Self = Self {
        u: 0.5,
        v: 0.5,
        width: 1.0,
        height: 0.25,
    };
}

impl Default for UvRect {
    fn default() -> Self {
        Self::WEATHER
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct WeatherQuad {
    /// Relative to the mesh origin.
    pub center: [f32; 3],
    pub axis_x: [f32; 3],
    pub axis_y: [f32; 3],
    pub uv_center: [f32; 2],
    pub uv_size: [f32; 2],
    pub scroll: u32,
    pub flags: u32,
}
const _: [(); 60] = [(); std::mem::size_of::<WeatherQuad>()];

impl WeatherQuad {
    pub fn bottom(&self) -> f32 {
        self.center[1] - self.axis_y[1] * 0.5
    }

    pub fn top(&self) -> f32 {
        self.center[1] + self.axis_y[1] * 0.5
    }
}

/// Mesh origin for a window centred on `center`: the quads are positioned
/// relative to this block.
pub fn mesh_origin(center: ColumnPos, start_y: i32) -> IVec3 {
    center.at_height(start_y)
}

/// Two crossed streaks per cached column, so the fall reads from any
/// horizontal view angle. Each streak starts up to one block above the scan
/// start and ends on the top face of the column's surface block.
pub fn build_geometry(
    sampler: &ColumnHeightSampler,
    origin: IVec3,
    kind: WeatherKind,
    uv: UvRect,
    seed: u64,
) -> Vec<WeatherQuad> {
    let max_depth = sampler.params().max_depth;
    let (scroll_x, scroll_y) = kind.scroll_speed();
    let scroll = pack_scroll(scroll_x, scroll_y);
    let flags = QuadFlags::TEXTURE_SCROLL.bits();

    let mut columns: Vec<_> = sampler.iter().collect();
    columns.sort_unstable_by_key(|(column, _)| (column.x, column.z));

    let mut quads = Vec::with_capacity(columns.len() * 2);
    for (column, depth) in columns {
        let mut jitter = Jitter::new(mix_seed(column, seed));
        let lift = jitter.next_f32();
        let height = depth.fall_distance(max_depth) as f32 + lift;

        let x = (column.x - origin.x) as f32 + jitter.next_f32() * HORIZONTAL_JITTER;
        let z = (column.z - origin.z) as f32 + jitter.next_f32() * HORIZONTAL_JITTER;
        let top = lift + 1.0;
        let center = [x + 0.5, top - height * 0.5, z + 0.5];
        let axis_y = [0.0, height, 0.0];
        let uv_center = [uv.u, uv.v];
        let uv_size = [uv.width, -height * uv.height];

        for axis_x in [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0]] {
            quads.push(WeatherQuad {
                center,
                axis_x,
                axis_y,
                uv_center,
                uv_size,
                scroll,
                flags,
            });
        }
    }

    quads
}

struct Jitter {
    state: u64,
}

impl Jitter {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        ((x.wrapping_mul(0x2545_F491_4F6C_DD1D)) >> 32) as u32
    }

    /// Uniform in `[0, 1)`.
    fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }
}

fn mix_seed(column: ColumnPos, salt: u64) -> u64 {
    let x = (column.x as i64 as u64).wrapping_mul(0x9E37_79B1_85EB_CA87);
    let z = (column.z as i64 as u64).wrapping_mul(0x1656_67B1_9E37_79F9);

    let mut mixed = x ^ z ^ salt;
    mixed ^= mixed >> 30;
    mixed = mixed.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    mixed ^= mixed >> 27;
    mixed = mixed.wrapping_mul(0x94D0_49BB_1331_11EB);
    mixed ^ (mixed >> 31)
}

#[cfg(test)]
mod tests {
    use glam::IVec3;
    use squall_shared::block::{register_default_blocks, BlockId};
    use squall_shared::chunk::ChunkData;
    use squall_shared::coords::{ChunkPos, ColumnPos};

    use super::{
        build_geometry, mesh_origin, pack_scroll, unpack_scroll, QuadFlags, UvRect, WeatherKind,
        RAIN_SCROLL_SPEED, SNOW_SCROLL_SPEED, SNOW_SCROLL_SPEED_X,
    };
    use crate::renderer::weather::height_map::{ColumnHeightSampler, ScanParams};
    use crate::world::ClientWorld;

    fn sampler_over(world: &ClientWorld, radius: i32) -> ColumnHeightSampler {
        let registry = register_default_blocks();
        let mut sampler = ColumnHeightSampler::new(ScanParams {
            radius,
            ..ScanParams::default()
        });
        sampler.prepare(ColumnPos::new(0, 0), world, &registry);
        sampler
    }

    #[test]
    fn every_column_gets_two_crossed_quads() {
        let world = ClientWorld::default();
        let sampler = sampler_over(&world, 3);
        let origin = mesh_origin(ColumnPos::new(0, 0), 128);

        let quads = build_geometry(&sampler, origin, WeatherKind::Rain, UvRect::WEATHER, 1);

        assert_eq!(quads.len(), sampler.len() * 2);
        for pair in quads.chunks_exact(2) {
            assert_eq!(pair[0].center, pair[1].center);
            assert_eq!(pair[0].axis_x, [1.0, 0.0, 0.0]);
            assert_eq!(pair[1].axis_x, [0.0, 0.0, -1.0]);
        }
    }

    #[test]
    fn streak_ends_on_top_of_the_surface_block() {
        let mut world = ClientWorld::default();
        world.set_chunk(ChunkPos::new(0, 1, 0), ChunkData::new_empty());
        assert!(world.set_block(IVec3::new(1, 60, 0), BlockId::GRANITE));
        let sampler = sampler_over(&world, 3);
        let origin = mesh_origin(ColumnPos::new(0, 0), 128);

        let quads = build_geometry(&sampler, origin, WeatherKind::Rain, UvRect::WEATHER, 9);

        let surface_quad = quads
            .iter()
            .find(|quad| {
                (1.5..1.6).contains(&quad.center[0]) && (0.5..0.6).contains(&quad.center[2])
            })
            .expect("quad for column (1, 0)");
        let world_bottom = origin.y as f32 + surface_quad.bottom();
        assert!((world_bottom - 61.0).abs() < 1e-3, "bottom at {world_bottom}");
        assert!(surface_quad.top() >= 1.0 && surface_quad.top() < 2.0);
    }

    #[test]
    fn columns_without_surface_fall_the_full_scan_depth() {
        let world = ClientWorld::default();
        let sampler = sampler_over(&world, 2);
        let quads = build_geometry(
            &sampler,
            IVec3::new(0, 128, 0),
            WeatherKind::Snow,
            UvRect::WEATHER,
            3,
        );

        for quad in &quads {
            assert!((quad.bottom() - (1.0 - 128.0)).abs() < 1e-3);
            assert!((quad.uv_size[1] + quad.axis_y[1] * 0.25).abs() < 1e-4);
        }
    }

    #[test]
    fn jitter_is_deterministic_per_seed() {
        let world = ClientWorld::default();
        let sampler = sampler_over(&world, 4);
        let origin = IVec3::new(0, 128, 0);

        let a = build_geometry(&sampler, origin, WeatherKind::Rain, UvRect::WEATHER, 77);
        let b = build_geometry(&sampler, origin, WeatherKind::Rain, UvRect::WEATHER, 77);
        let c = build_geometry(&sampler, origin, WeatherKind::Rain, UvRect::WEATHER, 78);

        assert_eq!(a, b);
        assert_ne!(a, c);
        for quad in &a {
            let frac_x = quad.center[0] - quad.center[0].floor();
            assert!((0.5..0.6).contains(&frac_x), "x jitter out of range: {frac_x}");
        }
    }

    #[test]
    fn quads_carry_scroll_speed_and_flags_for_the_weather_kind() {
        let world = ClientWorld::default();
        let sampler = sampler_over(&world, 1);
        let origin = IVec3::new(0, 128, 0);

        let rain = build_geometry(&sampler, origin, WeatherKind::Rain, UvRect::WEATHER, 0);
        let snow = build_geometry(&sampler, origin, WeatherKind::Snow, UvRect::WEATHER, 0);

        assert_eq!(unpack_scroll(rain[0].scroll), (0, RAIN_SCROLL_SPEED));
        assert_eq!(
            unpack_scroll(snow[0].scroll),
            (SNOW_SCROLL_SPEED_X, SNOW_SCROLL_SPEED)
        );
        assert_eq!(rain[0].flags, QuadFlags::TEXTURE_SCROLL.bits());
    }

    #[test]
    fn scroll_channels_saturate_at_ten_bits() {
        assert_eq!(unpack_scroll(pack_scroll(5000, 2048)), (1023, 1023));
        assert_eq!(pack_scroll(1, 1), 1 | (1 << 10));
    }

    #[test]
    fn empty_window_builds_no_geometry() {
        let world = ClientWorld::default();
        let sampler = sampler_over(&world, 0);
        let quads = build_geometry(
            &sampler,
            IVec3::ZERO,
            WeatherKind::Rain,
            UvRect::WEATHER,
            5,
        );
        assert!(quads.is_empty());
    }
}
