pub mod geometry;
pub mod height_map;

use glam::{IVec3, Vec3};
use tracing::{debug, info};

use squall_shared::block::BlockRegistry;
use squall_shared::coords::ColumnPos;

use crate::world::ChunkSource;

use self::geometry::{build_geometry, mesh_origin, UvRect, WeatherKind, WeatherQuad};
use self::height_map::{ColumnHeightSampler, ScanParams};

/// Rain or snow falling around the player, cut off where it lands.
pub struct WeatherEffect {
    enabled: bool,
    kind: WeatherKind,
    seed: u64,
    uv: UvRect,
    sampler: ColumnHeightSampler,
    quads: Vec<WeatherQuad>,
    origin: IVec3,
    built_generation: Option<u64>,
    upload_pending: bool,
}

impl WeatherEffect {
    pub fn new(kind: WeatherKind, params: ScanParams, seed: u64) -> Self {
        Self {
            enabled: false,
            kind,
            seed,
            uv: UvRect::WEATHER,
            sampler: ColumnHeightSampler::new(params),
            quads: Vec::new(),
            origin: IVec3::ZERO,
            built_generation: None,
            upload_pending: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("Weather {}", if enabled { "started" } else { "stopped" });
        }
        self.enabled = enabled;
    }

    pub fn is_alive(&self) -> bool {
        self.enabled
    }

    pub fn kind(&self) -> WeatherKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: WeatherKind) {
        if self.kind != kind {
            self.kind = kind;
            self.built_generation = None;
        }
    }

    pub fn sampler(&self) -> &ColumnHeightSampler {
        &self.sampler
    }

    pub fn set_params(&mut self, params: ScanParams) {
        self.sampler.set_params(params);
    }

    /// Refreshes the height map and, when it changed, the geometry. Returns
    /// whether there is a mesh worth drawing this frame.
    pub fn update<W: ChunkSource>(
        &mut self,
        player_position: Vec3,
        world: &W,
        registry: &BlockRegistry,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let column = ColumnPos::from_world(player_position);
        if !self.sampler.prepare(column, world, registry) {
            return false;
        }

        let generation = self.sampler.generation();
        if self.built_generation != Some(generation) {
            let origin = mesh_origin(column, self.sampler.params().start_y);
            self.quads = build_geometry(&self.sampler, origin, self.kind, self.uv, self.seed);
            self.origin = origin;
            self.built_generation = Some(generation);
            self.upload_pending = true;
            debug!(
                "Weather geometry rebuilt: {} quads at {:?}",
                self.quads.len(),
                origin
            );
        }

        !self.quads.is_empty()
    }

    pub fn quads(&self) -> &[WeatherQuad] {
        &self.quads
    }

    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    /// Geometry built since the previous call, if any.
    pub fn take_upload(&mut self) -> Option<&[WeatherQuad]> {
        if std::mem::take(&mut self.upload_pending) {
            Some(&self.quads)
        } else {
            None
        }
    }
}
