//! Per-column precipitation floors around the player.
//!
//! For every column of a circular window centred on the player the sampler
//! walks down from a fixed start elevation until it meets a block that stops
//! rain or snow. Results are cached until the player changes column or the
//! world reports a new mutation version.

use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::debug;

use squall_shared::block::BlockRegistry;
use squall_shared::chunk::ChunkData;
use squall_shared::coords::{world_to_chunk, ChunkPos, ColumnPos};

use crate::world::ChunkSource;

pub const DEFAULT_RADIUS: i32 = 8;
pub const DEFAULT_START_Y: i32 = 128;
pub const DEFAULT_MAX_DEPTH: u32 = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanParams {
    pub radius: i32,
    pub start_y: i32,
    pub max_depth: u32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            start_y: DEFAULT_START_Y,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Distance below `start_y` to the first block that stops precipitation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceDepth {
    Surface(u32),
    /// Nothing within `max_depth`, or the column runs through unloaded chunks.
    NoSurface,
}

impl SurfaceDepth {
    pub fn depth(self) -> Option<u32> {
        match self {
            Self::Surface(depth) => Some(depth),
            Self::NoSurface => None,
        }
    }

    /// Length of the fall; columns without a surface fall the full scan depth.
    pub fn fall_distance(self, max_depth: u32) -> u32 {
        match self {
            Self::Surface(depth) => depth,
            Self::NoSurface => max_depth,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub columns: usize,
    pub chunk_lookups: usize,
    pub blocks_inspected: usize,
    pub surfaces: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RebuildTrigger {
    Moved,
    Mutated,
}

pub struct ColumnHeightSampler {
    params: ScanParams,
    cache: FxHashMap<ColumnPos, SurfaceDepth>,
    center: Option<ColumnPos>,
    seen_version: u64,
    generation: u64,
    last_rebuild: RebuildStats,
}

impl ColumnHeightSampler {
    pub fn new(params: ScanParams) -> Self {
        Self {
            params,
            cache: FxHashMap::default(),
            center: None,
            seen_version: 0,
            generation: 0,
            last_rebuild: RebuildStats::default(),
        }
    }

    pub fn params(&self) -> ScanParams {
        self.params
    }

    /// Changing the parameters discards the window; the next `prepare` rebuilds.
    pub fn set_params(&mut self, params: ScanParams) {
        if self.params != params {
            self.params = params;
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.center = None;
    }

    /// Column the current window is centred on, if any window has been built.
    pub fn center(&self) -> Option<ColumnPos> {
        self.center
    }

    /// Incremented on every rebuild, including rebuilds of an empty window.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_rebuild(&self) -> RebuildStats {
        self.last_rebuild
    }

    pub fn height(&self, column: ColumnPos) -> Option<SurfaceDepth> {
        self.cache.get(&column).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnPos, SurfaceDepth)> + '_ {
        self.cache.iter().map(|(column, depth)| (*column, *depth))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Brings the cache in line with the player column and the world's
    /// mutation version. Always leaves a consistent cache behind, so the
    /// result is always `true`; watch [`generation`](Self::generation) to
    /// find out whether anything was rebuilt.
    pub fn prepare<W: ChunkSource>(
        &mut self,
        player_column: ColumnPos,
        world: &W,
        registry: &BlockRegistry,
    ) -> bool {
        let version = world.mutation_version();

        if self.center != Some(player_column) {
            self.center = Some(player_column);
            self.seen_version = version;
            self.rebuild(player_column, world, registry, RebuildTrigger::Moved);
        } else if self.seen_version != version {
            self.seen_version = version;
            self.rebuild(player_column, world, registry, RebuildTrigger::Mutated);
        }

        true
    }

    pub fn sample_column<W: ChunkSource>(
        &self,
        column: ColumnPos,
        world: &W,
        registry: &BlockRegistry,
    ) -> SurfaceDepth {
        let mut stats = RebuildStats::default();
        self.scan_column(column, world, registry, &mut stats)
    }

    fn rebuild<W: ChunkSource>(
        &mut self,
        center: ColumnPos,
        world: &W,
        registry: &BlockRegistry,
        trigger: RebuildTrigger,
    ) {
        let started = Instant::now();
        let mut stats = RebuildStats::default();
        let radius = self.params.radius;

        self.cache.clear();
        if radius > 0 {
            let radius_sq = i64::from(radius) * i64::from(radius);
            for dx in -radius..=radius {
                for dz in -radius..=radius {
                    // Columns past the edge of the i32 world are not part of the window.
                    let (Some(x), Some(z)) = (center.x.checked_add(dx), center.z.checked_add(dz))
                    else {
                        continue;
                    };
                    let column = ColumnPos::new(x, z);
                    if column.distance_squared(center) >= radius_sq {
                        continue;
                    }
                    let depth = self.scan_column(column, world, registry, &mut stats);
                    stats.columns += 1;
                    if depth != SurfaceDepth::NoSurface {
                        stats.surfaces += 1;
                    }
                    self.cache.insert(column, depth);
                }
            }
        }

        self.generation += 1;
        self.last_rebuild = stats;
        debug!(
            "Weather height map rebuilt ({:?}) around {:?}: {} columns, {} surfaces, {} chunk lookups, {} blocks checked in {:?}",
            trigger,
            center,
            stats.columns,
            stats.surfaces,
            stats.chunk_lookups,
            stats.blocks_inspected,
            started.elapsed()
        );
    }

    fn scan_column<W: ChunkSource>(
        &self,
        column: ColumnPos,
        world: &W,
        registry: &BlockRegistry,
        stats: &mut RebuildStats,
    ) -> SurfaceDepth {
        // Consecutive steps almost always stay inside one chunk.
        let mut resolved: Option<(ChunkPos, Option<&ChunkData>)> = None;

        for depth in 0..self.params.max_depth {
            let Some(y) = i32::try_from(depth)
                .ok()
                .and_then(|depth| self.params.start_y.checked_sub(depth))
            else {
                break;
            };
            let (chunk_pos, local) = world_to_chunk(column.at_height(y));

            let chunk = match resolved {
                Some((pos, chunk)) if pos == chunk_pos => chunk,
                _ => {
                    stats.chunk_lookups += 1;
                    let chunk = world.chunk(chunk_pos);
                    resolved = Some((chunk_pos, chunk));
                    chunk
                }
            };

            let Some(chunk) = chunk else {
                continue;
            };
            if chunk.get(local).is_air() {
                continue;
            }

            stats.blocks_inspected += 1;
            if chunk.block_data(local, registry).stops_precipitation() {
                return SurfaceDepth::Surface(depth);
            }
        }

        SurfaceDepth::NoSurface
    }
}
