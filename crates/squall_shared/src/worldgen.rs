use glam::IVec3;
use noise::{NoiseFn, Perlin};
use tracing::debug;

use crate::block::{BlockId, BlockRegistry};
use crate::chunk::ChunkData;
use crate::coords::{chunk_to_world, world_to_chunk, ChunkPos, LocalPos, CHUNK_SIZE};

pub const SEA_LEVEL: i32 = 58;
const HEIGHT_OFFSET: f64 = 64.0;
const TREE_FREQUENCY: u64 = 37;
const MIN_TRUNK_HEIGHT: i32 = 4;
const CANOPY_RADIUS: i32 = 2;

#[derive(Debug, Clone)]
pub struct WorldGenerator {
    pub seed: u64,
    terrain: Perlin,
}

struct Palette {
    granite: BlockId,
    loam: BlockId,
    turf: BlockId,
    sand: BlockId,
    water: BlockId,
    tall_grass: BlockId,
    wildflower: BlockId,
    log: BlockId,
    leaves: BlockId,
}

impl Palette {
    fn from_registry(registry: &BlockRegistry) -> Self {
        let air = BlockId::AIR;
        let granite = registry.get_by_name("granite").unwrap_or(air);
        Self {
            granite,
            loam: registry.get_by_name("loam").unwrap_or(granite),
            turf: registry.get_by_name("verdant_turf").unwrap_or(granite),
            sand: registry.get_by_name("dune_sand").unwrap_or(granite),
            water: registry.get_by_name("still_water").unwrap_or(air),
            tall_grass: registry.get_by_name("tall_grass").unwrap_or(air),
            wildflower: registry.get_by_name("wildflower").unwrap_or(air),
            log: registry.get_by_name("timber_log").unwrap_or(air),
            leaves: registry.get_by_name("canopy_leaves").unwrap_or(air),
        }
    }
}

impl WorldGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            terrain: Perlin::new(seed as u32),
        }
    }

    /// World y of the first air block above the ground in this column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let wx = world_x as f64;
        let wz = world_z as f64;

        let coarse = self.terrain.get([wx * 0.008, wz * 0.008]);
        let detail = self.terrain.get([wx * 0.032 + 101.3, wz * 0.032 - 73.7]) * 0.35;
        let ridge = (1.0 - self.terrain.get([wx * 0.004 + 401.0, wz * 0.004 - 257.0]).abs())
            .powf(1.7);

        (coarse * 18.0 + detail * 8.0 + ridge * 10.0 + HEIGHT_OFFSET).round() as i32
    }

    fn column_hash(&self, world_x: i32, world_z: i32, salt: u64) -> u64 {
        self.seed
            .wrapping_add(salt)
            .wrapping_mul(6364136223846793005)
            .wrapping_add((world_x as i64 as u64).wrapping_mul(1442695040888963407))
            .wrapping_add((world_z as i64 as u64).wrapping_mul(1103515245))
    }

    fn should_place_tree(&self, world_x: i32, world_z: i32) -> bool {
        (self.column_hash(world_x, world_z, 17) >> 8) % TREE_FREQUENCY == 0
    }

    fn trunk_height(&self, world_x: i32, world_z: i32) -> i32 {
        MIN_TRUNK_HEIGHT + ((self.column_hash(world_x, world_z, 29) >> 16) % 3) as i32
    }

    fn decoration_at(&self, palette: &Palette, world_x: i32, world_z: i32) -> Option<BlockId> {
        match (self.column_hash(world_x, world_z, 53) >> 12) % 11 {
            0 | 1 => Some(palette.tall_grass),
            2 => Some(palette.wildflower),
            _ => None,
        }
    }

    pub fn generate_chunk(&self, pos: ChunkPos, registry: &BlockRegistry) -> ChunkData {
        let palette = Palette::from_registry(registry);
        let mut chunk = ChunkData::new_empty();
        let chunk_base_y = pos.y * CHUNK_SIZE as i32;

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let anchor = chunk_to_world(
                    pos,
                    LocalPos {
                        x: x as u8,
                        y: 0,
                        z: z as u8,
                    },
                );
                let surface_y = self.surface_height(anchor.x, anchor.z);
                let top_y = surface_y - 1;
                let decoration =
                    if surface_y > SEA_LEVEL && !self.should_place_tree(anchor.x, anchor.z) {
                        self.decoration_at(&palette, anchor.x, anchor.z)
                    } else {
                        None
                    };

                for y in 0..CHUNK_SIZE {
                    let world_y = chunk_base_y + y as i32;
                    let block = if world_y < top_y - 3 {
                        palette.granite
                    } else if world_y < top_y {
                        palette.loam
                    } else if world_y == top_y {
                        if top_y < SEA_LEVEL {
                            palette.sand
                        } else {
                            palette.turf
                        }
                    } else if world_y < SEA_LEVEL {
                        palette.water
                    } else if world_y == surface_y {
                        decoration.unwrap_or(BlockId::AIR)
                    } else {
                        BlockId::AIR
                    };

                    if block != BlockId::AIR {
                        chunk.set(
                            LocalPos {
                                x: x as u8,
                                y: y as u8,
                                z: z as u8,
                            },
                            block,
                        );
                    }
                }
            }
        }

        self.place_trees(pos, &palette, &mut chunk);
        debug!("Generated chunk {:?}", pos);
        chunk
    }

    // Trees rooted in neighbouring chunks can still reach into this one with
    // their canopy, so origins are scanned with a CANOPY_RADIUS margin.
    fn place_trees(&self, pos: ChunkPos, palette: &Palette, chunk: &mut ChunkData) {
        let size = CHUNK_SIZE as i32;
        let min_x = pos.x * size - CANOPY_RADIUS;
        let min_z = pos.z * size - CANOPY_RADIUS;
        let max_x = pos.x * size + size + CANOPY_RADIUS;
        let max_z = pos.z * size + size + CANOPY_RADIUS;

        for world_z in min_z..max_z {
            for world_x in min_x..max_x {
                if !self.should_place_tree(world_x, world_z) {
                    continue;
                }
                let ground = self.surface_height(world_x, world_z);
                if ground <= SEA_LEVEL {
                    continue;
                }

                let trunk_top = ground + self.trunk_height(world_x, world_z) - 1;
                for y in ground..=trunk_top {
                    set_if_inside(chunk, pos, IVec3::new(world_x, y, world_z), palette.log);
                }

                for dy in -1..=1 {
                    let radius = if dy == 1 { CANOPY_RADIUS - 1 } else { CANOPY_RADIUS };
                    for dz in -radius..=radius {
                        for dx in -radius..=radius {
                            if dx == 0 && dz == 0 && dy < 1 {
                                continue;
                            }
                            let leaf = IVec3::new(world_x + dx, trunk_top + dy, world_z + dz);
                            set_if_inside(chunk, pos, leaf, palette.leaves);
                        }
                    }
                }
            }
        }
    }
}

fn set_if_inside(chunk: &mut ChunkData, pos: ChunkPos, world: IVec3, block: BlockId) {
    let (owner, local) = world_to_chunk(world);
    if owner == pos {
        chunk.set(local, block);
    }
}
