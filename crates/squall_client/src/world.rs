use glam::IVec3;
use rustc_hash::FxHashMap;
use tracing::info;

use squall_shared::block::{BlockId, BlockRegistry};
use squall_shared::chunk::ChunkData;
use squall_shared::coords::{world_to_chunk, ChunkPos};
use squall_shared::worldgen::WorldGenerator;

/// Read-only view of resident voxel data.
pub trait ChunkSource {
    fn chunk(&self, pos: ChunkPos) -> Option<&ChunkData>;

    /// Bumped whenever any resident block changes.
    fn mutation_version(&self) -> u64;
}

#[derive(Default)]
pub struct ClientWorld {
    pub loaded_chunks: FxHashMap<ChunkPos, ChunkData>,
    block_sets: u64,
}

impl ClientWorld {
    pub fn set_chunk(&mut self, pos: ChunkPos, chunk: ChunkData) {
        self.loaded_chunks.insert(pos, chunk);
        self.block_sets += 1;
    }

    pub fn remove_chunk(&mut self, pos: &ChunkPos) {
        if self.loaded_chunks.remove(pos).is_some() {
            self.block_sets += 1;
        }
    }

    pub fn block_at(&self, world_pos: IVec3) -> Option<BlockId> {
        let (chunk_pos, local) = world_to_chunk(world_pos);
        self.loaded_chunks.get(&chunk_pos).map(|chunk| chunk.get(local))
    }

    /// Returns false when the owning chunk is not resident.
    pub fn set_block(&mut self, world_pos: IVec3, block: BlockId) -> bool {
        let (chunk_pos, local) = world_to_chunk(world_pos);
        let Some(chunk) = self.loaded_chunks.get_mut(&chunk_pos) else {
            return false;
        };
        if chunk.get(local) != block {
            chunk.set(local, block);
            self.block_sets += 1;
        }
        true
    }

    pub fn populate_around(
        &mut self,
        generator: &WorldGenerator,
        registry: &BlockRegistry,
        center: ChunkPos,
        horizontal_radius: i32,
        vertical: std::ops::RangeInclusive<i32>,
    ) {
        let before = self.loaded_chunks.len();
        for dz in -horizontal_radius..=horizontal_radius {
            for dx in -horizontal_radius..=horizontal_radius {
                for y in vertical.clone() {
                    let pos = ChunkPos::new(center.x + dx, y, center.z + dz);
                    if self.loaded_chunks.contains_key(&pos) {
                        continue;
                    }
                    let chunk = generator.generate_chunk(pos, registry);
                    self.set_chunk(pos, chunk);
                }
            }
        }
        info!(
            "Loaded {} chunk(s) around {:?} ({} resident)",
            self.loaded_chunks.len() - before,
            center,
            self.loaded_chunks.len()
        );
    }
}

impl ChunkSource for ClientWorld {
    fn chunk(&self, pos: ChunkPos) -> Option<&ChunkData> {
        self.loaded_chunks.get(&pos)
    }

    fn mutation_version(&self) -> u64 {
        self.block_sets
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;
    use squall_shared::block::{register_default_blocks, BlockId};
    use squall_shared::chunk::ChunkData;
    use squall_shared::coords::ChunkPos;
    use squall_shared::worldgen::WorldGenerator;

    use super::{ChunkSource, ClientWorld};

    #[test]
    fn block_changes_bump_the_mutation_version() {
        let mut world = ClientWorld::default();
        world.set_chunk(ChunkPos::new(0, 1, 0), ChunkData::new_empty());
        let loaded = world.mutation_version();

        assert!(world.set_block(IVec3::new(3, 60, 3), BlockId::GRANITE));
        assert_eq!(world.mutation_version(), loaded + 1);
        assert_eq!(world.block_at(IVec3::new(3, 60, 3)), Some(BlockId::GRANITE));

        // Writing the same block again is not a change.
        assert!(world.set_block(IVec3::new(3, 60, 3), BlockId::GRANITE));
        assert_eq!(world.mutation_version(), loaded + 1);
    }

    #[test]
    fn writes_into_missing_chunks_are_refused() {
        let mut world = ClientWorld::default();
        assert!(!world.set_block(IVec3::new(0, 0, 0), BlockId::GRANITE));
        assert_eq!(world.mutation_version(), 0);
        assert_eq!(world.block_at(IVec3::new(0, 0, 0)), None);
    }

    #[test]
    fn removing_a_resident_chunk_counts_as_a_mutation() {
        let mut world = ClientWorld::default();
        let pos = ChunkPos::new(-1, 0, 2);
        world.set_chunk(pos, ChunkData::new_empty());
        let before = world.mutation_version();

        world.remove_chunk(&pos);
        assert_eq!(world.mutation_version(), before + 1);
        assert!(world.chunk(pos).is_none());

        world.remove_chunk(&pos);
        assert_eq!(world.mutation_version(), before + 1);
    }

    #[test]
    fn populate_around_loads_the_requested_box_once() {
        let registry = register_default_blocks();
        let generator = WorldGenerator::new(11);
        let mut world = ClientWorld::default();

        world.populate_around(&generator, &registry, ChunkPos::new(0, 0, 0), 1, 0..=1);
        assert_eq!(world.loaded_chunks.len(), 3 * 3 * 2);
        let version = world.mutation_version();

        world.populate_around(&generator, &registry, ChunkPos::new(0, 0, 0), 1, 0..=1);
        assert_eq!(world.mutation_version(), version);
    }
}
