use crate::block::{BlockData, BlockId, BlockRegistry};
use crate::coords::{local_to_index, LocalPos, CHUNK_VOLUME};

#[derive(Clone, Debug)]
pub struct ChunkData {
    pub blocks: Box<[BlockId; CHUNK_VOLUME]>,
}

impl ChunkData {
    pub fn new_empty() -> Self {
        Self {
            blocks: Box::new([BlockId::AIR; CHUNK_VOLUME]),
        }
    }

    pub fn new_filled(block: BlockId) -> Self {
        Self {
            blocks: Box::new([block; CHUNK_VOLUME]),
        }
    }

    pub fn get(&self, local: LocalPos) -> BlockId {
        self.blocks[local_to_index(local)]
    }

    pub fn set(&mut self, local: LocalPos, block: BlockId) {
        let index = local_to_index(local);
        self.blocks[index] = block;
    }

    pub fn get_index(&self, index: usize) -> BlockId {
        self.blocks[index]
    }

    pub fn set_index(&mut self, index: usize, block: BlockId) {
        self.blocks[index] = block;
    }

    /// Bounds-checked read with chunk-local integer coordinates.
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Option<BlockId> {
        LocalPos::try_new(x, y, z).map(|local| self.get(local))
    }

    pub fn block_data(&self, local: LocalPos, registry: &BlockRegistry) -> BlockData {
        registry.block_data(self.get(local))
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| block.is_air())
    }
}

impl Default for ChunkData {
    fn default() -> Self {
        Self::new_empty()
    }
}
