use std::collections::HashMap;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

#[repr(transparent)]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Pod,
    Zeroable,
)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: Self = Self(0);
    pub const GRANITE: Self = Self(1);
    pub const LOAM: Self = Self(2);
    pub const VERDANT_TURF: Self = Self(3);
    pub const DUNE_SAND: Self = Self(4);
    pub const TIMBER_LOG: Self = Self(5);
    pub const CANOPY_LEAVES: Self = Self(6);
    pub const STILL_WATER: Self = Self(7);
    pub const CRYSTAL_PANE: Self = Self(8);
    pub const TALL_GRASS: Self = Self(9);
    pub const WILDFLOWER: Self = Self(10);
    pub const COBWEB: Self = Self(11);
    pub const TORCH: Self = Self(12);
    pub const SNOWCAP: Self = Self(13);
    pub const HEWN_PLANK: Self = Self(14);

    pub fn is_air(self) -> bool {
        self == Self::AIR
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BlockFlags: u8 {
        const SOLID = 1 << 0;
        const TRANSPARENT = 1 << 1;
        const FLUID = 1 << 2;
        /// Precipitation falls straight through the block.
        const INVISIBLE_FOR_RAIN = 1 << 3;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockProperties {
    pub name: String,
    pub flags: BlockFlags,
    #[serde(default)]
    pub fluid: u8,
}

impl BlockProperties {
    pub fn is_solid(&self) -> bool {
        self.flags.contains(BlockFlags::SOLID)
    }

    pub fn is_transparent(&self) -> bool {
        self.flags.contains(BlockFlags::TRANSPARENT)
    }

    pub fn is_invisible_for_rain(&self) -> bool {
        self.flags.contains(BlockFlags::INVISIBLE_FOR_RAIN)
    }
}

/// Everything a consumer needs to know about one voxel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockData {
    pub id: BlockId,
    pub fluid: u8,
    pub flags: BlockFlags,
}

impl BlockData {
    pub const AIR: Self = Self {
        id: BlockId::AIR,
        fluid: 0,
        flags: BlockFlags::TRANSPARENT.union(BlockFlags::INVISIBLE_FOR_RAIN),
    };

    pub fn stops_precipitation(&self) -> bool {
        (!self.id.is_air() || self.fluid > 0)
            && !self.flags.contains(BlockFlags::INVISIBLE_FOR_RAIN)
    }
}

#[derive(Default, Debug, Clone)]
pub struct BlockRegistry {
    properties: Vec<BlockProperties>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers `props` and returns its id. Re-registering a name returns the
    /// existing id; `None` once the id space is exhausted.
    pub fn register(&mut self, props: BlockProperties) -> Option<BlockId> {
        if let Some(existing) = self.by_name.get(props.name.as_str()) {
            return Some(*existing);
        }

        let id = BlockId(u16::try_from(self.properties.len()).ok()?);
        self.by_name.insert(props.name.clone(), id);
        self.properties.push(props);
        Some(id)
    }

    /// Unknown ids resolve to air.
    pub fn get_properties(&self, id: BlockId) -> Option<&BlockProperties> {
        self.properties
            .get(id.0 as usize)
            .or_else(|| self.properties.get(BlockId::AIR.0 as usize))
    }

    pub fn block_data(&self, id: BlockId) -> BlockData {
        match self.properties.get(id.0 as usize) {
            Some(props) => BlockData {
                id,
                fluid: props.fluid,
                flags: props.flags,
            },
            None => BlockData::AIR,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

pub fn register_default_blocks() -> BlockRegistry {
    fn block(name: &str, flags: BlockFlags) -> BlockProperties {
        BlockProperties {
            name: name.to_string(),
            flags,
            fluid: 0,
        }
    }

    let solid = BlockFlags::SOLID;
    let see_through = BlockFlags::SOLID | BlockFlags::TRANSPARENT;
    let rain_ghost = BlockFlags::TRANSPARENT | BlockFlags::INVISIBLE_FOR_RAIN;

    let defaults = [
        block("air", rain_ghost),
        block("granite", solid),
        block("loam", solid),
        block("verdant_turf", solid),
        block("dune_sand", solid),
        block("timber_log", solid),
        block("canopy_leaves", see_through),
        BlockProperties {
            name: "still_water".to_string(),
            flags: BlockFlags::TRANSPARENT | BlockFlags::FLUID,
            fluid: 8,
        },
        block("crystal_pane", see_through),
        block("tall_grass", rain_ghost),
        block("wildflower", rain_ghost),
        block("cobweb", rain_ghost),
        block("torch", rain_ghost),
        block("snowcap", see_through),
        block("hewn_plank", solid),
    ];

    let mut registry = BlockRegistry::new();
    for (idx, props) in defaults.into_iter().enumerate() {
        let id = registry.register(props);
        debug_assert_eq!(
            id,
            Some(BlockId(idx as u16)),
            "default block IDs must be stable"
        );
    }

    registry
}
