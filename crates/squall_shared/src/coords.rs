use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE: usize = 32;
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

/// A vertical line of blocks, identified by its world x/z.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl LocalPos {
    pub fn try_new(x: i32, y: i32, z: i32) -> Option<Self> {
        let range = 0..CHUNK_SIZE as i32;
        if range.contains(&x) && range.contains(&y) && range.contains(&z) {
            Some(Self {
                x: x as u8,
                y: y as u8,
                z: z as u8,
            })
        } else {
            None
        }
    }
}

impl ColumnPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn from_world(position: Vec3) -> Self {
        Self {
            x: position.x.floor() as i32,
            z: position.z.floor() as i32,
        }
    }

    pub fn at_height(self, y: i32) -> IVec3 {
        IVec3::new(self.x, y, self.z)
    }

    pub fn distance_squared(self, other: ColumnPos) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }
}

fn div_rem_floor(value: i32, divisor: i32) -> (i32, i32) {
    let mut q = value / divisor;
    let mut r = value % divisor;
    if r < 0 {
        q -= 1;
        r += divisor;
    }
    (q, r)
}

pub fn world_to_chunk(world_pos: IVec3) -> (ChunkPos, LocalPos) {
    let size = CHUNK_SIZE as i32;

    let (chunk_x, local_x) = div_rem_floor(world_pos.x, size);
    let (chunk_y, local_y) = div_rem_floor(world_pos.y, size);
    let (chunk_z, local_z) = div_rem_floor(world_pos.z, size);

    (
        ChunkPos {
            x: chunk_x,
            y: chunk_y,
            z: chunk_z,
        },
        LocalPos {
            x: local_x as u8,
            y: local_y as u8,
            z: local_z as u8,
        },
    )
}

pub fn chunk_to_world(chunk_pos: ChunkPos, local: LocalPos) -> IVec3 {
    let size = CHUNK_SIZE as i32;
    IVec3::new(
        chunk_pos.x * size + i32::from(local.x),
        chunk_pos.y * size + i32::from(local.y),
        chunk_pos.z * size + i32::from(local.z),
    )
}

pub fn local_to_index(local: LocalPos) -> usize {
    usize::from(local.x)
        + usize::from(local.z) * CHUNK_SIZE
        + usize::from(local.y) * CHUNK_SIZE * CHUNK_SIZE
}

pub fn index_to_local(index: usize) -> LocalPos {
    assert!(index < CHUNK_VOLUME, "chunk index out of bounds: {index}");

    let y = index / (CHUNK_SIZE * CHUNK_SIZE);
    let rem = index % (CHUNK_SIZE * CHUNK_SIZE);
    let z = rem / CHUNK_SIZE;
    let x = rem % CHUNK_SIZE;

    LocalPos {
        x: x as u8,
        y: y as u8,
        z: z as u8,
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};

    use super::{
        chunk_to_world, index_to_local, local_to_index, world_to_chunk, ChunkPos, ColumnPos,
        LocalPos, CHUNK_SIZE,
    };

    #[test]
    fn local_to_index_round_trips_back_to_local_coords() {
        for index in [0, 1, CHUNK_SIZE, CHUNK_SIZE * CHUNK_SIZE, 12_345] {
            assert_eq!(local_to_index(index_to_local(index)), index);
        }
        let local = LocalPos { x: 31, y: 0, z: 1 };
        assert_eq!(local_to_index(local), 31 + CHUNK_SIZE);
    }

    #[test]
    fn world_to_chunk_handles_negative_and_positive_coordinates() {
        let (chunk0, local0) = world_to_chunk(IVec3::new(-1, -1, -1));
        assert_eq!(chunk0, ChunkPos::new(-1, -1, -1));
        assert_eq!(
            local0,
            LocalPos {
                x: (CHUNK_SIZE - 1) as u8,
                y: (CHUNK_SIZE - 1) as u8,
                z: (CHUNK_SIZE - 1) as u8,
            }
        );

        let (chunk1, local1) = world_to_chunk(IVec3::new(32, 128, 0));
        assert_eq!(chunk1, ChunkPos::new(1, 4, 0));
        assert_eq!(local1, LocalPos { x: 0, y: 0, z: 0 });

        let world = IVec3::new(-33, 95, 66);
        let (chunk2, local2) = world_to_chunk(world);
        assert_eq!(chunk_to_world(chunk2, local2), world);
    }

    #[test]
    fn try_new_rejects_out_of_chunk_components() {
        assert_eq!(
            LocalPos::try_new(0, 31, 5),
            Some(LocalPos { x: 0, y: 31, z: 5 })
        );
        assert_eq!(LocalPos::try_new(32, 0, 0), None);
        assert_eq!(LocalPos::try_new(0, -1, 0), None);
        assert_eq!(LocalPos::try_new(0, 0, 255), None);
    }

    #[test]
    fn column_floors_player_position_and_measures_distance() {
        assert_eq!(
            ColumnPos::from_world(Vec3::new(-0.2, 70.9, 3.99)),
            ColumnPos::new(-1, 3)
        );
        assert_eq!(ColumnPos::new(0, 0).distance_squared(ColumnPos::new(3, -4)), 25);
        assert_eq!(ColumnPos::new(2, 5).at_height(60), IVec3::new(2, 60, 5));
    }
}
