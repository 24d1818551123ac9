use glam::{Mat4, Vec3};

pub const EYE_HEIGHT: f32 = 1.62;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 64.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            fov: 70.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn with_aspect(width: u32, height: u32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            ..Self::default()
        }
    }

    /// Places the eye above the player's feet and turns towards the walking direction.
    pub fn follow(&mut self, player_feet: Vec3, heading: Vec3) {
        const MAX_PITCH: f32 = 89.0_f32.to_radians();

        self.position = player_feet + Vec3::Y * EYE_HEIGHT;
        let flat = Vec3::new(heading.x, 0.0, heading.z);
        if flat.length_squared() > 1e-6 {
            self.yaw = flat.z.atan2(flat.x);
        }
        self.pitch = self.pitch.clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        let view = Mat4::look_to_rh(self.position, self.forward_direction(), Vec3::Y);
        let projection = Mat4::perspective_rh(
            self.fov,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        );

        projection * view
    }

    pub fn forward_direction(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize_or_zero()
    }
}
