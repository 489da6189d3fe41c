//! Typed stand-in for the animated asset's marker nodes.
//!
//! Instead of scanning a scene graph for nodes whose name happens to contain
//! "emitter", the rig is an explicit list of marker descriptors attached at
//! load time. Each marker resolves a world position from elapsed time.

use cgmath::Point3;

#[derive(Clone, Debug)]
pub enum MotionPath {
    Fixed(Point3<f32>),
    /// Circular orbit in the xz plane with a vertical flap, shaped like a
    /// pair of beating wing tips.
    Orbit {
        center: Point3<f32>,
        radius: f32,
        angular_speed: f32,
        phase: f32,
        flap_height: f32,
    },
}

impl MotionPath {
    pub fn position_at(&self, time: f32) -> Point3<f32> {
        match self {
            MotionPath::Fixed(p) => *p,
            MotionPath::Orbit {
                center,
                radius,
                angular_speed,
                phase,
                flap_height,
            } => {
                let a = phase + time * angular_speed;
                Point3::new(
                    center.x + radius * a.cos(),
                    center.y + flap_height * (a * 2.0).sin(),
                    center.z + radius * a.sin(),
                )
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Marker {
    pub label: String,
    /// Whether this marker feeds the particle emission path.
    pub emitter: bool,
    pub path: MotionPath,
}

#[derive(Clone, Debug, Default)]
pub struct MarkerRig {
    markers: Vec<Marker>,
}

impl MarkerRig {
    pub fn new(markers: Vec<Marker>) -> Self {
        MarkerRig { markers }
    }

    pub fn emitter_markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(|m| m.emitter)
    }

    /// World positions of all emitter-flagged markers at `time`, in
    /// registration order. An empty result degrades the simulation to pure
    /// integration; it is not an error.
    pub fn emitter_positions(&self, time: f32) -> Vec<Point3<f32>> {
        self.emitter_markers()
            .map(|m| m.path.position_at(time))
            .collect()
    }

    /// The rig used by the demo binary: two orbiting wing-tip emitters and a
    /// fixed body marker that emits nothing.
    pub fn demo() -> Self {
        MarkerRig::new(vec![
            Marker {
                label: "wing_l".to_string(),
                emitter: true,
                path: MotionPath::Orbit {
                    center: Point3::new(0.0, 0.2, 0.0),
                    radius: 0.6,
                    angular_speed: 1.7,
                    phase: 0.0,
                    flap_height: 0.35,
                },
            },
            Marker {
                label: "wing_r".to_string(),
                emitter: true,
                path: MotionPath::Orbit {
                    center: Point3::new(0.0, 0.2, 0.0),
                    radius: 0.6,
                    angular_speed: 1.7,
                    phase: std::f32::consts::PI,
                    flap_height: 0.35,
                },
            },
            Marker {
                label: "body".to_string(),
                emitter: false,
                path: MotionPath::Fixed(Point3::new(0.0, 0.0, 0.0)),
            },
        ])
    }
}
