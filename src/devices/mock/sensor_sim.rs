//! Simulated reflectance and proximity sensors

use super::config::{ArenaConfig, GridConfig, ProximitySimConfig, ReflectanceSimConfig};
use super::noise::SensorNoise;
use super::physics::SimWorld;
use crate::drivers::ScalarSensor;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Whether the floor point `(x, y)` lies on a grid line.
pub fn on_line(x: f64, y: f64, grid: &GridConfig) -> bool {
    let half = grid.line_width / 2.0;
    let near = |v: f64| {
        let r = v.rem_euclid(grid.line_spacing);
        r <= half || grid.line_spacing - r <= half
    };
    near(x) || near(y)
}

/// Distance from `(x, y)` along `heading` to the arena boundary.
pub fn ray_to_walls(x: f64, y: f64, heading: f64, arena: &ArenaConfig) -> f64 {
    const EPS: f64 = 1e-12;
    let (sin, cos) = heading.to_radians().sin_cos();
    let mut best = f64::INFINITY;

    if cos > EPS {
        best = best.min((arena.max_x - x) / cos);
    } else if cos < -EPS {
        best = best.min((arena.min_x - x) / cos);
    }
    if sin > EPS {
        best = best.min((arena.max_y - y) / sin);
    } else if sin < -EPS {
        best = best.min((arena.min_y - y) / sin);
    }

    best.max(0.0)
}

fn read_failure(channel: &'static str) -> Error {
    Error::Sensor {
        channel,
        message: "simulated read failure".to_string(),
    }
}

/// Downward light sensor behind the rotation centre
pub struct SimReflectance {
    world: Arc<SimWorld>,
    grid: GridConfig,
    config: ReflectanceSimConfig,
    noise: SensorNoise,
}

impl SimReflectance {
    pub fn new(
        world: Arc<SimWorld>,
        grid: GridConfig,
        config: ReflectanceSimConfig,
        noise: SensorNoise,
    ) -> Self {
        Self {
            world,
            grid,
            config,
            noise,
        }
    }
}

impl ScalarSensor for SimReflectance {
    fn read(&mut self) -> Result<f64> {
        if self.noise.read_fails() {
            return Err(read_failure("reflectance"));
        }

        let pose = self.world.pose();
        let (sin, cos) = pose.heading.to_radians().sin_cos();
        let sx = pose.x - self.config.sensor_offset * cos;
        let sy = pose.y - self.config.sensor_offset * sin;

        let level = if on_line(sx, sy, &self.grid) {
            self.config.dark_value
        } else {
            self.config.light_value
        };
        Ok(self.noise.perturb(level))
    }
}

/// Forward-facing ultrasonic sensor
pub struct SimProximity {
    world: Arc<SimWorld>,
    arena: ArenaConfig,
    config: ProximitySimConfig,
    noise: SensorNoise,
}

impl SimProximity {
    pub fn new(
        world: Arc<SimWorld>,
        arena: ArenaConfig,
        config: ProximitySimConfig,
        noise: SensorNoise,
    ) -> Self {
        Self {
            world,
            arena,
            config,
            noise,
        }
    }
}

impl ScalarSensor for SimProximity {
    fn read(&mut self) -> Result<f64> {
        if self.noise.read_fails() {
            return Err(read_failure("proximity"));
        }

        let pose = self.world.pose();
        let (sin, cos) = pose.heading.to_radians().sin_cos();
        let ox = pose.x + self.config.mount_offset * cos;
        let oy = pose.y + self.config.mount_offset * sin;

        let distance = ray_to_walls(ox, oy, pose.heading, &self.arena);
        if distance >= self.config.max_range {
            return Ok(self.config.max_range);
        }
        let reading = self.noise.perturb(distance);
        Ok(reading.clamp(0.0, self.config.max_range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotConfig;
    use crate::devices::mock::config::SimulationConfig;
    use crate::devices::mock::noise::NoiseStream;
    use approx::assert_abs_diff_eq;

    fn world(x: f64, y: f64, heading: f64) -> Arc<SimWorld> {
        let config = SimulationConfig {
            start_x: x,
            start_y: y,
            start_heading: heading,
            ..SimulationConfig::default()
        };
        Arc::new(SimWorld::new(RobotConfig::default(), &config))
    }

    #[test]
    fn test_on_line() {
        let grid = GridConfig::default();
        assert!(on_line(0.1, 7.0, &grid));
        assert!(on_line(7.0, -0.2, &grid));
        assert!(on_line(30.40, 15.0, &grid));
        assert!(on_line(-30.5, 15.0, &grid));
        assert!(!on_line(0.3, 7.0, &grid));
        assert!(!on_line(15.0, 15.0, &grid));
    }

    #[test]
    fn test_ray_to_walls() {
        let arena = ArenaConfig::default();
        assert_abs_diff_eq!(ray_to_walls(-3.0, -4.0, 180.0, &arena), 27.48, epsilon = 1e-9);
        assert_abs_diff_eq!(ray_to_walls(-3.0, -4.0, 270.0, &arena), 26.48, epsilon = 1e-9);
        assert_abs_diff_eq!(ray_to_walls(0.0, 0.0, 0.0, &arena), 274.32, epsilon = 1e-9);
        // Diagonal into the corner hits the nearer wall first
        let d = ray_to_walls(-10.0, -20.0, 225.0, &arena);
        assert_abs_diff_eq!(d, 10.48 * std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    fn exact(stream: NoiseStream) -> SensorNoise {
        SensorNoise::new(1, stream, 0.0, 0.0)
    }

    #[test]
    fn test_reflectance_reading() {
        let config = ReflectanceSimConfig::default();
        // Facing +x at (12, 5): the sensor sits on the y axis line
        let mut on = SimReflectance::new(
            world(12.0, 5.0, 0.0),
            GridConfig::default(),
            config,
            exact(NoiseStream::Reflectance),
        );
        assert_eq!(on.read().unwrap(), 30.0);

        let mut off = SimReflectance::new(
            world(12.0, 5.0, 90.0),
            GridConfig::default(),
            config,
            exact(NoiseStream::Reflectance),
        );
        assert_eq!(off.read().unwrap(), 60.0);
    }

    #[test]
    fn test_proximity_reading() {
        let config = ProximitySimConfig::default();
        let arena = ArenaConfig::default();
        let mut west = SimProximity::new(world(-3.0, -4.0, 180.0), arena, config, exact(NoiseStream::Proximity));
        assert_abs_diff_eq!(west.read().unwrap(), 23.48, epsilon = 1e-9);

        let mut open = SimProximity::new(world(-3.0, -4.0, 45.0), arena, config, exact(NoiseStream::Proximity));
        assert_eq!(open.read().unwrap(), 255.0);
    }

    #[test]
    fn test_noisy_proximity_stays_in_range() {
        let config = ProximitySimConfig::default();
        let mut sensor = SimProximity::new(
            world(-29.0, -4.0, 180.0),
            ArenaConfig::default(),
            config,
            SensorNoise::new(9, NoiseStream::Proximity, 5.0, 0.0),
        );
        for _ in 0..200 {
            let reading = sensor.read().unwrap();
            assert!((0.0..=config.max_range).contains(&reading), "{}", reading);
        }
    }

    #[test]
    fn test_failure_rate() {
        let mut sensor = SimProximity::new(
            world(0.0, 0.0, 0.0),
            ArenaConfig::default(),
            ProximitySimConfig::default(),
            SensorNoise::new(3, NoiseStream::Proximity, 0.0, 1.0),
        );
        assert!(matches!(sensor.read(), Err(Error::Sensor { channel: "proximity", .. })));
    }
}
