//! CPU versions of the compute kernels
//!
//! NOTE: These are reference implementations for documentation and testing.
//! The simulation itself runs `physics_step.wgsl` and `draw_info.wgsl` on the GPU; the GPU
//! integration tests compare their output against these functions.

use glam::Vec2;

use crate::constants::*;
use crate::draw_info::DrawInfo;
use crate::particle::Particle;

/// Advance one particle by `dt` seconds.
///
/// Empty slots are returned unchanged. With `dt == 0.0` every particle is returned unchanged.
pub fn integrate(particle: &Particle, dt: f32) -> Particle {
    if particle.is_empty() {
        return *particle;
    }

    let velocity = particle.velocity();
    let position = particle.position() + velocity * dt;
    let damping = (-DRAG * dt / particle.mass).exp();

    Particle {
        position: position.to_array(),
        velocity: (velocity * damping).to_array(),
        radius: (particle.radius - SHRINK_RATE * dt).max(0.0),
        ..*particle
    }
}

/// Build the quad description the renderer draws for one particle.
pub fn draw_info(particle: &Particle) -> DrawInfo {
    let velocity = particle.velocity();
    let alpha = if particle.is_empty() {
        0.0
    } else {
        (particle.radius / DEFAULT_RADIUS).clamp(0.0, 1.0)
    };
    let scale = if particle.is_empty() {
        0.0
    } else {
        particle.radius * PIXELS_PER_RADIUS
    };

    let hue = fract(particle.seed);
    let [r, g, b] = hue_to_rgb(hue);
    let [hr, hg, hb] = hue_to_rgb(fract(hue + HALO_HUE_SHIFT));

    DrawInfo {
        position: particle.position,
        rotation: if velocity == Vec2::ZERO {
            0.0
        } else {
            velocity.y.atan2(velocity.x)
        },
        scale,
        color: [r, g, b, alpha],
        halo: [hr, hg, hb, alpha * HALO_ALPHA],
        motion: [velocity.x, velocity.y, velocity.length(), particle.seed],
    }
}

/// Fully saturated, full value HSV color for `hue` in [0, 1).
pub fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue * 6.0;
    [
        ((h - 3.0).abs() - 1.0).clamp(0.0, 1.0),
        (2.0 - (h - 2.0).abs()).clamp(0.0, 1.0),
        (2.0 - (h - 4.0).abs()).clamp(0.0, 1.0),
    ]
}

// WGSL's fract, which stays in [0, 1) for negative inputs unlike `f32::fract`
fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Run [`integrate`] over a whole particle region, as one physics dispatch would.
pub fn integrate_all(particles: &[Particle], dt: f32) -> Vec<Particle> {
    particles.iter().map(|p| integrate(p, dt)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_integrate_moves_by_velocity() {
        let particle = Particle::new(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.5);
        let next = integrate(&particle, 0.1);
        assert!(approx_eq(next.position[0], 0.1));
        assert!(approx_eq(next.position[1], 0.0));
        assert!(next.velocity[0] < 1.0);
        assert!(approx_eq(next.radius, DEFAULT_RADIUS - SHRINK_RATE * 0.1));
        assert_eq!(next.seed, particle.seed);
        assert_eq!(next.mass, particle.mass);
    }

    #[test]
    fn test_integrate_zero_delta_is_identity() {
        let particle = Particle::new(Vec2::new(10.0, -5.0), Vec2::new(-3.0, 7.0), 0.9);
        assert_eq!(integrate(&particle, 0.0), particle);
    }

    #[test]
    fn test_integrate_skips_empty_slots() {
        let empty = Particle::default();
        assert_eq!(integrate(&empty, 1.0), empty);
    }

    #[test]
    fn test_radius_never_negative() {
        let particle = Particle::new(Vec2::ZERO, Vec2::ZERO, 0.0);
        let next = integrate(&particle, 100.0);
        assert_eq!(next.radius, 0.0);
        assert_eq!(draw_info(&next).color[3], 0.0);
    }

    #[test]
    fn test_draw_info_for_fresh_particle() {
        let particle = Particle::new(Vec2::new(4.0, 5.0), Vec2::new(0.0, 2.0), 0.0);
        let info = draw_info(&particle);
        assert_eq!(info.position, [4.0, 5.0]);
        assert!(approx_eq(info.rotation, std::f32::consts::FRAC_PI_2));
        assert!(approx_eq(info.scale, DEFAULT_RADIUS * PIXELS_PER_RADIUS));
        assert_eq!(info.color, [1.0, 0.0, 0.0, 1.0]);
        assert!(approx_eq(info.halo[3], HALO_ALPHA));
        assert_eq!(info.motion, [0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_draw_info_hides_empty_slots() {
        let info = draw_info(&Particle::default());
        assert_eq!(info.scale, 0.0);
        assert_eq!(info.color[3], 0.0);
        assert_eq!(info.halo[3], 0.0);
    }

    #[test]
    fn test_resting_particle_has_zero_rotation() {
        let particle = Particle::new(Vec2::new(1.0, 2.0), Vec2::ZERO, 0.3);
        assert_eq!(draw_info(&particle).rotation, 0.0);
        assert_eq!(draw_info(&Particle::default()).rotation, 0.0);
        let negative_zero = Particle::new(Vec2::ZERO, Vec2::new(-0.0, 0.0), 0.3);
        assert_eq!(draw_info(&negative_zero).rotation, 0.0);
    }

    #[test]
    fn test_integrate_all_maps_each_slot() {
        let particles = [
            Particle::new(Vec2::ZERO, Vec2::new(2.0, 0.0), 0.1),
            Particle::default(),
        ];
        let stepped = integrate_all(&particles, 0.5);
        assert_eq!(stepped.len(), 2);
        assert_eq!(stepped[0], integrate(&particles[0], 0.5));
        assert_eq!(stepped[1], Particle::default());
    }

    #[test]
    fn test_hue_ramp() {
        assert_eq!(hue_to_rgb(0.0), [1.0, 0.0, 0.0]);
        for (hue, expected) in [(1.0 / 3.0, [0.0, 1.0, 0.0]), (2.0 / 3.0, [0.0, 0.0, 1.0])] {
            let rgb = hue_to_rgb(hue);
            assert!(rgb.iter().zip(expected).all(|(a, b)| approx_eq(*a, b)));
        }
    }
}
