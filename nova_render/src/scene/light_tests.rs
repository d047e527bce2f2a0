use super::*;

fn point(position: Vec3, radius: f32, intensity: f32) -> Light {
    Light::Point { position, radius, color: Vec3::ONE, intensity }
}

fn unit_box_at(center: Vec3) -> AABB {
    AABB::from_center_half_extent(center, Vec3::splat(0.5))
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_gpu_layout_sizes() {
    assert_eq!(std::mem::size_of::<LightData>(), 64);
    assert_eq!(std::mem::size_of::<LightHeader>(), 16);
}

#[test]
fn test_pack_light_buffer() {
    let lights = [point(Vec3::ZERO, 5.0, 1.0), point(Vec3::X, 2.0, 3.0)];
    let bytes = pack_light_buffer(&lights);

    assert_eq!(bytes.len(), 16 + 2 * 64);
    let header: LightHeader = bytemuck::pod_read_unaligned(&bytes[..16]);
    assert_eq!(header.light_count, 2);
    let second: LightData = bytemuck::pod_read_unaligned(&bytes[16 + 64..]);
    assert_eq!(second.position_radius, [1.0, 0.0, 0.0, 2.0]);
    assert_eq!(second.color_intensity[3], 3.0);
}

#[test]
fn test_spot_data_stores_cosines() {
    let spot = Light::Spot {
        position: Vec3::ZERO,
        direction: Vec3::new(0.0, -2.0, 0.0),
        radius: 10.0,
        inner_angle: 0.0,
        outer_angle: std::f32::consts::FRAC_PI_2,
        color: Vec3::ONE,
        intensity: 1.0,
    };
    let data = spot.to_data();
    assert_eq!(data.direction_type, [0.0, -1.0, 0.0, 2.0]);
    assert!((data.spot_angles[0] - 1.0).abs() < 1e-6);
    assert!(data.spot_angles[1].abs() < 1e-6);
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_directional_light_reaches_everything() {
    let sun = Light::Directional { direction: -Vec3::Y, color: Vec3::ONE, intensity: 0.1 };
    assert!(sun.bounding_aabb().is_infinite());

    let far_box = unit_box_at(Vec3::splat(1.0e5));
    assert_eq!(select_lights([(0, &sun)], &far_box, 4), vec![0]);
}

#[test]
fn test_out_of_range_lights_are_ignored() {
    let near = point(Vec3::new(1.0, 0.0, 0.0), 2.0, 1.0);
    let far = point(Vec3::new(50.0, 0.0, 0.0), 2.0, 100.0);
    let selected = select_lights([(0, &near), (1, &far)], &unit_box_at(Vec3::ZERO), 4);
    assert_eq!(selected, vec![0]);
}

#[test]
fn test_selection_sorted_by_contribution_and_capped() {
    let dim = point(Vec3::new(1.0, 0.0, 0.0), 10.0, 1.0);
    let bright = point(Vec3::new(1.0, 0.0, 0.0), 10.0, 8.0);
    let distant = point(Vec3::new(4.0, 0.0, 0.0), 10.0, 8.0);
    let sun = Light::Directional { direction: -Vec3::Y, color: Vec3::ONE, intensity: 0.1 };
    let lights = [(0, &dim), (1, &bright), (2, &distant), (3, &sun)];

    let selected = select_lights(lights, &unit_box_at(Vec3::ZERO), 3);
    assert_eq!(selected, vec![3, 1, 0]);
}
