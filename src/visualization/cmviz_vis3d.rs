use bevy::math::primitives::{Cuboid, Sphere};
use bevy::prelude::*;

use crate::simulation::scenario::DeformationScene;
use crate::simulation::states::NVec3;

/// Tags the sphere of lattice point `0`, drawn displaced when `1` is true
#[derive(Component)]
struct LatticePoint(pub usize, pub bool);

/// Tags the orbiting camera
#[derive(Component)]
struct OrbitCamera;

/// World-space → screen-space scaling factor for positions and radii
const SCALE3D: f32 = 50.0;

/// Distance of the camera from the origin
const CAMERA_DISTANCE: f32 = 400.0;

pub fn run_3d(scene: DeformationScene) {
    info!("run_3d: starting Bevy 3D viewer with {} lattice points", scene.points().len());

    App::new()
        .insert_resource(scene)
        .add_plugins(DefaultPlugins)
        .add_systems(Startup, setup_3d)
        .add_systems(Update, (orbit_camera_3d, (scale_keys_3d, sync_lattice_3d).chain()))
        .run();
}

fn to_vec3(p: &NVec3) -> Vec3 {
    Vec3::new(p.x as f32, p.y as f32, p.z as f32) * SCALE3D
}

/// Startup system: camera, light, axes and two spheres per lattice point
fn setup_3d(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    scene: Res<DeformationScene>,
) {
    commands.spawn((
        Camera3dBundle {
            camera: Camera {
                clear_color: ClearColorConfig::Custom(Color::srgb(0.07, 0.07, 0.09)),
                ..Default::default()
            },
            transform: Transform::from_xyz(0.0, 0.4 * CAMERA_DISTANCE, CAMERA_DISTANCE).looking_at(Vec3::ZERO, Vec3::Y),
            ..Default::default()
        },
        OrbitCamera,
    ));

    commands.spawn(PointLightBundle {
        point_light: PointLight {
            intensity: 1500.0,
            range: 2000.0,
            ..Default::default()
        },
        transform: Transform::from_xyz(100.0, 200.0, CAMERA_DISTANCE),
        ..Default::default()
    });

    spawn_axes(&mut commands, &mut meshes, &mut materials, scene.extent as f32);

    let radius = 0.03 * scene.extent.max(0.1) as f32 * SCALE3D;
    let original = materials.add(StandardMaterial {
        base_color: Color::srgb(0.45, 0.45, 0.5),
        unlit: true,
        ..Default::default()
    });
    let deformed = materials.add(StandardMaterial {
        base_color: Color::srgb(1.0, 0.75, 0.25),
        unlit: true,
        ..Default::default()
    });
    let mesh = meshes.add(Sphere::new(radius).mesh());

    for (i, (p, q)) in scene.points().iter().enumerate() {
        for (displaced, at, material) in [(false, p, &original), (true, q, &deformed)] {
            commands.spawn((
                PbrBundle {
                    mesh: mesh.clone(),
                    material: material.clone(),
                    transform: Transform::from_translation(to_vec3(at)),
                    ..Default::default()
                },
                LatticePoint(i, displaced),
            ));
        }
    }
}

/// Slow turn around the vertical axis
fn orbit_camera_3d(time: Res<Time>, mut query: Query<&mut Transform, With<OrbitCamera>>) {
    let angle = 0.3 * time.elapsed_seconds();
    for mut transform in &mut query {
        *transform = Transform::from_xyz(
            CAMERA_DISTANCE * angle.sin(),
            0.4 * CAMERA_DISTANCE,
            CAMERA_DISTANCE * angle.cos(),
        )
        .looking_at(Vec3::ZERO, Vec3::Y);
    }
}

/// Up/Down arrows double/halve the displacement scale
fn scale_keys_3d(keys: Res<ButtonInput<KeyCode>>, mut scene: ResMut<DeformationScene>) {
    let factor = if keys.just_pressed(KeyCode::ArrowUp) {
        2.0
    } else if keys.just_pressed(KeyCode::ArrowDown) {
        0.5
    } else {
        return;
    };
    scene.rescale(factor);
    info!(scale = scene.scale, "displacement scale changed");
}

/// Re-place spheres when the scene was rescaled
fn sync_lattice_3d(scene: Res<DeformationScene>, mut query: Query<(&LatticePoint, &mut Transform)>) {
    if !scene.is_changed() {
        return;
    }
    let points = scene.points();
    for (LatticePoint(i, displaced), mut transform) in &mut query {
        if let Some((p, q)) = points.get(*i) {
            transform.translation = to_vec3(if *displaced { q } else { p });
        }
    }
}

// =========================================================================================
// Draw 3D axes for visual reference
// =========================================================================================

fn spawn_axes(commands: &mut Commands, meshes: &mut Assets<Mesh>, materials: &mut Assets<StandardMaterial>, extent: f32) {
    let axis_len = 3.0 * extent * SCALE3D;
    let axis_thickness = 0.01 * extent * SCALE3D;

    let axes = [
        (Vec3::new(axis_len, axis_thickness, axis_thickness), Color::srgb(1.0, 0.3, 0.3)), // x
        (Vec3::new(axis_thickness, axis_len, axis_thickness), Color::srgb(0.35, 0.85, 0.45)), // y
        (Vec3::new(axis_thickness, axis_thickness, axis_len), Color::srgb(0.3, 0.6, 1.0)), // z
    ];
    for (size, color) in axes {
        // Cuboid is centered at its transform origin, so it crosses the world origin
        commands.spawn(PbrBundle {
            mesh: meshes.add(Cuboid::new(size.x, size.y, size.z).mesh()),
            material: materials.add(StandardMaterial {
                base_color: color,
                unlit: true,
                ..Default::default()
            }),
            transform: Transform::IDENTITY,
            ..Default::default()
        });
    }
}
