use bevy::{
    pbr::wireframe::{Wireframe, WireframeConfig, WireframePlugin},
    prelude::*,
};
use sdf_isosurface::{IsosurfacePlugin, Point, Volume, plugin::SdfVolume};

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            WireframePlugin::default(),
            IsosurfacePlugin::default(),
        ))
        .insert_resource(WireframeConfig {
            global: true,
            ..Default::default()
        })
        .add_systems(Startup, setup)
        .run();
}

fn setup(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    const RESOLUTION: usize = 32;
    let half = (RESOLUTION - 1) as f32 / 2.;

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(half * -1.6, half * 1.8, half * -1.6).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight::default(),
        Transform::from_xyz(4., 8., 4.).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let center = Point::new(half, half, half);
    let sphere = move |p: Point| (p - center).norm() - half / 2.;

    let volume = match Volume::from_fn(RESOLUTION, Point::origin(), 1., &sphere) {
        Ok(volume) => volume,
        Err(err) => {
            error!(%err, "could not sample the sphere");
            return;
        }
    };

    commands.spawn((
        SdfVolume(volume),
        MeshMaterial3d(materials.add(Color::srgb(0.8, 0.5, 0.3))),
        Transform::from_translation(Vec3::splat(-half)),
        Wireframe,
    ));
}
