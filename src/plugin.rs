use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};
use tracing::warn;

use crate::{
    error::Result,
    extract::{ExtractConfig, compute_mesh_with},
    mesh::IsoMesh,
    volume::Volume,
};

/// System sets for the extraction pipeline.
///
/// Order your own systems against these, for example:
///
/// ```rust,ignore
/// // Run after geometry is ready but before it's uploaded, e.g. for collider generation:
/// app.add_systems(Update, build_collider.after(IsosurfaceSet::Generate)
///                                       .before(IsosurfaceSet::Upload));
/// ```
///
/// ```text
/// IsosurfaceSet::Spawn  →  [async compute]  →  IsosurfaceSet::Generate
///                       →  [your systems]   →  IsosurfaceSet::Upload
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsosurfaceSet {
    /// Spawns an async compute task for each queued volume.
    Spawn,
    /// Collects finished extractions as [`GeneratedMesh`].
    Generate,
    /// Turns [`GeneratedMesh`] into a [`Mesh3d`] asset.
    Upload,
}

/// A sampled signed distance field living in the world.
///
/// Replacing the component re-queues the entity when `auto_queue` is enabled.
#[derive(Component, Clone, Debug)]
#[require(Transform)]
pub struct SdfVolume(pub Volume);

/// Marker component added to [`SdfVolume`] entities that are waiting to be meshed.
///
/// Removed once the mesh has been uploaded, or once extraction has failed.
#[derive(Component)]
pub struct QueuedVolume;

/// Holds the in-flight async compute task for an [`SdfVolume`].
#[derive(Component)]
pub struct ComputeTask(Task<Result<IsoMesh>>);

/// The freshly extracted mesh.
///
/// Present between [`IsosurfaceSet::Generate`] and [`IsosurfaceSet::Upload`].
#[derive(Component, Debug)]
pub struct GeneratedMesh(pub IsoMesh);

/// Runtime configuration for the extraction pipeline.
///
/// Inserted as a resource by [`IsosurfacePlugin`]. Modify it at any time to change behaviour:
///
/// ```rust,ignore
/// fn my_system(mut config: ResMut<IsosurfaceConfig>) {
///     config.max_tasks_per_frame = 1;
/// }
/// ```
#[derive(Resource, Debug, Clone)]
pub struct IsosurfaceConfig {
    /// Maximum number of async mesh tasks spawned per frame. Default: `4`.
    pub max_tasks_per_frame: usize,
    /// Options passed to every extraction.
    pub extract: ExtractConfig,
}

impl Default for IsosurfaceConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: 4,
            extract: ExtractConfig::default(),
        }
    }
}

/// Bevy plugin that turns [`SdfVolume`] components into rendered meshes.
///
/// Extraction runs on Bevy's `AsyncComputeTaskPool` so the main thread is never blocked:
///
/// ```text
/// SdfVolume added or replaced
///   → QueuedVolume inserted         (auto_queue feature, or by hand)
///   → ComputeTask spawned           (IsosurfaceSet::Spawn)
///   → [async compute runs]
///   → GeneratedMesh inserted        (IsosurfaceSet::Generate, once task completes)
///   → [your collider systems here]
///   → Mesh3d inserted               (IsosurfaceSet::Upload)
///   → QueuedVolume + GeneratedMesh removed
/// ```
#[derive(Default)]
pub struct IsosurfacePlugin {
    /// Initial value for [`IsosurfaceConfig`].
    pub config: IsosurfaceConfig,
}

impl Plugin for IsosurfacePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .configure_sets(
                Update,
                (
                    IsosurfaceSet::Spawn,
                    IsosurfaceSet::Generate,
                    IsosurfaceSet::Upload,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    spawn_mesh_tasks.in_set(IsosurfaceSet::Spawn),
                    poll_mesh_tasks.in_set(IsosurfaceSet::Generate),
                    upload_mesh.in_set(IsosurfaceSet::Upload),
                ),
            );

        #[cfg(feature = "auto_queue")]
        app.add_systems(Update, on_volume_change.before(IsosurfaceSet::Spawn));
    }
}

/// Converts an [`IsoMesh`] into a Bevy triangle-list [`Mesh`].
///
/// Normals are only inserted when the mesh carries them.
pub fn to_bevy_mesh(mesh: &IsoMesh, usage: RenderAssetUsages) -> Mesh {
    let mut bevy_mesh = Mesh::new(PrimitiveTopology::TriangleList, usage);
    bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, mesh.vertices.clone());
    if !mesh.normals.is_empty() {
        bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, mesh.normals.clone());
    }
    bevy_mesh.insert_indices(Indices::U32(mesh.indices.as_flattened().to_vec()));
    bevy_mesh
}

/// Queues every added or replaced [`SdfVolume`].
#[cfg(feature = "auto_queue")]
fn on_volume_change(mut commands: Commands, query: Query<Entity, Changed<SdfVolume>>) {
    for entity in query.iter() {
        requeue(&mut commands.entity(entity));
    }
}

/// Puts an entity back in the queue, discarding any extraction of an older volume.
///
/// Dropping the [`ComputeTask`] cancels it.
pub fn requeue(entity: &mut EntityCommands) {
    entity
        .remove::<(ComputeTask, GeneratedMesh)>()
        .insert(QueuedVolume);
}

/// Spawns async compute tasks for [`QueuedVolume`]s.
///
/// At most [`IsosurfaceConfig::max_tasks_per_frame`] are started per frame.
fn spawn_mesh_tasks(
    mut commands: Commands,
    config: Res<IsosurfaceConfig>,
    query: Query<
        (Entity, &SdfVolume),
        (With<QueuedVolume>, Without<ComputeTask>, Without<GeneratedMesh>),
    >,
) {
    let task_pool = AsyncComputeTaskPool::get();

    for (entity, volume) in query.iter().take(config.max_tasks_per_frame) {
        // Cloning a Volume only bumps the Arc around its samples.
        let volume = volume.0.clone();
        let extract = config.extract;

        let task = task_pool.spawn(async move { compute_mesh_with(&volume, &extract) });

        commands.entity(entity).insert(ComputeTask(task));
    }
}

/// Checks every [`ComputeTask`] once per frame without blocking.
///
/// A failed extraction is logged and the entity leaves the queue.
fn poll_mesh_tasks(mut commands: Commands, mut query: Query<(Entity, &mut ComputeTask)>) {
    for (entity, mut compute_task) in query.iter_mut() {
        let Some(result) = block_on(future::poll_once(&mut compute_task.0)) else {
            continue;
        };
        let mut entity_commands = commands.entity(entity);
        entity_commands.remove::<ComputeTask>();
        match result {
            Ok(mesh) => {
                entity_commands.insert(GeneratedMesh(mesh));
            }
            Err(err) => {
                warn!(?entity, %err, "iso-surface extraction failed");
                entity_commands.remove::<QueuedVolume>();
            }
        }
    }
}

/// Uploads a [`GeneratedMesh`] into a Bevy [`Mesh3d`] and clears the queue markers.
fn upload_mesh(
    mut commands: Commands,
    query: Query<(Entity, &GeneratedMesh), With<QueuedVolume>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, generated) in query.iter() {
        let bevy_mesh = to_bevy_mesh(&generated.0, RenderAssetUsages::RENDER_WORLD);

        commands
            .entity(entity)
            .insert(Mesh3d(meshes.add(bevy_mesh)))
            .remove::<(GeneratedMesh, QueuedVolume)>();
    }
}

#[cfg(test)]
mod tests {
    use bevy::tasks::TaskPool;

    use super::*;

    #[test]
    fn converts_to_a_triangle_list() {
        let mesh = IsoMesh {
            vertices: vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [1., 1., 0.]],
            normals: vec![[0., 0., 1.]; 4],
            indices: vec![[0, 1, 2], [2, 1, 3]],
        };
        let bevy_mesh = to_bevy_mesh(&mesh, RenderAssetUsages::default());
        assert_eq!(bevy_mesh.primitive_topology(), PrimitiveTopology::TriangleList);
        assert_eq!(bevy_mesh.count_vertices(), 4);
    }

    fn stale_entity(world: &mut World) -> Entity {
        let volume = Volume::new(2, vec![-1., 1., 1., 1., 1., 1., 1., 1.]).unwrap();
        let pool = AsyncComputeTaskPool::get_or_init(TaskPool::new);
        let task = pool.spawn(async { Ok(IsoMesh::default()) });
        world
            .spawn((
                SdfVolume(volume),
                QueuedVolume,
                ComputeTask(task),
                GeneratedMesh(IsoMesh::default()),
            ))
            .id()
    }

    #[test]
    fn requeue_discards_older_extractions() {
        let mut world = World::new();
        let entity = stale_entity(&mut world);

        requeue(&mut world.commands().entity(entity));
        world.flush();

        assert!(world.get::<ComputeTask>(entity).is_none());
        assert!(world.get::<GeneratedMesh>(entity).is_none());
        assert!(world.get::<QueuedVolume>(entity).is_some());
    }

    #[cfg(feature = "auto_queue")]
    #[test]
    fn replaced_volumes_are_meshed_again() {
        let mut world = World::new();
        let entity = stale_entity(&mut world);

        let mut schedule = Schedule::default();
        schedule.add_systems(on_volume_change);
        schedule.run(&mut world);

        assert!(world.get::<ComputeTask>(entity).is_none());
        assert!(world.get::<GeneratedMesh>(entity).is_none());
        assert!(world.get::<QueuedVolume>(entity).is_some());
    }

    #[test]
    fn default_config_throttles_tasks() {
        let config = IsosurfaceConfig::default();
        assert_eq!(config.max_tasks_per_frame, 4);
        assert!(config.extract.parallel);
    }
}
