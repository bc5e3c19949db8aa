//! Poll-driven readiness for leaf assets.
//!
//! Every `try_ready_*` is idempotent: once an asset is Ready it returns `true`
//! without touching the engine again. Consumers call it on each dependency every
//! tick and only start their own load once all of them report ready.

use crate::engine::{
    BoundValue, Engine, FactoryRequest, LoadStatus, MaterialBinding, TextureRequest,
};
use crate::world::{LoadState, MaterialId, MeshFactoryId, MeshInstanceId, ShaderVarValue, TextureId, World};

/// Request, poll or confirm a texture.
pub fn try_ready_texture<E: Engine + ?Sized>(world: &mut World, engine: &mut E, id: TextureId) -> bool {
    let texture = world.texture_mut(id);
    match texture.state {
        LoadState::Ready(_) => true,
        LoadState::Unloaded => {
            let request = TextureRequest {
                name: texture.name.clone(),
                file: texture.file.clone(),
                class: texture.class.clone(),
                params: texture.source.clone(),
            };
            texture.state = LoadState::Pending(engine.request_texture(&request));
            log::trace!("Texture '{}' requested", texture.name);
            false
        }
        LoadState::Pending(ticket) => match engine.poll(ticket) {
            LoadStatus::Pending => false,
            LoadStatus::Loaded(handle) => {
                texture.state = LoadState::Ready(Some(handle));
                log::trace!("Texture '{}' ready", texture.name);
                true
            }
            LoadStatus::Failed(message) => {
                log::warn!("Texture '{}' failed to load: {}", texture.name, message);
                texture.state = LoadState::Ready(None);
                true
            }
        },
    }
}

/// Ready once every texture is ready; binding the shader variables happens once,
/// on the call that sees the last texture finish.
pub fn try_ready_material<E: Engine + ?Sized>(world: &mut World, engine: &mut E, id: MaterialId) -> bool {
    if world.material(id).state.is_ready() {
        return true;
    }

    let mut ready = true;
    for i in 0..world.material(id).textures.len() {
        let texture = world.material(id).textures[i];
        ready &= try_ready_texture(world, engine, texture);
    }
    if !ready {
        return false;
    }

    let material = world.material(id);
    let vars = material
        .shader_vars
        .iter()
        .map(|var| {
            let value = match &var.value {
                ShaderVarValue::Texture(name) => BoundValue::Texture(
                    material
                        .textures
                        .iter()
                        .map(|t| world.texture(*t))
                        .find(|t| t.name == *name)
                        .and_then(|t| t.state.handle()),
                ),
                ShaderVarValue::Vector2(v) => BoundValue::Vector2(*v),
            };
            (var.name.clone(), value)
        })
        .collect();
    let binding = MaterialBinding {
        name: material.name.clone(),
        shaders: material.shaders.clone(),
        vars,
    };

    let handle = engine.bind_material(&binding);
    let material = world.material_mut(id);
    material.state = LoadState::Ready(Some(handle));
    log::trace!("Material '{}' bound", material.name);
    true
}

/// Ready once every material is ready and the factory's own load has finished.
pub fn try_ready_factory<E: Engine + ?Sized>(world: &mut World, engine: &mut E, id: MeshFactoryId) -> bool {
    let state = world.factory(id).state;
    match state {
        LoadState::Ready(_) => true,
        LoadState::Unloaded => {
            let mut ready = true;
            for i in 0..world.factory(id).materials.len() {
                let material = world.factory(id).materials[i];
                ready &= try_ready_material(world, engine, material);
            }
            if !ready {
                return false;
            }

            let factory = world.factory(id);
            let request = FactoryRequest {
                name: factory.name.clone(),
                source: factory.source.clone(),
                materials: factory
                    .materials
                    .iter()
                    .map(|m| world.material(*m).state.handle())
                    .collect(),
            };
            let ticket = engine.request_mesh_factory(&request);
            let factory = world.factory_mut(id);
            factory.state = LoadState::Pending(ticket);
            log::trace!("Mesh factory '{}' requested", factory.name);
            false
        }
        LoadState::Pending(ticket) => {
            let factory = world.factory_mut(id);
            match engine.poll(ticket) {
                LoadStatus::Pending => false,
                LoadStatus::Loaded(handle) => {
                    factory.state = LoadState::Ready(Some(handle));
                    log::trace!("Mesh factory '{}' ready", factory.name);
                    true
                }
                LoadStatus::Failed(message) => {
                    log::warn!("Mesh factory '{}' failed to load: {}", factory.name, message);
                    factory.state = LoadState::Ready(None);
                    true
                }
            }
        }
    }
}

/// Bring every dependency of a mesh instance forward, bottom-up. All of them are
/// visited even after one reports not ready.
pub fn try_ready_mesh_dependencies<E: Engine + ?Sized>(
    world: &mut World,
    engine: &mut E,
    id: MeshInstanceId,
) -> bool {
    let mut ready = true;
    for i in 0..world.mesh(id).textures.len() {
        let texture = world.mesh(id).textures[i];
        ready &= try_ready_texture(world, engine, texture);
    }
    for i in 0..world.mesh(id).materials.len() {
        let material = world.mesh(id).materials[i];
        ready &= try_ready_material(world, engine, material);
    }
    for i in 0..world.mesh(id).factories.len() {
        let factory = world.mesh(id).factories[i];
        ready &= try_ready_factory(world, engine, factory);
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogResolver, DocNode};
    use crate::engine::ManualEngine;
    use crate::streaming::config::GfxFeatures;

    fn world(xml: &str) -> (World, ManualEngine) {
        let mut world = World::new();
        let mut engine = ManualEngine::new();
        CatalogResolver::new(GfxFeatures::empty(), ".")
            .ingest(&mut world, &mut engine, &DocNode::parse_str(xml).unwrap())
            .unwrap();
        (world, engine)
    }

    const CHAIN: &str = r#"
        <world>
          <textures><texture name="T1"/><texture name="T2"/></textures>
          <materials>
            <material name="M">
              <texture>T1</texture>
              <shadervar name="tex detail" type="texture">T2</shadervar>
              <shadervar name="scale" type="vector2">1,2</shadervar>
            </material>
          </materials>
          <meshfact name="F"><params><submesh><material>M</material></submesh></params></meshfact>
        </world>"#;

    #[test]
    fn test_texture_request_then_ready() {
        let (mut world, mut engine) = world(CHAIN);
        let t1 = world.find_texture("T1").unwrap();

        assert!(!try_ready_texture(&mut world, &mut engine, t1));
        assert!(!try_ready_texture(&mut world, &mut engine, t1));
        assert_eq!(engine.count("request_texture T1"), 1);

        engine.complete_named("T1");
        assert!(try_ready_texture(&mut world, &mut engine, t1));
        assert!(world.texture(t1).state.handle().is_some());
    }

    #[test]
    fn test_failed_texture_degrades_to_placeholder() {
        let (mut world, mut engine) = world(CHAIN);
        let t1 = world.find_texture("T1").unwrap();
        try_ready_texture(&mut world, &mut engine, t1);
        engine.fail_named("T1", "missing");
        assert!(try_ready_texture(&mut world, &mut engine, t1));
        assert_eq!(world.texture(t1).state, LoadState::Ready(None));
    }

    #[test]
    fn test_material_requests_all_textures() {
        let (mut world, mut engine) = world(CHAIN);
        let m = world.find_material("M").unwrap();

        assert!(!try_ready_material(&mut world, &mut engine, m));
        assert_eq!(engine.count("request_texture T1"), 1);
        assert_eq!(engine.count("request_texture T2"), 1);

        engine.complete_named("T1");
        assert!(!try_ready_material(&mut world, &mut engine, m));
        assert_eq!(engine.count("bind_material M"), 0);

        engine.complete_named("T2");
        assert!(try_ready_material(&mut world, &mut engine, m));
        assert_eq!(engine.count("bind_material M"), 1);
    }

    #[test]
    fn test_material_binds_once() {
        let (mut world, mut engine) = world(CHAIN);
        let m = world.find_material("M").unwrap();
        try_ready_material(&mut world, &mut engine, m);
        engine.complete_all();
        for _ in 0..5 {
            assert!(try_ready_material(&mut world, &mut engine, m));
        }
        assert_eq!(engine.count("bind_material M"), 1);
        let calls = engine.calls.len();
        assert!(try_ready_material(&mut world, &mut engine, m));
        assert_eq!(engine.calls.len(), calls);
    }

    #[test]
    fn test_material_without_textures_binds_immediately() {
        let (mut world, mut engine) = world(r#"<world><materials><material name="plain"/></materials></world>"#);
        let m = world.find_material("plain").unwrap();
        assert!(try_ready_material(&mut world, &mut engine, m));
        assert_eq!(engine.count("bind_material plain"), 1);
    }

    #[test]
    fn test_factory_waits_for_materials() {
        let (mut world, mut engine) = world(CHAIN);
        let f = world.find_factory("F").unwrap();

        assert!(!try_ready_factory(&mut world, &mut engine, f));
        assert_eq!(engine.count("request_factory F"), 0);

        engine.complete_all();
        // Material binds and the factory load goes out on the same call
        assert!(!try_ready_factory(&mut world, &mut engine, f));
        assert_eq!(engine.count("bind_material M"), 1);
        assert_eq!(engine.count("request_factory F"), 1);

        engine.complete_named("F");
        assert!(try_ready_factory(&mut world, &mut engine, f));
        assert!(try_ready_factory(&mut world, &mut engine, f));
        assert_eq!(engine.count("request_factory F"), 1);
    }
}
