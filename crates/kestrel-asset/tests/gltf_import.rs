use {
    kestrel_asset::{
        codec::BinSkeletalAnimation, json::MeshDoc, json::SceneDoc, json::SkeletonDoc,
        AnimationSampler, BinGeometry, GltfImporter, GltfList, ImportLogger,
    },
    std::path::Path,
};

fn put_f32(bytes: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
}

fn put_u16(bytes: &mut Vec<u8>, values: &[u16]) {
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
}

/// One skinned triangle over a three-joint chain (0 -> 1 -> 2), one
/// translation animation on the tip joint, one scene instantiating it.
fn write_test_gltf(dir: &Path) -> std::path::PathBuf {
    let mut buffer = Vec::new();
    // positions @ 0
    put_f32(&mut buffer, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    // joints @ 36
    put_u16(&mut buffer, &[0, 1, 0, 0, 1, 2, 0, 0, 2, 0, 0, 0]);
    // weights @ 60
    put_f32(
        &mut buffer,
        &[
            0.5, 0.5, 0.0, 0.0, //
            0.5, 0.5, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0,
        ],
    );
    // inverse bind matrices @ 108 (three identities)
    for _ in 0..3 {
        for column in 0..4 {
            for row in 0..4 {
                put_f32(&mut buffer, &[if row == column { 1.0 } else { 0.0 }]);
            }
        }
    }
    // animation input @ 300
    put_f32(&mut buffer, &[0.0, 1.0]);
    // animation output @ 308
    put_f32(&mut buffer, &[0.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    assert_eq!(buffer.len(), 332);
    std::fs::write(dir.join("buffer.bin"), &buffer).unwrap();

    let gltf = serde_json::json!({
        "asset": { "version": "2.0" },
        "buffers": [{ "uri": "buffer.bin", "byteLength": 332 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 60, "byteLength": 48 },
            { "buffer": 0, "byteOffset": 108, "byteLength": 192 },
            { "buffer": 0, "byteOffset": 300, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 308, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4" },
            { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 3, "componentType": 5126, "count": 3, "type": "MAT4" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "meshes": [{
            "name": "blob",
            "primitives": [{
                "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }
            }]
        }],
        "skins": [{ "name": "rig", "joints": [0, 1, 2], "inverseBindMatrices": 3 }],
        "nodes": [
            { "name": "root", "children": [1] },
            { "name": "mid", "children": [2] },
            { "name": "tip" },
            { "name": "body", "mesh": 0, "skin": 0 }
        ],
        "animations": [{
            "name": "wave",
            "samplers": [{ "input": 4, "output": 5, "interpolation": "LINEAR" }],
            "channels": [{ "sampler": 0, "target": { "node": 2, "path": "translation" } }]
        }],
        "scenes": [{ "name": "main", "nodes": [3, 0] }],
        "scene": 0
    });
    let path = dir.join("test.gltf");
    std::fs::write(&path, serde_json::to_string_pretty(&gltf).unwrap()).unwrap();
    path
}

#[test]
fn peek_lists_meshes_and_scenes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_gltf(dir.path());
    let list = GltfList::peek(&path, &ImportLogger::default()).unwrap();

    assert_eq!(list.meshes.len(), 1);
    assert_eq!(list.meshes[0].name, "blob");
    assert!(list.meshes[0].skinned);
    assert_eq!(list.scenes.len(), 1);
    assert_eq!(list.scenes[0].name, "main");
}

#[test]
fn peek_rejects_missing_files() {
    assert!(GltfList::peek(Path::new("/nonexistent/x.gltf"), &ImportLogger::default()).is_err());
}

#[test]
fn skinned_mesh_import_emits_full_asset_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_gltf(dir.path());
    let dest = dir.path().join("out");

    let mut importer = GltfImporter::new(&path, &dest, true, ImportLogger::default()).unwrap();
    let mesh_uri = importer.import_mesh(0).unwrap();
    assert_eq!(mesh_uri.as_str(), "blob.mesh_0.json");

    // Mesh manifest: skinned, one primitive, three inverse bind matrices.
    let mesh_doc: MeshDoc =
        serde_json::from_slice(&std::fs::read(dest.join("blob.mesh_0.json")).unwrap()).unwrap();
    assert_eq!(mesh_doc.kind, "skinned");
    assert_eq!(mesh_doc.primitives.len(), 1);
    assert_eq!(mesh_doc.inverse_bind_matrices.len(), 3);
    let skeleton_uri = mesh_doc.skeleton.unwrap();
    assert_eq!(skeleton_uri.as_str(), "rig.skeleton_0.json");

    // Geometry payload round-trips with joint data.
    let geometry_bytes =
        std::fs::read(dest.join(mesh_doc.primitives[0].geometry.as_str())).unwrap();
    let bin = BinGeometry::from_bytes(&geometry_bytes).unwrap();
    assert_eq!(bin.geometry.vertex_count(), 3);
    assert_eq!(bin.joints.joints.len(), 3);
    assert_eq!(bin.joints.joints[1], [1, 2, 0, 0]);

    // Skeleton: dense joints preserving the 0 -> 1 -> 2 chain.
    let skeleton_doc: SkeletonDoc =
        serde_json::from_slice(&std::fs::read(dest.join(skeleton_uri.as_str())).unwrap()).unwrap();
    let skeleton = skeleton_doc.into_skeleton().unwrap();
    assert_eq!(skeleton.joints.len(), 3);
    assert_eq!(skeleton.joints[0].parent, None);
    assert_eq!(skeleton.joints[1].parent, Some(0));
    assert_eq!(skeleton.joints[2].parent, Some(1));
    assert_eq!(skeleton.joints[0].children, vec![1]);
    assert_eq!(skeleton.animation_uris.len(), 1);

    // Animation: exactly one translate sampler targeting joint 2.
    let animation_bytes =
        std::fs::read(dest.join(skeleton.animation_uris[0].as_str())).unwrap();
    let animation = BinSkeletalAnimation::from_bytes(&animation_bytes)
        .unwrap()
        .into_animation();
    assert_eq!(animation.name, "wave");
    assert_eq!(animation.samplers.len(), 1);
    assert_eq!(animation.target_joints, vec![2]);
    match &animation.samplers[0] {
        AnimationSampler::Translate(interpolator) => {
            assert_eq!(interpolator.keyframes.len(), 2);
            assert_eq!(interpolator.keyframes[1].value.y, 2.0);
        }
        other => panic!("expected a translate sampler, got {other:?}"),
    }
}

#[test]
fn scene_import_reconstructs_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_gltf(dir.path());
    let dest = dir.path().join("out");

    let mut importer = GltfImporter::new(&path, &dest, true, ImportLogger::default()).unwrap();
    let scene_uri = importer.import_scene(0).unwrap();
    let scene_doc: SceneDoc =
        serde_json::from_slice(&std::fs::read(dest.join(scene_uri.as_str())).unwrap()).unwrap();

    // body + root + mid + tip
    assert_eq!(scene_doc.nodes.len(), 4);
    assert_eq!(scene_doc.roots.len(), 2);
    assert_eq!(scene_doc.entities.len(), 1);
    let entity = &scene_doc.entities[0];
    let renderer = entity.renderer.as_ref().unwrap();
    assert_eq!(renderer["type"], "skinned_mesh_renderer");
    assert_eq!(renderer["mesh"], "blob.mesh_0.json");

    // The mesh node carries the entity; hierarchy ids are consistent.
    let body = scene_doc.nodes.iter().find(|node| node.name == "body").unwrap();
    assert_eq!(body.entity, entity.id);
    let root = scene_doc.nodes.iter().find(|node| node.name == "root").unwrap();
    let mid = scene_doc.nodes.iter().find(|node| node.name == "mid").unwrap();
    assert_eq!(root.children, vec![mid.id]);
    assert_eq!(mid.parent, root.id);
}

#[test]
fn existing_outputs_are_reused_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_gltf(dir.path());
    let dest = dir.path().join("out");

    let mut importer = GltfImporter::new(&path, &dest, false, ImportLogger::default()).unwrap();
    importer.import_mesh(0).unwrap();
    let manifest = dest.join("blob.mesh_0.json");
    let first_mtime = std::fs::metadata(&manifest).unwrap().modified().unwrap();

    // A second importer over the same destination leaves files alone.
    let mut importer = GltfImporter::new(&path, &dest, false, ImportLogger::default()).unwrap();
    importer.import_mesh(0).unwrap();
    assert_eq!(std::fs::metadata(&manifest).unwrap().modified().unwrap(), first_mtime);
}
