/// Unit tests for shader_module.rs (mock device, mock compiler)

use std::io::Write;

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::mock_context;
use crate::graphics_device::{DescriptorBinding, DescriptorType, ShaderStageFlags};
use crate::shader::{ShaderModule, ShaderStage};

fn write_source(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

// ============================================================================
// LOADING
// ============================================================================

#[test]
fn test_load_injects_header_and_flags() {
    let (device, compiler, context) = mock_context();
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "a.frag", "#version 310 es\nvoid main() {}\n");

    let module = ShaderModule::load(context, &path, ShaderStage::Fragment, &["HAS_TEXTURE"]).unwrap();

    assert_eq!(module.stage(), ShaderStage::Fragment);
    assert_eq!(compiler.compile_count(), 1);
    let source = compiler.sources.lock().unwrap()[0].clone();
    assert_eq!(source, "#version 450\n#define HAS_TEXTURE\nvoid main() {}\n");
    assert_eq!(device.live("shader_module"), 1);
}

#[test]
fn test_load_missing_file_is_compilation_error() {
    let (device, compiler, context) = mock_context();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.vert");

    let err = ShaderModule::load(context, &path, ShaderStage::Vertex, &[] as &[&str]).unwrap_err();
    assert!(matches!(err, Error::ShaderCompilation { .. }));
    assert_eq!(compiler.compile_count(), 0);
    assert_eq!(device.created("shader_module"), 0);
}

#[test]
fn test_compile_failure_creates_nothing() {
    let (device, _compiler, context) = mock_context();
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "bad.vert", "#error nope\n");

    let err = ShaderModule::load(context, &path, ShaderStage::Vertex, &[] as &[&str]).unwrap_err();
    match err {
        Error::ShaderCompilation { path: failed, .. } => assert_eq!(failed, path),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(device.created("shader_module"), 0);
}

// ============================================================================
// LAYOUTS AND DROP
// ============================================================================

#[test]
fn test_layouts_destroyed_before_module() {
    let (device, _compiler, context) = mock_context();
    let mut module = ShaderModule::from_spirv(context, "mesh.frag", ShaderStage::Fragment, &[1, 2]).unwrap();

    let binding = DescriptorBinding {
        binding: 0,
        descriptor_type: DescriptorType::UniformBuffer,
        stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
        count: 1,
    };
    let first = module.add_descriptor_set_layout(&[binding]).unwrap();
    let second = module.add_descriptor_set_layout(&[binding]).unwrap();
    assert_eq!(module.set_layouts(), &[first, second]);

    module.add_push_constant_range(ShaderStageFlags::VERTEX, 0, 64);
    assert_eq!(module.push_constant_ranges().len(), 1);
    // Push ranges are bookkeeping only
    assert_eq!(device.created("pipeline_layout"), 0);

    drop(module);
    let order = device.state().destroy_order.clone();
    assert_eq!(order, vec!["descriptor_set_layout", "descriptor_set_layout", "shader_module"]);
}

#[test]
fn test_from_spirv_rejects_empty_bytecode() {
    let (_device, _compiler, context) = mock_context();
    assert!(ShaderModule::from_spirv(context, "empty", ShaderStage::Vertex, &[]).is_err());
}
