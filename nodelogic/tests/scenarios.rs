//! End-to-end scenarios exercising the engine through its public API
//! only: scripts wired together by links, a binding attached to a
//! mock renderer object, cycle rejection, per-node error isolation,
//! and a save/load round trip.

use glam::Vec3;
use nodelogic::binding::{RenderNodeHandle, RotationConvention};
use nodelogic::{EngineError, LogicEngine, PropertyValue};

const ECHO_PLUS_ONE: &str = r#"
function interface(IN, OUT)
    IN.a = Type:Int32()
    OUT.b = Type:Int32()
end

function run(IN, OUT)
    OUT.b = IN.a + 1
end
"#;

const STRUCT_ECHO: &str = r#"
function interface(IN, OUT)
    IN.inVal = Type:Struct({ {x = Type:Int32()}, {y = Type:Float()} })
    OUT.outVal = Type:Struct({ {x = Type:Int32()}, {y = Type:Float()} })
end

function run(IN, OUT)
    OUT.outVal = IN.inVal
end
"#;

const FAILING_SCRIPT: &str = r#"
function interface(IN, OUT)
    OUT.b = Type:Int32()
end

function run(IN, OUT)
    error("boom")
end
"#;

fn int32(engine: &LogicEngine, id: nodelogic::PropertyId) -> i32 {
    match engine.properties().get(id).unwrap().get_value() {
        Some(PropertyValue::Int32(v)) => *v,
        other => panic!("expected Int32, got {other:?}"),
    }
}

fn float(engine: &LogicEngine, id: nodelogic::PropertyId) -> f32 {
    match engine.properties().get(id).unwrap().get_value() {
        Some(PropertyValue::Float(v)) => *v,
        other => panic!("expected Float, got {other:?}"),
    }
}

#[test]
fn primitive_pipeline() {
    let mut engine = LogicEngine::new();
    let s1 = engine.create_script("S1", ECHO_PLUS_ONE, &[]).unwrap();
    let s2 = engine.create_script("S2", ECHO_PLUS_ONE, &[]).unwrap();

    let s1_out = engine.node(s1).unwrap().output_root().unwrap();
    let s1_in = engine.node(s1).unwrap().input_root().unwrap();
    let s2_in = engine.node(s2).unwrap().input_root().unwrap();

    let s1_b = engine.properties().get(s1_out).unwrap().get_child_by_name("b").unwrap();
    let s2_a = engine.properties().get(s2_in).unwrap().get_child_by_name("a").unwrap();
    engine.link(s1_b, s2_a).unwrap();

    let s1_a = engine.properties().get(s1_in).unwrap().get_child_by_name("a").unwrap();
    engine
        .properties_mut()
        .get_mut(s1_a)
        .unwrap()
        .manual_set(PropertyValue::Int32(40))
        .unwrap();

    engine.update(0);
    assert!(engine.get_errors().is_empty());

    let s2_out = engine.node(s2).unwrap().output_root().unwrap();
    let s2_b = engine.properties().get(s2_out).unwrap().get_child_by_name("b").unwrap();
    assert_eq!(int32(&engine, s2_b), 42);
}

#[test]
fn struct_propagation() {
    let mut engine = LogicEngine::new();
    let s1 = engine.create_script("S1", STRUCT_ECHO, &[]).unwrap();
    let s2 = engine.create_script("S2", STRUCT_ECHO, &[]).unwrap();

    let s1_out = engine.node(s1).unwrap().output_root().unwrap();
    let s1_out_val = engine.properties().get(s1_out).unwrap().get_child_by_name("outVal").unwrap();
    let s2_in = engine.node(s2).unwrap().input_root().unwrap();
    let s2_in_val = engine.properties().get(s2_in).unwrap().get_child_by_name("inVal").unwrap();
    engine.link(s1_out_val, s2_in_val).unwrap();

    let s1_in = engine.node(s1).unwrap().input_root().unwrap();
    let s1_in_val = engine.properties().get(s1_in).unwrap().get_child_by_name("inVal").unwrap();
    let s1_x = engine.properties().get(s1_in_val).unwrap().get_child_by_name("x").unwrap();
    let s1_y = engine.properties().get(s1_in_val).unwrap().get_child_by_name("y").unwrap();
    engine.properties_mut().get_mut(s1_x).unwrap().manual_set(PropertyValue::Int32(7)).unwrap();
    engine.properties_mut().get_mut(s1_y).unwrap().manual_set(PropertyValue::Float(1.5)).unwrap();

    engine.update(0);
    assert!(engine.get_errors().is_empty());

    let s2_out = engine.node(s2).unwrap().output_root().unwrap();
    let s2_out_val = engine.properties().get(s2_out).unwrap().get_child_by_name("outVal").unwrap();
    let s2_x = engine.properties().get(s2_out_val).unwrap().get_child_by_name("x").unwrap();
    let s2_y = engine.properties().get(s2_out_val).unwrap().get_child_by_name("y").unwrap();
    assert_eq!(int32(&engine, s2_x), 7);
    assert_eq!(float(&engine, s2_y), 1.5);
}

struct RecordingNode {
    translation: std::rc::Rc<std::cell::RefCell<Vec3>>,
}
impl RenderNodeHandle for RecordingNode {
    fn set_visibility(&mut self, _: bool) -> Result<(), String> {
        Ok(())
    }
    fn set_rotation_euler(&mut self, _: Vec3, _: RotationConvention) -> Result<(), String> {
        Ok(())
    }
    fn set_rotation_quaternion(&mut self, _: glam::Vec4) -> Result<(), String> {
        Ok(())
    }
    fn set_translation(&mut self, t: Vec3) -> Result<(), String> {
        *self.translation.borrow_mut() = t;
        Ok(())
    }
    fn set_scaling(&mut self, _: Vec3) -> Result<(), String> {
        Ok(())
    }
}

#[test]
fn binding_default_preservation() {
    let mut engine = LogicEngine::new();
    let binding = engine.create_node_binding("nb", RotationConvention::EulerXYZ);
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec3::new(9.0, 9.0, 9.0)));
    engine
        .attach_node_binding(binding, Box::new(RecordingNode { translation: seen.clone() }))
        .unwrap();

    // Nothing was ever `manual_set`, so the first pass must not push
    // any field even though the node runs (header starts dirty).
    engine.update(0);
    assert!(engine.get_errors().is_empty());
    assert_eq!(*seen.borrow(), Vec3::new(9.0, 9.0, 9.0));

    let input_root = engine.node(binding).unwrap().input_root().unwrap();
    let translation_id = engine.properties().get(input_root).unwrap().get_child_by_name("translation").unwrap();
    engine
        .properties_mut()
        .get_mut(translation_id)
        .unwrap()
        .manual_set(PropertyValue::Vec3f(Vec3::new(1.0, 2.0, 3.0)))
        .unwrap();
    engine.update(0);
    assert!(engine.get_errors().is_empty());
    assert_eq!(*seen.borrow(), Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn cycle_rejection() {
    let mut engine = LogicEngine::new();
    let a = engine.create_script("A", ECHO_PLUS_ONE, &[]).unwrap();
    let b = engine.create_script("B", ECHO_PLUS_ONE, &[]).unwrap();
    let c = engine.create_script("C", ECHO_PLUS_ONE, &[]).unwrap();

    let out = |engine: &LogicEngine, id| {
        let root = engine.node(id).unwrap().output_root().unwrap();
        engine.properties().get(root).unwrap().get_child_by_name("b").unwrap()
    };
    let inp = |engine: &LogicEngine, id| {
        let root = engine.node(id).unwrap().input_root().unwrap();
        engine.properties().get(root).unwrap().get_child_by_name("a").unwrap()
    };

    engine.link(out(&engine, a), inp(&engine, b)).unwrap();
    engine.link(out(&engine, b), inp(&engine, c)).unwrap();
    let result = engine.link(out(&engine, c), inp(&engine, a));
    assert!(matches!(result, Err(EngineError::Cycle { .. })));

    assert!(engine.is_linked(inp(&engine, b)));
    assert!(engine.is_linked(inp(&engine, c)));
    assert!(!engine.is_linked(inp(&engine, a)));
}

#[test]
fn script_error_isolation() {
    let mut engine = LogicEngine::new();
    let failing = engine.create_script("Failing", FAILING_SCRIPT, &[]).unwrap();
    let ok = engine.create_script("Ok", ECHO_PLUS_ONE, &[]).unwrap();

    let ok_in = engine.node(ok).unwrap().input_root().unwrap();
    let ok_a = engine.properties().get(ok_in).unwrap().get_child_by_name("a").unwrap();
    engine.properties_mut().get_mut(ok_a).unwrap().manual_set(PropertyValue::Int32(1)).unwrap();

    engine.update(0);
    let errors = engine.get_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, failing);
    assert!(matches!(errors[0].1, EngineError::RuntimeError { .. }));

    let ok_out = engine.node(ok).unwrap().output_root().unwrap();
    let ok_b = engine.properties().get(ok_out).unwrap().get_child_by_name("b").unwrap();
    assert_eq!(int32(&engine, ok_b), 2);
}

#[test]
fn save_load_identity() {
    let mut engine = LogicEngine::new();
    let s1 = engine.create_script("S1", ECHO_PLUS_ONE, &[]).unwrap();
    let s2 = engine.create_script("S2", ECHO_PLUS_ONE, &[]).unwrap();
    let s1_out = engine.node(s1).unwrap().output_root().unwrap();
    let s1_b = engine.properties().get(s1_out).unwrap().get_child_by_name("b").unwrap();
    let s2_in = engine.node(s2).unwrap().input_root().unwrap();
    let s2_a = engine.properties().get(s2_in).unwrap().get_child_by_name("a").unwrap();
    engine.link(s1_b, s2_a).unwrap();

    let s1_in = engine.node(s1).unwrap().input_root().unwrap();
    let s1_a = engine.properties().get(s1_in).unwrap().get_child_by_name("a").unwrap();
    engine.properties_mut().get_mut(s1_a).unwrap().manual_set(PropertyValue::Int32(40)).unwrap();

    let path = std::env::temp_dir().join(format!("nodelogic-scenario-{}.bin", std::process::id()));
    engine.save_to_file(&path).unwrap();

    let mut loaded = LogicEngine::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    loaded.update(0);
    assert!(loaded.get_errors().is_empty());

    let s2 = loaded.find_by_name("S2").unwrap();
    let s2_out = loaded.node(s2).unwrap().output_root().unwrap();
    let s2_b = loaded.properties().get(s2_out).unwrap().get_child_by_name("b").unwrap();
    assert_eq!(int32(&loaded, s2_b), 42);
}

const PLUS_ONE_MODULE: &str = r#"
local M = {}
function M.plusOne(x)
    return x + 1
end
return M
"#;

const DOUBLE_MODULE: &str = r#"
local M = {}
function M.double(x)
    return x * 2
end
return M
"#;

const USES_BOTH_MODULES: &str = r#"
function interface(IN, OUT)
    IN.a = Type:Int32()
    OUT.b = Type:Int32()
end

function run(IN, OUT)
    OUT.b = Double.double(PlusOne.plusOne(IN.a))
end
"#;

// A module can only import an already-registered module, so the import
// graph is a DAG by construction: there is no sequence of `create_module`
// calls through the public API that forms a cycle (see
// `nodelogic::script::module::would_cycle`'s own unit tests for the
// cycle-detection algorithm itself). This instead exercises the same
// import-resolution path end to end: two independent modules imported
// by one script under local bind names, and the unknown-import failure
// that resolution hits on the way there.
#[test]
fn module_imports_resolve_end_to_end() {
    let mut engine = LogicEngine::new();
    assert!(matches!(
        engine.create_script("Bad", USES_BOTH_MODULES, &["NoSuchModule"]),
        Err(EngineError::InterfaceError { .. })
    ));

    engine.create_module("PlusOne", PLUS_ONE_MODULE, &[]).unwrap();
    engine.create_module("Double", DOUBLE_MODULE, &[]).unwrap();
    let script = engine
        .create_script("UsesBoth", USES_BOTH_MODULES, &["PlusOne", "Double"])
        .unwrap();

    let in_root = engine.node(script).unwrap().input_root().unwrap();
    let a = engine.properties().get(in_root).unwrap().get_child_by_name("a").unwrap();
    engine.properties_mut().get_mut(a).unwrap().manual_set(PropertyValue::Int32(4)).unwrap();

    engine.update(0);
    assert!(engine.get_errors().is_empty());

    let out_root = engine.node(script).unwrap().output_root().unwrap();
    let b = engine.properties().get(out_root).unwrap().get_child_by_name("b").unwrap();
    assert_eq!(int32(&engine, b), 10);
}
