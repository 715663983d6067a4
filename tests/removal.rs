//! End-to-end removal scenarios.
//!
//! Every test builds a small archive from synthesized classes, runs it through
//! [`CodeRemover::process_bytes`] and inspects the reloaded output.

use coderemover::{
    classfile::builder::MethodBuilder,
    instruction::{net_stack_effect, Constant, FieldOp, Instruction, PopKind},
    prelude::*,
    registry::record::OBJECT,
};
use std::collections::HashSet;

fn jar(builders: Vec<ClassBuilder>) -> Vec<u8> {
    let entries = builders.into_iter().map(|builder| {
        let record = builder.into_record(DEFAULT_MARKER).unwrap();
        let bytes = write_class(&record).unwrap();
        (format!("{}.class", record.name), bytes)
    });
    let registry = Registry::build(entries, &LoadOptions::default()).unwrap();
    archive::store_to_mem(&registry).unwrap()
}

fn run_with(config: RemoverConfig, input: &[u8]) -> (Registry, RemovalResult) {
    let remover = CodeRemover::new(config);
    let (output, result) = remover.process_bytes(input).unwrap();
    let registry = archive::load_from_mem(&output, &LoadOptions::default()).unwrap();
    (registry, result)
}

fn run(builders: Vec<ClassBuilder>) -> (Registry, RemovalResult) {
    run_with(RemoverConfig::default(), &jar(builders))
}

fn body(class: &ClassRecord, name: &str, descriptor: &str) -> Vec<Instruction> {
    class
        .method(name, descriptor)
        .and_then(|method| method.code.as_ref())
        .map(|code| code.instructions().cloned().collect())
        .unwrap_or_default()
}

fn all_instructions(registry: &Registry) -> Vec<Instruction> {
    registry
        .classes()
        .flat_map(|class| class.methods.iter())
        .filter_map(|method| method.code.as_ref())
        .flat_map(|code| code.instructions().cloned())
        .collect()
}

fn names_in(insn: &Instruction) -> Vec<&str> {
    match insn {
        Instruction::FieldAccess(field) => vec![field.owner.as_str()],
        Instruction::MethodCall(call) => vec![call.owner.as_str()],
        Instruction::TypeReference(insn) => vec![insn.name.as_str()],
        _ => Vec::new(),
    }
}

fn object_constructor(builder: ClassBuilder, owner: &str) -> MethodBuilder {
    builder
        .method("<init>", "()V")
        .aload(0)
        .invoke_special(owner, "<init>", "()V")
}

#[test]
fn removed_superclass_is_replaced_by_its_parent() {
    let (registry, result) = run(vec![
        ClassBuilder::new("p/A").marked(true),
        ClassBuilder::new("p/B").super_name("p/A"),
    ]);

    assert!(!registry.contains("p/A"));
    let b = registry.get("p/B").unwrap();
    assert_eq!(b.super_name.as_deref(), Some(OBJECT));
    assert_eq!(result.events.count(EventKind::ClassRemoved), 1);
    assert_eq!(result.events.count(EventKind::SuperclassChanged), 1);
}

#[test]
fn constant_field_assignment_disappears() {
    let (registry, _) = run(vec![object_constructor(
        ClassBuilder::new("p/C").field("f", "I").marked(true).done(),
        OBJECT,
    )
    .aload(0)
    .iconst(5)
    .put_field("p/C", "f", "I")
    .vreturn()
    .done()]);

    let c = registry.get("p/C").unwrap();
    assert!(c.field("f", "I").is_none());

    let insns = body(c, "<init>", "()V");
    assert_eq!(insns.len(), 3);
    assert!(!insns
        .iter()
        .any(|insn| matches!(insn, Instruction::ConstantPush(Constant::Int(5)))));
    assert!(!insns
        .iter()
        .any(|insn| matches!(insn, Instruction::FieldAccess(field) if field.name == "f")));
}

#[test]
fn computed_field_assignment_keeps_the_call() {
    let (registry, result) = run(vec![object_constructor(
        ClassBuilder::new("p/C")
            .field("f", "I")
            .marked(true)
            .done()
            .method("computeSomething", "()I")
            .iconst(42)
            .ireturn()
            .done(),
        OBJECT,
    )
    .aload(0)
    .aload(0)
    .invoke_virtual("p/C", "computeSomething", "()I")
    .put_field("p/C", "f", "I")
    .vreturn()
    .done()]);

    let c = registry.get("p/C").unwrap();
    assert!(c.fields.is_empty());

    let insns = body(c, "<init>", "()V");
    assert_eq!(insns.len(), 8);
    assert!(matches!(&insns[4], Instruction::MethodCall(call) if call.name == "computeSomething"));
    assert_eq!(insns[5], Instruction::StackPop(PopKind::Single));
    assert_eq!(insns[6], Instruction::StackPop(PopKind::Single));
    assert_eq!(result.events.count(EventKind::StoreReplaced), 1);
}

#[test]
fn removed_interface_is_dropped_from_implementors() {
    let (registry, result) = run(vec![
        ClassBuilder::new("p/I").as_interface().marked(true),
        ClassBuilder::new("p/J").as_interface(),
        ClassBuilder::new("p/D").interface("p/I").interface("p/J"),
    ]);

    assert!(!registry.contains("p/I"));
    assert_eq!(registry.get("p/D").unwrap().interfaces, ["p/J"]);
    assert_eq!(result.events.count(EventKind::InterfaceRemoved), 1);
    assert_eq!(result.events.count(EventKind::InterfaceDropped), 1);
}

#[test]
fn nested_classes_follow_their_outer_class() {
    let (registry, result) = run(vec![
        ClassBuilder::new("p/Outer").marked(true),
        ClassBuilder::new("p/Outer$1"),
        ClassBuilder::new("p/Outer$Inner"),
        ClassBuilder::new("p/Outer$Inner$Deep"),
        ClassBuilder::new("p/OuterX"),
        ClassBuilder::new("p/OuterX$1"),
    ]);

    let names: Vec<_> = registry.names().collect();
    assert_eq!(names, ["p/OuterX", "p/OuterX$1"]);
    assert_eq!(result.events.count(EventKind::NestedClassRemoved), 3);
    assert_eq!(result.records.len(), 4);
}

#[test]
fn remove_only_keeps_the_declared_superclass() {
    let config = RemoverConfig::default().with_mode(RemovalMode::RemoveOnly);
    let input = jar(vec![
        ClassBuilder::new("p/A").marked(true),
        object_constructor(ClassBuilder::new("p/B").super_name("p/A"), "p/A")
            .vreturn()
            .done(),
    ]);
    let (registry, result) = run_with(config, &input);

    assert!(!registry.contains("p/A"));
    let b = registry.get("p/B").unwrap();
    assert_eq!(b.super_name.as_deref(), Some("p/A"));
    assert!(matches!(
        &body(b, "<init>", "()V")[1],
        Instruction::MethodCall(call) if call.owner == "p/A"
    ));
    assert!(!result.events.has(EventKind::SuperclassChanged));
}

#[test]
fn second_run_is_byte_identical() {
    let input = jar(vec![
        ClassBuilder::new("p/Gone").marked(true),
        object_constructor(
            ClassBuilder::new("p/Kept")
                .marked(false)
                .field("trace", "Z")
                .marked(true)
                .done()
                .field("name", "Ljava/lang/String;")
                .marked(false)
                .done(),
            OBJECT,
        )
        .aload(0)
        .iconst(1)
        .put_field("p/Kept", "trace", "Z")
        .vreturn()
        .done()
        .method("debug", "()V")
        .marked(false)
        .vreturn()
        .done(),
    ]);

    let remover = CodeRemover::default();
    let (first, first_result) = remover.process_bytes(&input).unwrap();
    let (second, second_result) = remover.process_bytes(&first).unwrap();

    assert!(!first_result.is_unchanged());
    assert!(second_result.is_unchanged());
    assert!(second_result.records.is_empty());
    assert_eq!(first, second);

    let registry = archive::load_from_mem(&second, &LoadOptions::default()).unwrap();
    let kept = registry.get("p/Kept").unwrap();
    assert!(kept.marker.is_none());
    assert!(kept.fields.iter().all(|field| field.marker.is_none()));
    assert!(kept.methods.iter().all(|method| method.marker.is_none()));
}

fn pool_strings(class: &ClassRecord) -> Vec<String> {
    (1..class.pool.len())
        .filter_map(|slot| class.pool.utf8(slot as u16).ok())
        .collect()
}

#[test]
fn removed_names_leave_the_constant_pool() {
    let (registry, _) = run(vec![
        ClassBuilder::new("p/A").marked(true),
        ClassBuilder::new("p/I").as_interface().marked(true),
        object_constructor(
            ClassBuilder::new("p/B")
                .super_name("p/A")
                .interface("p/I")
                .field("f", "I")
                .marked(true)
                .done(),
            "p/A",
        )
        .aload(0)
        .iconst(1)
        .put_field("p/B", "f", "I")
        .vreturn()
        .done()
        .method("debug", "()V")
        .marked(false)
        .vreturn()
        .done(),
        ClassBuilder::new("p/Other"),
    ]);

    let b = registry.get("p/B").unwrap();
    let strings = pool_strings(b);
    for gone in ["p/A", "p/I", "f", "remove", DEFAULT_MARKER] {
        assert!(
            !strings.iter().any(|s| s == gone),
            "{gone} survives in the pool of p/B"
        );
    }
    assert!(strings.iter().any(|s| s == "debug"));
    assert_eq!(body(b, "<init>", "()V").len(), 3);

    let other = registry.get("p/Other").unwrap();
    assert_eq!(
        write_class(other).unwrap(),
        ClassBuilder::new("p/Other").build(DEFAULT_MARKER).unwrap()
    );
}

#[test]
fn hierarchy_is_closed_over_survivors() {
    let (registry, result) = run(vec![
        ClassBuilder::new("p/Base"),
        ClassBuilder::new("p/A").super_name("p/Base").marked(true),
        ClassBuilder::new("p/B").super_name("p/A").marked(true),
        ClassBuilder::new("p/C").super_name("p/B"),
        ClassBuilder::new("p/D").super_name("lib/External"),
        ClassBuilder::new("p/I").as_interface().marked(true),
        ClassBuilder::new("p/E").interface("p/I"),
    ]);

    assert_eq!(registry.get("p/C").unwrap().super_name.as_deref(), Some("p/Base"));
    assert_eq!(
        registry.get("p/D").unwrap().super_name.as_deref(),
        Some("lib/External")
    );

    let survivors: HashSet<&str> = registry.names().collect();
    for class in registry.classes() {
        if let Some(super_name) = class.super_name.as_deref() {
            assert!(
                !result.records.is_removed(super_name),
                "{} still extends removed {}",
                class.name,
                super_name
            );
            assert!(
                survivors.contains(super_name) || super_name == OBJECT || super_name.starts_with("lib/")
            );
        }
        assert!(class
            .interfaces
            .iter()
            .all(|name| !result.records.is_removed_interface(name)));
    }
}

#[test]
fn references_to_removed_ancestors_are_rewritten() {
    let (registry, _) = run(vec![
        ClassBuilder::new("p/Base"),
        ClassBuilder::new("p/A")
            .super_name("p/Base")
            .marked(true)
            .field("x", "I")
            .done()
            .method("helper", "()V")
            .vreturn()
            .done(),
        object_constructor(ClassBuilder::new("p/B").super_name("p/A"), "p/A")
            .vreturn()
            .done()
            .method("use", "()V")
            .aload(0)
            .get_field("p/A", "x", "I")
            .pop()
            .aload(0)
            .invoke_virtual("p/A", "helper", "()V")
            .aload(0)
            .checkcast("p/A")
            .pop()
            .vreturn()
            .done(),
    ]);

    let insns = all_instructions(&registry);
    let referenced: Vec<&str> = insns.iter().flat_map(names_in).collect();
    assert!(!referenced.contains(&"p/A"));
    assert_eq!(referenced.iter().filter(|name| **name == "p/Base").count(), 4);
}

#[test]
fn patched_initializers_keep_their_stack_balance() {
    let builders = || {
        vec![object_constructor(
            ClassBuilder::new("p/S")
                .field("id", "J")
                .static_()
                .marked(true)
                .done()
                .field("flag", "Z")
                .marked(true)
                .done()
                .field("label", "Ljava/lang/String;")
                .marked(true)
                .done()
                .method("<clinit>", "()V")
                .invoke_static("java/lang/System", "nanoTime", "()J")
                .put_static("p/S", "id", "J")
                .vreturn()
                .done()
                .method("name", "()Ljava/lang/String;")
                .aconst_null()
                .areturn()
                .done(),
            OBJECT,
        )
        .aload(0)
        .iconst(0)
        .put_field("p/S", "flag", "Z")
        .aload(0)
        .aload(0)
        .invoke_virtual("p/S", "name", "()Ljava/lang/String;")
        .put_field("p/S", "label", "Ljava/lang/String;")
        .vreturn()
        .done()]
    };

    let bytes = builders().remove(0).build(DEFAULT_MARKER).unwrap();
    let input = parse_class(&bytes, DEFAULT_MARKER).unwrap();
    let (registry, result) = run(builders());
    let output = registry.get("p/S").unwrap();

    for (name, descriptor) in [("<init>", "()V"), ("<clinit>", "()V")] {
        let before = body(&input, name, descriptor);
        let after = body(output, name, descriptor);
        assert_ne!(before, after);
        assert_eq!(net_stack_effect(&before), net_stack_effect(&after));
        assert!(!after.iter().any(|insn| matches!(
            insn,
            Instruction::FieldAccess(field)
                if field.op == FieldOp::PutField || field.op == FieldOp::PutStatic
        )));
    }

    assert_eq!(
        body(output, "<clinit>", "()V")[1],
        Instruction::StackPop(PopKind::Double)
    );
    assert_eq!(result.events.count(EventKind::StoreDeleted), 1);
    assert_eq!(result.events.count(EventKind::StoreReplaced), 2);
}

#[test]
fn unexpected_shape_aborts_the_run() {
    let input = jar(vec![object_constructor(
        ClassBuilder::new("p/C").field("f", "I").marked(true).done(),
        OBJECT,
    )
    .aload(0)
    .aload(0)
    .pop()
    .iconst(5)
    .put_field("p/C", "f", "I")
    .vreturn()
    .done()]);

    let error = CodeRemover::default().process_bytes(&input).unwrap_err();
    match error {
        Error::UnexpectedShape { class, method, .. } => {
            assert_eq!(class, "p/C");
            assert_eq!(method, "<init>()V");
        }
        other => panic!("unexpected error: {other}"),
    }
}
