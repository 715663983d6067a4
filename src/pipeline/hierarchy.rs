//! Hierarchy Repair Pass.
//!
//! Removing a class or interface leaves its former subtypes pointing at a name that no longer
//! exists in the archive. This pass fixes the surviving side of every such relation:
//!
//! 1. Removed interfaces are dropped from the class's interface list.
//! 2. The declared superclass is resolved through the removed class mapping to the nearest
//!    ancestor that survived. If it changes, every field access, method call and type
//!    instruction in the class that names a removed ancestor is retargeted to the new
//!    superclass, and so are object types in stack map frames.
//!
//! # Example
//!
//! ```text
//! // Before (A was removed, A extends java/lang/Object)
//! class B extends A
//!     <init>: aload_0; invokespecial A.<init>()V; return
//!
//! // After
//! class B extends java/lang/Object
//!     <init>: aload_0; invokespecial java/lang/Object.<init>()V; return
//! ```

use std::collections::HashSet;

use log::{debug, info};

use crate::{
    instruction::{code::VType, Instruction},
    pipeline::{
        events::EventKind,
        pass::{ClassPass, PassContext},
        records::RemovalRecords,
    },
    registry::{names::display_name, record::ClassRecord},
    Result,
};

/// Re-parents survivors of removed classes and interfaces.
pub struct HierarchyPass;

impl Default for HierarchyPass {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyPass {
    /// Creates a new hierarchy repair pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClassPass for HierarchyPass {
    fn name(&self) -> &'static str {
        "hierarchy"
    }

    fn description(&self) -> &'static str {
        "Drops removed interfaces and re-parents subclasses of removed classes"
    }

    fn run_on_class(&self, class: &mut ClassRecord, ctx: &mut PassContext) -> Result<bool> {
        let dropped = drop_removed_interfaces(class, ctx);
        let reparented = reparent(class, ctx)?;
        Ok(dropped || reparented)
    }
}

fn drop_removed_interfaces(class: &mut ClassRecord, ctx: &mut PassContext) -> bool {
    let before = class.interfaces.len();
    let mut dropped = Vec::new();
    class.interfaces.retain(|interface| {
        if ctx.records.is_removed_interface(interface) {
            dropped.push(interface.clone());
            false
        } else {
            true
        }
    });

    for interface in &dropped {
        let message = format!(
            "Removed interface usage {} in {}",
            display_name(interface),
            display_name(&class.name)
        );
        info!("{}", message);
        ctx.events
            .record(EventKind::InterfaceDropped)
            .class(class.name.as_str())
            .message(message)
            .pass("hierarchy");
    }

    class.interfaces.len() != before
}

fn reparent(class: &mut ClassRecord, ctx: &mut PassContext) -> Result<bool> {
    let Some(declared) = class.super_name.clone() else {
        return Ok(false);
    };

    let resolved = ctx.records.resolve_superclass(&declared)?.to_string();
    if resolved == declared {
        if !ctx.is_survivor(&declared) {
            debug!(
                "Superclass {} of {} is not part of the archive",
                display_name(&declared),
                display_name(&class.name)
            );
        }
        return Ok(false);
    }

    let message = format!(
        "Changed superclass for {}: {} -> {}",
        display_name(&class.name),
        display_name(&declared),
        display_name(&resolved)
    );
    info!("{}", message);
    ctx.events
        .record(EventKind::SuperclassChanged)
        .class(class.name.as_str())
        .message(message)
        .pass("hierarchy");

    if !ctx.is_survivor(&resolved) {
        debug!(
            "New superclass {} of {} is not part of the archive",
            display_name(&resolved),
            display_name(&class.name)
        );
    }
    class.super_name = Some(resolved.clone());

    let stale = removed_chain(ctx.records, &declared);
    for method in &mut class.methods {
        let Some(code) = method.code.as_mut() else {
            continue;
        };

        let mut retargeted = 0_usize;
        for insn in code.insns.iter_mut() {
            if retarget_operand(insn, &stale, &resolved) {
                retargeted += 1;
            }
        }
        for frame in code.frames_mut() {
            for vtype in frame.locals.iter_mut().chain(frame.stack.iter_mut()) {
                if let VType::Object(name) = vtype {
                    if stale.contains(name.as_str()) {
                        name.clone_from(&resolved);
                        retargeted += 1;
                    }
                }
            }
        }

        if retargeted > 0 {
            code.mark_modified();
            debug!(
                "Retargeted {} operand(s) in {}.{}",
                retargeted,
                display_name(&class.name),
                method.signature()
            );
            ctx.events
                .record(EventKind::OperandsRetargeted)
                .class(class.name.as_str())
                .member(method.signature())
                .message(format!(
                    "Retargeted {} operand(s) from {} to {}",
                    retargeted,
                    display_name(&declared),
                    display_name(&resolved)
                ))
                .pass("hierarchy");
        }
    }

    Ok(true)
}

/// The removed classes between `declared` and its resolved superclass, `declared` first.
///
/// Only called after a successful resolution, so the chain is finite.
fn removed_chain<'a>(records: &'a RemovalRecords, declared: &'a str) -> HashSet<&'a str> {
    let mut chain = HashSet::new();
    let mut current = declared;
    while let Some(next) = records.original_superclass(current) {
        if !chain.insert(current) {
            break;
        }
        current = next;
    }
    chain
}

/// Point an operand naming one of `stale` at `target`; returns true if it changed.
fn retarget_operand(insn: &mut Instruction, stale: &HashSet<&str>, target: &str) -> bool {
    let name = match insn {
        Instruction::FieldAccess(field) => &mut field.owner,
        Instruction::MethodCall(call) => &mut call.owner,
        Instruction::TypeReference(reference) => &mut reference.name,
        _ => return false,
    };
    if stale.contains(name.as_str()) {
        *name = target.to_string();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::builder::ClassBuilder,
        instruction::{FieldInsn, FieldOp, MethodInsn, TypeInsn, TypeOp},
        pipeline::{config::RemovalMode, events::EventLog},
        registry::DEFAULT_MARKER,
    };

    fn record(builder: ClassBuilder) -> ClassRecord {
        builder.into_record(DEFAULT_MARKER).unwrap()
    }

    fn run(class: &mut ClassRecord, records: &RemovalRecords, events: &mut EventLog) -> bool {
        let survivors: HashSet<String> = [class.name.clone()].into_iter().collect();
        let mut ctx = PassContext {
            records,
            survivors: &survivors,
            marker: DEFAULT_MARKER,
            mode: RemovalMode::Full,
            events,
        };
        HierarchyPass::new().run_on_class(class, &mut ctx).unwrap()
    }

    #[test]
    fn drops_removed_interfaces() {
        let mut records = RemovalRecords::new();
        records.record(&record(ClassBuilder::new("p/I").as_interface()));

        let mut class = record(
            ClassBuilder::new("p/D")
                .interface("p/I")
                .interface("java/io/Serializable"),
        );
        let mut events = EventLog::new();
        assert!(run(&mut class, &records, &mut events));
        assert_eq!(class.interfaces, ["java/io/Serializable"]);
        assert_eq!(
            events.of_kind(EventKind::InterfaceDropped).next().unwrap().message,
            "Removed interface usage p.I in p.D"
        );
    }

    #[test]
    fn reparents_through_chain() {
        let mut records = RemovalRecords::new();
        records.record(&record(ClassBuilder::new("p/A").super_name("p/Base")));
        records.record(&record(ClassBuilder::new("p/Base")));

        let mut class = record(
            ClassBuilder::new("p/B")
                .super_name("p/A")
                .method("<init>", "()V")
                .aload(0)
                .invoke_special("p/A", "<init>", "()V")
                .aload(0)
                .get_field("p/Base", "count", "I")
                .pop()
                .new_object("p/A")
                .pop()
                .get_static("p/Other", "x", "I")
                .pop()
                .vreturn()
                .done(),
        );
        let mut events = EventLog::new();
        assert!(run(&mut class, &records, &mut events));

        assert_eq!(class.super_name.as_deref(), Some("java/lang/Object"));
        let insns: Vec<_> = class.methods[0].code.as_ref().unwrap().instructions().collect();
        assert!(matches!(
            insns[1],
            Instruction::MethodCall(MethodInsn { owner, .. }) if owner == "java/lang/Object"
        ));
        assert!(matches!(
            insns[3],
            Instruction::FieldAccess(FieldInsn { op: FieldOp::GetField, owner, .. })
                if owner == "java/lang/Object"
        ));
        assert!(matches!(
            insns[5],
            Instruction::TypeReference(TypeInsn { op: TypeOp::New, name }) if name == "java/lang/Object"
        ));
        assert!(matches!(
            insns[7],
            Instruction::FieldAccess(FieldInsn { owner, .. }) if owner == "p/Other"
        ));

        assert_eq!(
            events.of_kind(EventKind::SuperclassChanged).next().unwrap().message,
            "Changed superclass for p.B: p.A -> java.lang.Object"
        );
        assert_eq!(events.count(EventKind::OperandsRetargeted), 1);
    }

    #[test]
    fn external_superclass_is_kept() {
        let records = RemovalRecords::new();
        let mut class = record(ClassBuilder::new("p/B").super_name("lib/Base"));
        let mut events = EventLog::new();
        assert!(!run(&mut class, &records, &mut events));
        assert_eq!(class.super_name.as_deref(), Some("lib/Base"));
        assert!(events.is_empty());
    }

    #[test]
    fn frame_types_are_retargeted() {
        use crate::instruction::code::{CodeAttr, Frame};

        let mut records = RemovalRecords::new();
        records.record(&record(ClassBuilder::new("p/A")));

        let mut class = record(
            ClassBuilder::new("p/B")
                .super_name("p/A")
                .method("run", "()V")
                .vreturn()
                .done(),
        );
        let code = class.methods[0].code.as_mut().unwrap();
        let label = code.insns.new_label();
        code.attributes.push(CodeAttr::StackMap(vec![Frame {
            label,
            locals: vec![VType::Object("p/A".into()), VType::Integer],
            stack: vec![VType::Object("p/C".into())],
        }]));

        run(&mut class, &records, &mut EventLog::new());

        let code = class.methods[0].code.as_mut().unwrap();
        let frame = code.frames_mut().next().unwrap();
        assert_eq!(frame.locals[0], VType::Object("java/lang/Object".into()));
        assert_eq!(frame.stack[0], VType::Object("p/C".into()));
    }
}
