//! Member & Constructor Patcher.
//!
//! Removes marked fields and methods from a surviving class, then patches its initializers so
//! that no `<init>` or `<clinit>` stores to a field that no longer exists.
//!
//! # Patching
//!
//! For each `putfield`/`putstatic` on this class whose field was removed, the instruction that
//! produced the stored value decides the repair:
//!
//! - a side effect free constant push is deleted together with the store, and for instance
//!   stores so is the `aload_0` right before it that supplied the receiver
//! - anything else may have side effects and must still run, so the store is replaced by a
//!   pop of the value and, for instance stores, a second `pop` for the receiver
//!
//! ```text
//! // this.f = 5;                 // this.f = compute();
//! aload_0                        aload_0
//! iconst_5          =>  (gone)   aload_0
//! putfield C.f:I                 invokevirtual C.compute()I
//!                                putfield C.f:I            =>  pop; pop
//! ```
//!
//! Both repairs leave the operand stack balance of the method unchanged, which is verified
//! after each patched initializer.

use log::{debug, info, warn};

use crate::{
    classfile::annotation::Marker,
    instruction::{code::CodeBody, net_stack_effect, FieldInsn, Instruction, PopKind},
    pipeline::{
        events::EventKind,
        pass::{ClassPass, PassContext},
        records::FieldKeySet,
    },
    registry::{names::display_name, record::ClassRecord},
    Error, Result,
};

const PASS_NAME: &str = "members";

/// Removes marked members and patches initializers.
pub struct MemberPass;

impl Default for MemberPass {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberPass {
    /// Creates a new member pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClassPass for MemberPass {
    fn name(&self) -> &'static str {
        PASS_NAME
    }

    fn description(&self) -> &'static str {
        "Removes marked fields and methods and patches stores to removed fields"
    }

    fn run_on_class(&self, class: &mut ClassRecord, ctx: &mut PassContext) -> Result<bool> {
        let (removed_fields, fields_changed) = remove_fields(class, ctx)?;
        let methods_changed = remove_methods(class, ctx)?;

        let mut patched = false;
        if !removed_fields.is_empty() {
            if ctx.mode.repairs() {
                patched = patch_initializers(class, &removed_fields, ctx)?;
            } else {
                debug!(
                    "Skipping initializer patching of {}",
                    display_name(&class.name)
                );
            }
        }

        Ok(fields_changed || methods_changed || patched)
    }
}

/// The `remove` value of an optional marker.
fn marker_flag(marker: Option<&Marker>, element: impl FnOnce() -> String) -> Result<Option<bool>> {
    match marker {
        Some(marker) => marker.remove_flag(&element()).map(Some),
        None => Ok(None),
    }
}

fn remove_fields(class: &mut ClassRecord, ctx: &mut PassContext) -> Result<(FieldKeySet, bool)> {
    let owner = display_name(&class.name);
    let flags = class
        .fields
        .iter()
        .map(|field| marker_flag(field.marker.as_ref(), || format!("{}.{}", owner, field.name)))
        .collect::<Result<Vec<_>>>()?;

    let mut removed = FieldKeySet::new();
    let mut changed = false;
    let fields = std::mem::take(&mut class.fields);
    for (mut field, flag) in fields.into_iter().zip(flags) {
        match flag {
            Some(true) => {
                let message = format!("Removed field: {}.{}", owner, field.name);
                info!("{}", message);
                ctx.events
                    .record(EventKind::FieldRemoved)
                    .class(class.name.as_str())
                    .member(field.key().to_string())
                    .message(message)
                    .pass(PASS_NAME);
                removed.insert(field.key());
                changed = true;
            }
            Some(false) => {
                field.strip_marker(&class.pool, ctx.marker)?;
                ctx.events
                    .record(EventKind::MarkerStripped)
                    .class(class.name.as_str())
                    .member(field.key().to_string())
                    .pass(PASS_NAME);
                changed = true;
                class.fields.push(field);
            }
            None => class.fields.push(field),
        }
    }

    Ok((removed, changed))
}

fn remove_methods(class: &mut ClassRecord, ctx: &mut PassContext) -> Result<bool> {
    let owner = display_name(&class.name);
    let flags = class
        .methods
        .iter()
        .map(|method| {
            marker_flag(method.marker.as_ref(), || {
                format!("{}.{}", owner, method.signature())
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut changed = false;
    let methods = std::mem::take(&mut class.methods);
    for (mut method, flag) in methods.into_iter().zip(flags) {
        match flag {
            Some(true) if !method.is_initializer() => {
                let message = format!("Removed method: {}.{}", owner, method.signature());
                info!("{}", message);
                ctx.events
                    .record(EventKind::MethodRemoved)
                    .class(class.name.as_str())
                    .member(method.signature())
                    .message(message)
                    .pass(PASS_NAME);
                changed = true;
            }
            Some(remove) => {
                if remove {
                    let message = format!(
                        "Initializer {}.{} cannot be removed, keeping it",
                        owner,
                        method.signature()
                    );
                    warn!("{}", message);
                    ctx.events.warn(message);
                }
                method.strip_marker(&class.pool, ctx.marker)?;
                ctx.events
                    .record(EventKind::MarkerStripped)
                    .class(class.name.as_str())
                    .member(method.signature())
                    .pass(PASS_NAME);
                changed = true;
                class.methods.push(method);
            }
            None => class.methods.push(method),
        }
    }

    Ok(changed)
}

fn patch_initializers(
    class: &mut ClassRecord,
    removed: &FieldKeySet,
    ctx: &mut PassContext,
) -> Result<bool> {
    let mut changed = false;
    for method in class.methods.iter_mut().filter(|m| m.is_initializer()) {
        let signature = method.signature();
        let Some(code) = method.code.as_mut() else {
            continue;
        };

        let before = net_stack_effect(code.insns.iter());
        let patches = patch_stores(code, &class.name, &signature, removed, ctx)?;
        if patches == 0 {
            continue;
        }

        let after = net_stack_effect(code.insns.iter());
        if before != after {
            return Err(malformed_error!(
                "Patching {}.{} changed its stack balance from {:?} to {:?}",
                display_name(&class.name),
                signature,
                before,
                after
            ));
        }
        changed = true;
    }
    Ok(changed)
}

/// Rewrite the stores to removed fields of `class_name` in one body; returns the number of
/// patched stores.
fn patch_stores(
    code: &mut CodeBody,
    class_name: &str,
    signature: &str,
    removed: &FieldKeySet,
    ctx: &mut PassContext,
) -> Result<usize> {
    let insns = &mut code.insns;
    let mut patched = 0;

    insns.rewind();
    while let Some(insn) = insns.move_next() {
        let field: FieldInsn = match insn {
            Instruction::FieldAccess(field)
                if field.op.is_store()
                    && field.owner == class_name
                    && removed.contains(&field.name, &field.descriptor) =>
            {
                field.clone()
            }
            _ => continue,
        };
        let position = insns.position().unwrap_or_default();
        let instance = !field.op.is_static();

        let kind = if insns
            .peek_prev()
            .is_some_and(Instruction::is_side_effect_free_push)
        {
            if instance && !insns.peek_back(2).is_some_and(Instruction::is_this_load) {
                let found = insns
                    .peek_back(2)
                    .map_or_else(|| "nothing".to_string(), |insn| format!("{:?}", insn));
                return Err(Error::UnexpectedShape {
                    class: class_name.to_string(),
                    method: signature.to_string(),
                    position: position.saturating_sub(2),
                    message: format!(
                        "expected aload_0 before the constant stored to {}, found {}",
                        field.name, found
                    ),
                });
            }

            // store, then the constant, then the receiver
            insns.remove();
            insns.remove();
            if instance {
                insns.remove();
            }
            EventKind::StoreDeleted
        } else {
            insns.replace(Instruction::StackPop(PopKind::for_descriptor(
                &field.descriptor,
            )));
            if instance {
                insns.insert_after(Instruction::StackPop(PopKind::Single));
                insns.move_next();
            }
            EventKind::StoreReplaced
        };

        let message = format!(
            "Removed field '{}' usage in: {}.{}",
            field.name,
            display_name(class_name),
            signature
        );
        info!("{}", message);
        ctx.events
            .record(kind)
            .class(class_name)
            .member(signature)
            .location(position)
            .message(message)
            .pass(PASS_NAME);
        patched += 1;
    }

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        classfile::{builder::ClassBuilder, reader::parse_class},
        instruction::{opcodes, Constant, FieldOp, MethodInsn},
        pipeline::{config::RemovalMode, events::EventLog, records::RemovalRecords},
        registry::DEFAULT_MARKER,
    };

    /// Read the class back so markers are attached the way the loader attaches them.
    fn load(builder: ClassBuilder) -> ClassRecord {
        parse_class(&builder.build(DEFAULT_MARKER).unwrap(), DEFAULT_MARKER).unwrap()
    }

    fn run_mode(class: &mut ClassRecord, mode: RemovalMode, events: &mut EventLog) -> Result<bool> {
        let records = RemovalRecords::new();
        let survivors = HashSet::new();
        let mut ctx = PassContext {
            records: &records,
            survivors: &survivors,
            marker: DEFAULT_MARKER,
            mode,
            events,
        };
        MemberPass::new().run_on_class(class, &mut ctx)
    }

    fn run(class: &mut ClassRecord, events: &mut EventLog) -> Result<bool> {
        run_mode(class, RemovalMode::Full, events)
    }

    fn body(class: &ClassRecord, name: &str) -> Vec<Instruction> {
        let method = class.methods.iter().find(|m| m.name == name).unwrap();
        method.code.as_ref().unwrap().instructions().cloned().collect()
    }

    fn object_init(builder: ClassBuilder) -> crate::classfile::builder::MethodBuilder {
        builder
            .method("<init>", "()V")
            .aload(0)
            .invoke_special("java/lang/Object", "<init>", "()V")
    }

    #[test]
    fn constant_store_is_deleted() {
        let builder = ClassBuilder::new("p/C")
            .field("f", "I")
            .marked(true)
            .done()
            .field("g", "I")
            .marked(false)
            .done();
        let mut class = load(
            object_init(builder)
                .aload(0)
                .iconst(5)
                .put_field("p/C", "f", "I")
                .aload(0)
                .iconst(6)
                .put_field("p/C", "g", "I")
                .vreturn()
                .done(),
        );
        let mut events = EventLog::new();
        assert!(run(&mut class, &mut events).unwrap());

        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.fields[0].name, "g");
        assert!(class.fields[0].marker.is_none());
        assert!(class.fields[0].attributes.is_empty());

        let insns = body(&class, "<init>");
        assert_eq!(insns.len(), 6);
        assert!(!insns.iter().any(|insn| matches!(
            insn,
            Instruction::FieldAccess(FieldInsn { name, .. }) if name == "f"
        )));
        assert_eq!(insns[3], Instruction::ConstantPush(Constant::Byte(6)));

        let deleted = events.of_kind(EventKind::StoreDeleted).next().unwrap();
        assert_eq!(deleted.message, "Removed field 'f' usage in: p.C.<init>()V");
        assert_eq!(deleted.location, Some(4));
        assert_eq!(events.count(EventKind::FieldRemoved), 1);
    }

    #[test]
    fn computed_store_is_popped() {
        let builder = ClassBuilder::new("p/C").field("f", "I").marked(true).done();
        let mut class = load(
            object_init(builder)
                .aload(0)
                .aload(0)
                .invoke_virtual("p/C", "compute", "()I")
                .put_field("p/C", "f", "I")
                .vreturn()
                .done()
                .method("compute", "()I")
                .iconst(1)
                .ireturn()
                .done(),
        );
        let mut events = EventLog::new();
        run(&mut class, &mut events).unwrap();

        let insns = body(&class, "<init>");
        assert!(matches!(
            &insns[4],
            Instruction::MethodCall(MethodInsn { name, .. }) if name == "compute"
        ));
        assert_eq!(insns[5], Instruction::StackPop(PopKind::Single));
        assert_eq!(insns[6], Instruction::StackPop(PopKind::Single));
        assert_eq!(insns.len(), 8);
        assert_eq!(events.count(EventKind::StoreReplaced), 1);
    }

    #[test]
    fn static_wide_store_uses_pop2() {
        let builder = ClassBuilder::new("p/S")
            .field("big", "J")
            .static_()
            .marked(true)
            .done();
        let mut class = load(
            builder
                .method("<clinit>", "()V")
                .invoke_static("p/S", "now", "()J")
                .put_static("p/S", "big", "J")
                .lconst(1)
                .put_static("p/S", "big", "J")
                .vreturn()
                .done(),
        );
        run(&mut class, &mut EventLog::new()).unwrap();

        let insns = body(&class, "<clinit>");
        assert_eq!(insns.len(), 3);
        assert_eq!(insns[1], Instruction::StackPop(PopKind::Double));
    }

    #[test]
    fn label_between_push_and_store_takes_pop_path() {
        let builder = ClassBuilder::new("p/C").field("f", "I").marked(true).done();
        let mut method = object_init(builder).aload(0).iconst(5);
        let label = method.new_label();
        let mut class = load(
            method
                .branch(opcodes::GOTO, label)
                .label(label)
                .put_field("p/C", "f", "I")
                .vreturn()
                .done(),
        );
        run(&mut class, &mut EventLog::new()).unwrap();

        let insns = body(&class, "<init>");
        assert_eq!(insns.len(), 8);
        assert_eq!(insns[3], Instruction::ConstantPush(Constant::Int(5)));
        assert_eq!(
            &insns[5..7],
            [
                Instruction::StackPop(PopKind::Single),
                Instruction::StackPop(PopKind::Single),
            ]
        );
    }

    #[test]
    fn missing_receiver_load_is_unexpected_shape() {
        let builder = ClassBuilder::new("p/C").field("f", "I").marked(true).done();
        let mut class = load(
            builder
                .method("<init>", "(Lp/C;)V")
                .aload(1)
                .iconst(5)
                .put_field("p/C", "f", "I")
                .vreturn()
                .done(),
        );
        let error = run(&mut class, &mut EventLog::new()).unwrap_err();
        assert!(matches!(
            error,
            Error::UnexpectedShape { ref class, ref method, position: 0, .. }
                if class == "p/C" && method == "<init>(Lp/C;)V"
        ));
    }

    #[test]
    fn foreign_owner_is_not_patched() {
        let builder = ClassBuilder::new("p/C").field("f", "I").marked(true).done();
        let mut class = load(
            object_init(builder)
                .aload(0)
                .iconst(5)
                .put_field("p/Other", "f", "I")
                .vreturn()
                .done(),
        );
        run(&mut class, &mut EventLog::new()).unwrap();

        let insns = body(&class, "<init>");
        assert!(matches!(
            &insns[4],
            Instruction::FieldAccess(FieldInsn { op: FieldOp::PutField, owner, .. }) if owner == "p/Other"
        ));
    }

    #[test]
    fn remove_only_leaves_code() {
        let builder = ClassBuilder::new("p/C").field("f", "I").marked(true).done();
        let mut class = load(
            object_init(builder)
                .aload(0)
                .iconst(5)
                .put_field("p/C", "f", "I")
                .vreturn()
                .done(),
        );
        run_mode(&mut class, RemovalMode::RemoveOnly, &mut EventLog::new()).unwrap();

        assert!(class.fields.is_empty());
        assert_eq!(body(&class, "<init>").len(), 6);
        assert!(!class.methods[0].code.as_ref().unwrap().is_modified());
    }

    #[test]
    fn methods_removed_and_initializers_kept() {
        let mut class = load(
            object_init(ClassBuilder::new("p/C"))
                .marked(true)
                .vreturn()
                .done()
                .method("debug", "()V")
                .marked(true)
                .vreturn()
                .done()
                .method("run", "()V")
                .marked(false)
                .vreturn()
                .done(),
        );
        let mut events = EventLog::new();
        run(&mut class, &mut events).unwrap();

        let names: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["<init>", "run"]);
        assert!(class.methods.iter().all(|m| m.marker.is_none()));
        assert_eq!(events.count(EventKind::MethodRemoved), 1);
        assert_eq!(events.count(EventKind::Warning), 1);
        assert_eq!(events.count(EventKind::MarkerStripped), 2);
    }
}
