//! A decoded `Code` attribute.

use crate::{
    classfile::attribute::Attribute,
    instruction::{list::InsnList, Instruction, Label},
};

/// One entry of the exception table, with label bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered instruction
    pub start: Label,
    /// First instruction after the covered range
    pub end: Label,
    /// Handler entry point
    pub handler: Label,
    /// Constant pool index of the caught class, 0 for `finally` handlers
    pub catch_type: u16,
}

/// One `LineNumberTable` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumber {
    /// First instruction of the line
    pub start: Label,
    /// Source line
    pub line: u16,
}

/// One `LocalVariableTable` or `LocalVariableTypeTable` entry.
///
/// Name and descriptor (or signature) stay constant pool indices; the pool keeps its indices
/// stable so they never need to be re-interned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Start of the live range
    pub start: Label,
    /// End of the live range, exclusive
    pub end: Label,
    /// Constant pool index of the variable name
    pub name_index: u16,
    /// Constant pool index of the descriptor or signature
    pub descriptor_index: u16,
    /// Local variable slot
    pub slot: u16,
}

/// A verification type of a stack map frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VType {
    /// `Top`, also the unusable second half of a long or double local
    Top,
    /// `int`, `short`, `char`, `byte` and `boolean`
    Integer,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `long`
    Long,
    /// The `null` reference
    Null,
    /// `this` inside a constructor before the super constructor call
    UninitializedThis,
    /// An initialized reference; the internal class name or an array descriptor
    Object(String),
    /// The result of a `new` instruction that has not been initialized yet
    Uninitialized(Label),
}

/// A fully expanded stack map frame.
///
/// Long and double values take a single entry, matching the compressed `StackMapTable` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position of the frame
    pub label: Label,
    /// Local variable types
    pub locals: Vec<VType>,
    /// Operand stack types, bottom first
    pub stack: Vec<VType>,
}

/// Attributes of a `Code` attribute, in their original order
#[derive(Debug, Clone, PartialEq)]
pub enum CodeAttr {
    /// `LineNumberTable`
    LineNumbers(Vec<LineNumber>),
    /// `LocalVariableTable`
    LocalVariables(Vec<LocalVariable>),
    /// `LocalVariableTypeTable`
    LocalVariableTypes(Vec<LocalVariable>),
    /// `StackMapTable`, expanded
    StackMap(Vec<Frame>),
    /// Anything else; offsets inside it cannot be tracked
    Raw(Attribute),
}

/// A decoded method body
#[derive(Debug, Clone)]
pub struct CodeBody {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// The instructions, with labels at every referenced position
    pub insns: InsnList,
    /// Exception table in order of precedence
    pub handlers: Vec<ExceptionHandler>,
    /// Sub-attributes
    pub attributes: Vec<CodeAttr>,
    /// The implicit frame at method entry, derived from the method descriptor
    pub initial_locals: Vec<VType>,
    modified: bool,
}

impl CodeBody {
    /// Assemble a body from its parts
    #[must_use]
    pub fn new(
        max_stack: u16,
        max_locals: u16,
        insns: InsnList,
        handlers: Vec<ExceptionHandler>,
        attributes: Vec<CodeAttr>,
        initial_locals: Vec<VType>,
    ) -> Self {
        CodeBody {
            max_stack,
            max_locals,
            insns,
            handlers,
            attributes,
            initial_locals,
            modified: false,
        }
    }

    /// Flag the body as changed even though the instruction layout may be intact, e.g. after an
    /// operand rewrite
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// True if the body must be encoded again rather than copied
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified || self.insns.is_dirty()
    }

    /// Instructions without labels
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.insns.iter().filter(|insn| !insn.is_label())
    }

    /// The expanded stack map frames, if the body has a `StackMapTable`
    pub fn frames_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.attributes
            .iter_mut()
            .filter_map(|attr| match attr {
                CodeAttr::StackMap(frames) => Some(frames),
                _ => None,
            })
            .flatten()
    }
}
