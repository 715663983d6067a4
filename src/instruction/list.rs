//! An ordered, editable instruction sequence with a cursor.
//!
//! The cursor either points at an instruction (the *current* one) or sits before the first
//! instruction. Removing the current instruction moves the cursor to its predecessor, so a run
//! of instructions can be deleted by calling [`InsnList::remove`] repeatedly while walking
//! backwards, and a forward scan continues with the instruction that followed the removed one.
//!
//! # Examples
//!
//! ```rust
//! use coderemover::instruction::{list::InsnList, Instruction, PopKind};
//!
//! let mut list = InsnList::from(vec![
//!     Instruction::StackPop(PopKind::Single),
//!     Instruction::StackPop(PopKind::Double),
//! ]);
//!
//! while let Some(insn) = list.move_next() {
//!     if *insn == Instruction::StackPop(PopKind::Single) {
//!         list.remove();
//!     }
//! }
//!
//! assert_eq!(list.len(), 1);
//! assert!(list.is_dirty());
//! ```

use crate::instruction::{Instruction, Label};

/// An instruction sequence with a cursor
#[derive(Debug, Clone, Default)]
pub struct InsnList {
    insns: Vec<Instruction>,
    cursor: Option<usize>,
    next_label: u32,
    dirty: bool,
}

impl From<Vec<Instruction>> for InsnList {
    fn from(insns: Vec<Instruction>) -> Self {
        let next_label = insns
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Label(label) => Some(label.0 + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        InsnList {
            insns,
            cursor: None,
            next_label,
            dirty: false,
        }
    }
}

impl InsnList {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, labels included
    #[must_use]
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    /// True if the list holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// True once the sequence has been structurally modified
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Allocate a label that is unique within this list
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Append an instruction at the end, leaving the cursor untouched
    pub fn push(&mut self, insn: Instruction) {
        if let Instruction::Label(label) = insn {
            self.next_label = self.next_label.max(label.0 + 1);
        }
        self.insns.push(insn);
        self.dirty = true;
    }

    /// All entries in order
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.insns.iter()
    }

    /// All entries in order, for in-place operand rewrites.
    ///
    /// Rewriting operands does not change the layout and does not mark the list dirty.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Instruction> {
        self.insns.iter_mut()
    }

    /// All entries as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[Instruction] {
        &self.insns
    }

    /// Entry at an absolute index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.insns.get(index)
    }

    /// Put the cursor before the first entry
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    /// Index of the current entry, `None` if the cursor is before the first one
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// Advance the cursor and return the new current entry.
    ///
    /// At the last entry the cursor stays in place and `None` is returned.
    pub fn move_next(&mut self) -> Option<&Instruction> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.insns.len() {
            self.cursor = Some(next);
            self.insns.get(next)
        } else {
            None
        }
    }

    /// Step the cursor back and return the new current entry.
    ///
    /// Stepping back from the first entry leaves the cursor before the first entry and returns
    /// `None`.
    pub fn move_prev(&mut self) -> Option<&Instruction> {
        match self.cursor {
            Some(0) | None => {
                self.cursor = None;
                None
            }
            Some(c) => {
                self.cursor = Some(c - 1);
                self.insns.get(c - 1)
            }
        }
    }

    /// The entry under the cursor
    #[must_use]
    pub fn current(&self) -> Option<&Instruction> {
        self.cursor.and_then(|c| self.insns.get(c))
    }

    /// The entry immediately before the cursor
    #[must_use]
    pub fn peek_prev(&self) -> Option<&Instruction> {
        self.peek_back(1)
    }

    /// The entry `n` positions before the cursor; `peek_back(0)` is the current entry
    #[must_use]
    pub fn peek_back(&self, n: usize) -> Option<&Instruction> {
        let c = self.cursor?;
        c.checked_sub(n).and_then(|i| self.insns.get(i))
    }

    /// The entry immediately after the cursor
    #[must_use]
    pub fn peek_next(&self) -> Option<&Instruction> {
        self.insns.get(self.cursor.map_or(0, |c| c + 1))
    }

    /// Replace the current entry, returning the old one
    pub fn replace(&mut self, insn: Instruction) -> Option<Instruction> {
        let c = self.cursor?;
        let slot = self.insns.get_mut(c)?;
        self.dirty = true;
        Some(std::mem::replace(slot, insn))
    }

    /// Insert before the current entry; the cursor keeps pointing at the same entry.
    ///
    /// With the cursor before the first entry, the instruction becomes the new first entry and
    /// the next [`InsnList::move_next`] returns it.
    pub fn insert_before(&mut self, insn: Instruction) {
        match self.cursor {
            Some(c) => {
                self.insns.insert(c, insn);
                self.cursor = Some(c + 1);
            }
            None => self.insns.insert(0, insn),
        }
        self.dirty = true;
    }

    /// Insert after the current entry; the cursor does not move
    pub fn insert_after(&mut self, insn: Instruction) {
        let at = self.cursor.map_or(0, |c| c + 1);
        self.insns.insert(at, insn);
        self.dirty = true;
    }

    /// Remove the current entry and move the cursor to its predecessor
    pub fn remove(&mut self) -> Option<Instruction> {
        let c = self.cursor?;
        if c >= self.insns.len() {
            return None;
        }
        let removed = self.insns.remove(c);
        self.cursor = c.checked_sub(1);
        self.dirty = true;
        Some(removed)
    }

    /// Consume the list, returning its entries
    #[must_use]
    pub fn into_vec(self) -> Vec<Instruction> {
        self.insns
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.insns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{opcodes, Constant, PopKind};

    fn other(opcode: u8) -> Instruction {
        Instruction::Other {
            opcode,
            operands: vec![],
        }
    }

    fn sample() -> InsnList {
        InsnList::from(vec![
            other(opcodes::NOP),
            Instruction::ConstantPush(Constant::Int(1)),
            Instruction::Label(Label(4)),
            other(opcodes::RETURN),
        ])
    }

    #[test]
    fn forward_and_backward() {
        let mut list = sample();
        assert!(list.current().is_none());
        assert_eq!(list.peek_next(), Some(&other(opcodes::NOP)));

        assert_eq!(list.move_next(), Some(&other(opcodes::NOP)));
        assert!(list.move_next().unwrap().is_side_effect_free_push());
        assert_eq!(list.position(), Some(1));
        assert_eq!(list.peek_prev(), Some(&other(opcodes::NOP)));
        assert!(list.peek_next().unwrap().is_label());

        list.move_next();
        list.move_next();
        assert!(list.move_next().is_none());
        assert_eq!(list.position(), Some(3));
        assert_eq!(list.peek_back(3), Some(&other(opcodes::NOP)));
        assert!(list.peek_back(4).is_none());

        list.move_prev();
        list.move_prev();
        list.move_prev();
        assert!(list.move_prev().is_none());
        assert!(list.current().is_none());
        assert!(!list.is_dirty());
    }

    #[test]
    fn remove_moves_to_predecessor() {
        let mut list = sample();
        list.move_next();
        list.move_next();
        list.move_next();

        assert!(list.remove().unwrap().is_label());
        assert_eq!(list.position(), Some(1));
        assert!(list.remove().unwrap().is_side_effect_free_push());
        assert_eq!(list.position(), Some(0));
        assert_eq!(list.remove(), Some(other(opcodes::NOP)));
        assert_eq!(list.position(), None);
        assert!(list.remove().is_none());

        assert_eq!(list.as_slice(), &[other(opcodes::RETURN)]);
        assert_eq!(list.move_next(), Some(&other(opcodes::RETURN)));
        assert!(list.is_dirty());
    }

    #[test]
    fn replace_and_insert() {
        let mut list = sample();
        list.move_next();
        list.move_next();

        let old = list.replace(Instruction::StackPop(PopKind::Single)).unwrap();
        assert!(old.is_side_effect_free_push());

        list.insert_after(Instruction::StackPop(PopKind::Double));
        list.insert_before(other(opcodes::DUP));
        assert_eq!(list.current(), Some(&Instruction::StackPop(PopKind::Single)));
        assert_eq!(list.peek_prev(), Some(&other(opcodes::DUP)));
        assert_eq!(list.peek_next(), Some(&Instruction::StackPop(PopKind::Double)));
        assert_eq!(list.len(), 6);
    }

    #[test]
    fn insert_before_first() {
        let mut list = sample();
        list.insert_before(other(opcodes::DUP));
        assert_eq!(list.move_next(), Some(&other(opcodes::DUP)));
    }

    #[test]
    fn labels_stay_unique() {
        let mut list = sample();
        assert_eq!(list.new_label(), Label(5));
        list.push(Instruction::Label(Label(9)));
        assert_eq!(list.new_label(), Label(10));
    }
}
