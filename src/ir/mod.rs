//! Method bodies as seen by the exploration core
//!
//! The core never inspects bytecode. It needs blocks in order, the
//! instructions of each block, terminator successors, which blocks are
//! exception handlers, and which instructions are calls or branches.
//! Everything is keyed by identity (`InstId`, `MethodId`), never by content.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Instruction identity
///
/// Unique across the whole program. Two instructions are equal only if
/// they are the same instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstId(pub u32);

/// Method identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub u32);

/// Block identifier within a method
pub type BlockId = usize;

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// What an instruction does, as far as exploration cares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstKind {
    /// Anything without control-flow meaning
    Plain,
    /// Call with a resolvable callee
    Call { callee: MethodId },
    /// Two-way conditional branch
    Branch { true_target: BlockId, false_target: BlockId },
    /// Lookup switch: explicit case keys plus a default
    Switch { cases: Vec<(i64, BlockId)>, default: BlockId },
    /// Table switch: dense keys `min..min + targets.len()` plus a default
    TableSwitch { min: i64, targets: Vec<BlockId>, default: BlockId },
    /// Method exit
    Return,
}

/// A single instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    pub kind: InstKind,
}

impl Instruction {
    pub fn is_call(&self) -> bool {
        matches!(self.kind, InstKind::Call { .. })
    }

    /// Candidate values of a switch, sorted and deduplicated
    ///
    /// Returns None for non-switch instructions.
    pub fn switch_values(&self) -> Option<Vec<i64>> {
        let mut values: Vec<i64> = match &self.kind {
            InstKind::Switch { cases, .. } => cases.iter().map(|&(v, _)| v).collect(),
            // Keys past i64::MAX cannot be switched on
            InstKind::TableSwitch { min, targets, .. } => {
                (0..targets.len() as i64).filter_map(|offset| min.checked_add(offset)).collect()
            }
            _ => return None,
        };
        values.sort_unstable();
        values.dedup();
        Some(values)
    }

    /// Target block for a switch key, falling back to the default
    pub fn switch_target(&self, value: i64) -> Option<BlockId> {
        match &self.kind {
            InstKind::Switch { cases, default } => Some(
                cases
                    .iter()
                    .find(|&&(v, _)| v == value)
                    .map(|&(_, b)| b)
                    .unwrap_or(*default),
            ),
            InstKind::TableSwitch { min, targets, default } => Some(
                value
                    .checked_sub(*min)
                    .and_then(|offset| usize::try_from(offset).ok())
                    .and_then(|offset| targets.get(offset).copied())
                    .unwrap_or(*default),
            ),
            _ => None,
        }
    }

    pub fn switch_default(&self) -> Option<BlockId> {
        match &self.kind {
            InstKind::Switch { default, .. } | InstKind::TableSwitch { default, .. } => Some(*default),
            _ => None,
        }
    }
}

/// Block classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    #[default]
    Normal,
    /// Exception handler; only reachable through implicit edges
    Handler,
}

/// Basic block in a method body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Unique identifier within the method
    pub id: BlockId,
    #[serde(default)]
    pub kind: BlockKind,
    /// Instructions in execution order; the last one is the terminator
    pub instructions: Vec<Instruction>,
    /// Successor blocks of the terminator
    #[serde(default)]
    pub successors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn is_handler(&self) -> bool {
        self.kind == BlockKind::Handler
    }

    pub fn first(&self) -> Option<InstId> {
        self.instructions.first().map(|i| i.id)
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last()
    }
}

/// Control-flow body of one method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodBody {
    pub method: MethodId,
    #[serde(default)]
    pub name: String,
    /// Blocks in iteration order; the first block is the entry
    pub blocks: Vec<BasicBlock>,
}

impl MethodBody {
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        // Blocks are usually numbered by position
        match self.blocks.get(id) {
            Some(block) if block.id == id => Some(block),
            _ => self.blocks.iter().find(|b| b.id == id),
        }
    }

    /// First instruction of the entry block
    pub fn entry(&self) -> Option<InstId> {
        self.blocks.first().and_then(BasicBlock::first)
    }

    pub fn first_instruction_of(&self, id: BlockId) -> Option<InstId> {
        self.block(id).and_then(BasicBlock::first)
    }
}

/// Where an instruction lives
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub method: MethodId,
    pub block: &'a BasicBlock,
    pub instruction: &'a Instruction,
}

impl Located<'_> {
    /// Block identity across methods
    pub fn block_key(&self) -> (MethodId, BlockId) {
        (self.method, self.block.id)
    }
}

/// Source of method bodies
///
/// Consulted at registration time and when a trace reaches an
/// instruction the coverage graph does not know yet.
pub trait BodyProvider {
    fn body(&self, method: MethodId) -> Option<&MethodBody>;

    fn locate(&self, inst: InstId) -> Option<Located<'_>>;

    /// First instruction of block `block` in the method containing `inst`
    fn first_in_block_of(&self, inst: InstId, block: BlockId) -> Option<InstId> {
        let located = self.locate(inst)?;
        self.body(located.method)?.first_instruction_of(block)
    }
}

/// In-memory body provider with an instruction index
#[derive(Debug, Clone, Default)]
pub struct Program {
    bodies: HashMap<MethodId, MethodBody>,
    index: HashMap<InstId, (MethodId, usize, usize)>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bodies(bodies: impl IntoIterator<Item = MethodBody>) -> Self {
        let mut program = Self::new();
        for body in bodies {
            program.insert(body);
        }
        program
    }

    /// Add or replace a method body and index its instructions
    pub fn insert(&mut self, body: MethodBody) {
        let method = body.method;
        if let Some(old) = self.bodies.remove(&method) {
            for inst in old.blocks.iter().flat_map(|b| b.instructions.iter()) {
                self.index.remove(&inst.id);
            }
        }
        for (b, block) in body.blocks.iter().enumerate() {
            for (i, inst) in block.instructions.iter().enumerate() {
                self.index.insert(inst.id, (method, b, i));
            }
        }
        self.bodies.insert(method, body);
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodBody> {
        self.bodies.values()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl BodyProvider for Program {
    fn body(&self, method: MethodId) -> Option<&MethodBody> {
        self.bodies.get(&method)
    }

    fn locate(&self, inst: InstId) -> Option<Located<'_>> {
        let &(method, b, i) = self.index.get(&inst)?;
        let block = self.bodies.get(&method)?.blocks.get(b)?;
        Some(Located {
            method,
            block,
            instruction: block.instructions.get(i)?,
        })
    }
}

/// Fixture builders shared by unit tests across modules
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn plain(id: u32) -> Instruction {
        Instruction { id: InstId(id), kind: InstKind::Plain }
    }

    pub fn inst(id: u32, kind: InstKind) -> Instruction {
        Instruction { id: InstId(id), kind }
    }

    pub fn block(id: BlockId, instructions: Vec<Instruction>, successors: Vec<BlockId>) -> BasicBlock {
        BasicBlock { id, kind: BlockKind::Normal, instructions, successors }
    }

    pub fn handler(id: BlockId, instructions: Vec<Instruction>) -> BasicBlock {
        BasicBlock { id, kind: BlockKind::Handler, instructions, successors: vec![] }
    }

    pub fn body(method: u32, blocks: Vec<BasicBlock>) -> MethodBody {
        MethodBody { method: MethodId(method), name: format!("m{}", method), blocks }
    }

    /// Method 0: `if (c) { 3 } else { 4 }; return`
    ///
    /// ```text
    /// b0: i0 plain, i1 branch(T->b1, F->b2)
    /// b1: i2 plain            -> b3
    /// b2: i3 plain            -> b3
    /// b3: i4 return
    /// ```
    pub fn diamond() -> MethodBody {
        body(
            0,
            vec![
                block(0, vec![plain(0), inst(1, InstKind::Branch { true_target: 1, false_target: 2 })], vec![1, 2]),
                block(1, vec![plain(2)], vec![3]),
                block(2, vec![plain(3)], vec![3]),
                block(3, vec![inst(4, InstKind::Return)], vec![]),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_program_locate() {
        let program = Program::from_bodies(vec![diamond()]);

        let located = program.locate(InstId(3)).unwrap();
        assert_eq!(located.method, MethodId(0));
        assert_eq!(located.block.id, 2);
        assert_eq!(located.instruction.id, InstId(3));
        assert!(program.locate(InstId(99)).is_none());
    }

    #[test]
    fn test_program_replace_reindexes() {
        let mut program = Program::from_bodies(vec![diamond()]);
        program.insert(body(0, vec![block(0, vec![plain(10)], vec![])]));

        assert!(program.locate(InstId(1)).is_none());
        assert_eq!(program.locate(InstId(10)).unwrap().block.id, 0);
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_entry_and_first_in_block() {
        let program = Program::from_bodies(vec![diamond()]);
        let body = program.body(MethodId(0)).unwrap();

        assert_eq!(body.entry(), Some(InstId(0)));
        assert_eq!(program.first_in_block_of(InstId(1), 2), Some(InstId(3)));
        assert_eq!(program.first_in_block_of(InstId(1), 7), None);
    }

    #[test]
    fn test_switch_values_and_targets() {
        let switch = inst(0, InstKind::Switch { cases: vec![(3, 1), (1, 2), (3, 1)], default: 9 });
        assert_eq!(switch.switch_values(), Some(vec![1, 3]));
        assert_eq!(switch.switch_target(1), Some(2));
        assert_eq!(switch.switch_target(42), Some(9));

        let table = inst(1, InstKind::TableSwitch { min: 5, targets: vec![1, 2], default: 3 });
        assert_eq!(table.switch_values(), Some(vec![5, 6]));
        assert_eq!(table.switch_target(6), Some(2));
        assert_eq!(table.switch_target(4), Some(3));
        assert_eq!(table.switch_target(7), Some(3));

        assert_eq!(plain(2).switch_values(), None);
    }

    #[test]
    fn test_table_switch_at_key_limit() {
        let table = inst(0, InstKind::TableSwitch { min: i64::MAX - 1, targets: vec![1, 2, 3], default: 4 });
        assert_eq!(table.switch_values(), Some(vec![i64::MAX - 1, i64::MAX]));
        assert_eq!(table.switch_target(i64::MAX), Some(2));

        let top = inst(1, InstKind::TableSwitch { min: i64::MAX, targets: vec![1, 2], default: 3 });
        assert_eq!(top.switch_values(), Some(vec![i64::MAX]));
        assert_eq!(top.switch_target(i64::MIN), Some(3));
    }
}
