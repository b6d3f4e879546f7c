//! Low-level emission state: instruction list, constant pool, type tags,
//! and the jump/loop/closure/struct helpers the generator builds on.

use clear_bytecode::{Code, Constant, ObjectTag, Opcode, ValueTag, code_size};

use crate::ast::{Index, IndexKind};
use crate::types::{Builtin, Type, UnitType};

pub(crate) struct Program {
    pub code: Vec<Code>,
    pub constants: Vec<Constant>,
    /// Types that received a runtime tag, in tag order.
    pub type_tags: Vec<Type>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            type_tags: Vec::new(),
        }
    }

    pub fn op(&mut self, opcode: Opcode) {
        self.code.push(Code::Op(opcode));
    }

    pub fn index(&mut self, value: i32) {
        self.code.push(Code::Index(value));
    }

    /// Takes the value on top of the stack and declares it as `index`.
    /// Locals stay where they are; params and upvalues are owned by the
    /// caller or the enclosing function and are never declared.
    pub fn declare(&mut self, index: Index) {
        if index.kind == IndexKind::Global {
            self.op(Opcode::SetGlobal);
            self.index(index.value);
        }
    }

    /// Loads the closure struct, then the given upvalue slot from it.
    /// Slot 0 is the closure itself.
    fn get_upvalue(&mut self, value: i32) {
        self.op(Opcode::PushLocal);
        self.index(0);
        if value != 0 {
            self.op(Opcode::GetField);
            self.index(1 + value);
        }
    }

    pub fn load(&mut self, index: Index) {
        match index.kind {
            IndexKind::Global => {
                self.op(Opcode::PushGlobal);
                self.index(index.value);
            }
            IndexKind::Upvalue => {
                self.get_upvalue(index.value);
                if index.value != 0 {
                    self.op(Opcode::Deref);
                }
            }
            _ => {
                self.op(Opcode::PushLocal);
                self.index(index.value);
            }
        }
    }

    pub fn set(&mut self, index: Index) {
        match index.kind {
            IndexKind::Global => {
                self.op(Opcode::SetGlobal);
                self.index(index.value);
            }
            IndexKind::Upvalue => {
                self.get_upvalue(index.value);
                self.op(Opcode::SetRef);
            }
            _ => {
                self.op(Opcode::SetLocal);
                self.index(index.value);
            }
        }
    }

    /// With the function and `args` arguments on the stack: fetch the ip
    /// from under the arguments (the first field past the type tag) and
    /// call. A non-void result is pushed back afterwards.
    pub fn call(&mut self, args: usize, non_void: bool) {
        self.op(Opcode::ExtractField);
        self.index(args as i32);
        self.index(1);
        self.op(Opcode::Call);
        self.index(args as i32 + 1);
        if non_void {
            self.op(Opcode::PushReturn);
        }
    }

    /// Emits a capture cell for a closure being built: either a fresh ref
    /// to a local slot, or the enclosing closure's own upvalue.
    pub fn upvalue(&mut self, index: Index) {
        if index.kind == IndexKind::Upvalue {
            self.get_upvalue(index.value);
        } else {
            // Globals are never captured, so this is a frame slot.
            self.op(Opcode::RefLocal);
            self.index(index.value);
        }
    }

    /// Loads a constant, deduplicating against the pool.
    pub fn constant(&mut self, value: Constant) {
        let index = match self.constants.iter().position(|c| *c == value) {
            Some(index) => index,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        };
        self.op(Opcode::PushConst);
        self.index(index as i32);
    }

    /// Emits a jump with a placeholder offset and returns the placeholder
    /// position for [`end_jump`](Self::end_jump). `None` jumps
    /// unconditionally; `Some(sense)` jumps when the popped value equals
    /// `sense`.
    pub fn begin_jump(&mut self, condition: Option<bool>) -> usize {
        match condition {
            None => self.op(Opcode::Jump),
            Some(sense) => {
                if sense {
                    self.op(Opcode::Not);
                }
                self.op(Opcode::JumpIfFalse);
            }
        }
        let patch = self.code.len();
        self.index(0);
        patch
    }

    /// Patches a placeholder to the byte size of the code emitted since.
    pub fn end_jump(&mut self, patch: usize) {
        let size = code_size(&self.code[patch + 1..]);
        self.code[patch] = Code::Index(size as i32);
    }

    /// Remembers the loop entry for [`loop_back`](Self::loop_back).
    pub fn start_loop(&self) -> usize {
        self.code.len()
    }

    /// Emits a back-jump whose offset spans from the loop entry to just
    /// past its own operand.
    pub fn loop_back(&mut self, target: usize) {
        self.op(Opcode::Loop);
        let patch = self.code.len();
        self.index(0);
        let size = code_size(&self.code[target..]);
        self.code[patch] = Code::Index(size as i32);
    }

    /// Returns from the current call: drop the closure, restore the
    /// caller's frame and instruction pointers.
    pub fn emit_return(&mut self) {
        self.op(Opcode::Pop);
        self.op(Opcode::LoadFp);
        self.op(Opcode::LoadIp);
    }

    /// Runtime tag for a type, assigning a fresh one on first use.
    fn tag_of(&mut self, ty: &Type) -> i32 {
        match self.type_tags.iter().position(|t| t == ty) {
            Some(index) => index as i32,
            None => {
                self.type_tags.push(ty.clone());
                self.type_tags.len() as i32 - 1
            }
        }
    }

    /// Starts a type-tagged struct: pushes the tag, then the caller
    /// pushes the fields and closes with
    /// [`end_struct`](Self::end_struct).
    pub fn begin_struct(&mut self, ty: &Type) {
        let tag = self.tag_of(ty);
        self.constant(Constant::Int(tag));
    }

    pub fn end_struct(&mut self, field_count: usize) {
        self.op(Opcode::Struct);
        self.index(field_count as i32 + 1);
    }

    /// Starts a closure struct: the tag, then `FUNCTION` with a size
    /// placeholder. Returns the placeholder for
    /// [`end_function`](Self::end_function).
    pub fn begin_function(&mut self, ty: &Type) -> usize {
        self.begin_struct(ty);
        self.op(Opcode::Function);
        let patch = self.code.len();
        self.index(0);
        patch
    }

    /// Patches the body size, loads the captures above the instruction
    /// pointer, and closes the closure struct.
    pub fn end_function(&mut self, patch: usize, upvalues: &[Index]) {
        let size = code_size(&self.code[patch + 1..]);
        self.code[patch] = Code::Index(size as i32);
        for &upvalue in upvalues {
            self.upvalue(upvalue);
        }
        self.end_struct(1 + upvalues.len());
    }

    /// Tests whether the value at `index` has type `ty`, leaving a single
    /// bool on the stack: a chain of `IS_VAL_TYPE` / `IS_OBJ_TYPE` /
    /// tag-compare tests, each match short-circuiting to true.
    pub fn match_type(&mut self, index: Index, ty: &Type) {
        self.load(index);
        let mut end_jumps = Vec::new();

        let units: Vec<UnitType> = ty.units().cloned().collect();
        for unit in units {
            match value_tag(&unit) {
                Some(tag) => {
                    self.op(Opcode::IsValType);
                    self.index(tag as i32);
                    let jump = self.match_hit(&mut end_jumps);
                    self.end_jump(jump);
                }
                None => {
                    self.op(Opcode::IsValType);
                    self.index(ValueTag::Obj as i32);
                    let obj_skip = self.begin_jump(Some(false));
                    if unit == UnitType::Builtin(Builtin::Str) {
                        self.op(Opcode::IsObjType);
                        self.index(ObjectTag::String as i32);
                        let jump = self.match_hit(&mut end_jumps);
                        self.end_jump(jump);
                    }
                    if matches!(
                        unit,
                        UnitType::Function { .. } | UnitType::Tuple(_) | UnitType::Struct { .. }
                    ) {
                        self.op(Opcode::IsObjType);
                        self.index(ObjectTag::Struct as i32);
                        let struct_skip = self.begin_jump(Some(false));
                        let tags: Vec<usize> = self
                            .type_tags
                            .iter()
                            .enumerate()
                            .filter(|(_, tagged)| tagged.units().any(|u| *u == unit))
                            .map(|(i, _)| i)
                            .collect();
                        for tag in tags {
                            self.op(Opcode::ExtractField);
                            self.index(0);
                            self.index(0);
                            self.constant(Constant::Int(tag as i32));
                            self.op(Opcode::Equal);
                            let jump = self.match_hit(&mut end_jumps);
                            self.end_jump(jump);
                        }
                        self.end_jump(struct_skip);
                    }
                    self.end_jump(obj_skip);
                }
            }
        }

        // Nothing matched: replace the target with false.
        self.op(Opcode::Pop);
        self.op(Opcode::PushFalse);
        for jump in end_jumps {
            self.end_jump(jump);
        }
    }

    /// One successful test: consume the check result, replace the target
    /// with true, and jump to the end of the chain. Returns the skip jump
    /// to patch past this hit.
    fn match_hit(&mut self, end_jumps: &mut Vec<usize>) -> usize {
        let skip = self.begin_jump(Some(false));
        self.op(Opcode::Pop);
        self.op(Opcode::PushTrue);
        end_jumps.push(self.begin_jump(None));
        skip
    }
}

fn value_tag(unit: &UnitType) -> Option<ValueTag> {
    match unit {
        UnitType::Builtin(Builtin::Bool) => Some(ValueTag::Bool),
        UnitType::Builtin(Builtin::Nil) => Some(ValueTag::Nil),
        UnitType::Builtin(Builtin::Int) => Some(ValueTag::Int),
        UnitType::Builtin(Builtin::Num) => Some(ValueTag::Num),
        _ => None,
    }
}
