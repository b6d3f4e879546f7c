//! Code generation from the fully annotated tree.
//!
//! Walks the tree in sequence order emitting opcodes through
//! [`Program`]'s helpers. A context stack of enclosing function and
//! block frames tracks how many locals are live, so returns and block
//! exits pop exactly what the frame holds.

mod program;

use clear_bytecode::{Code, Constant, Opcode};

use crate::ast::{
    Ast, BindingId, BlockId, DeclId, DeclKind, ExprId, ExprKind, FuncBody, FuncId, IndexKind,
    Stmt,
};
use crate::types::{BUILTINS, Type};

use program::Program;

#[cfg(test)]
mod codegen_tests;

/// Produces the constant pool and instruction stream for a checked tree.
pub fn generate(ast: &Ast) -> (Vec<Constant>, Vec<Code>) {
    let mut generator = CodeGenerator {
        ast,
        program: Program::new(),
        frames: Vec::new(),
    };
    for decl in &ast.sequence {
        generator.gen_decl(*decl);
    }
    (generator.program.constants, generator.program.code)
}

enum Frame {
    Function { func: FuncId, declared: usize },
    Block { declared: usize },
}

struct CodeGenerator<'a> {
    ast: &'a Ast,
    program: Program,
    frames: Vec<Frame>,
}

impl CodeGenerator<'_> {
    /// Records a local that now occupies a slot in the innermost frame.
    fn note_local(&mut self, binding: BindingId) {
        if self.ast.binding(binding).index.kind != IndexKind::Local {
            return;
        }
        if let Some(Frame::Function { declared, .. } | Frame::Block { declared }) =
            self.frames.last_mut()
        {
            *declared += 1;
        }
    }

    fn gen_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                self.gen_expr(data.init);
                if data.bindings.len() == 1 {
                    let binding = data.bindings[0];
                    self.program.declare(self.ast.binding(binding).index);
                    self.note_local(binding);
                } else {
                    // Spread the tuple into one slot per binding, skipping
                    // its type tag, then declare back to front.
                    self.program.op(Opcode::Destruct);
                    self.program.index(1);
                    for &binding in data.bindings.iter().rev() {
                        self.program.declare(self.ast.binding(binding).index);
                    }
                    for &binding in &data.bindings {
                        self.note_local(binding);
                    }
                }
            }
            DeclKind::Func(func) => {
                let func = *func;
                self.gen_function(func);
                if let Some(binding) = self.ast.func(func).binding {
                    self.program.declare(self.ast.binding(binding).index);
                    self.note_local(binding);
                }
            }
            DeclKind::Struct(data) => {
                // A struct declaration only emits its generators, each
                // declared like a function in the enclosing scope.
                for &func in &data.generators {
                    self.gen_function(func);
                    if let Some(binding) = self.ast.func(func).binding {
                        self.program.declare(self.ast.binding(binding).index);
                        self.note_local(binding);
                    }
                }
            }
            DeclKind::Stmt(_) => self.gen_stmt(id),
        }
    }

    fn return_type(&self, func: FuncId) -> Type {
        match self.ast.func(func).ty.as_function() {
            Some((_, ret)) => ret.clone(),
            None => Type::unresolved(),
        }
    }

    /// Number of slots the function scope owns: `this`, parameters, and
    /// body-level locals declared so far.
    fn function_scope_slots(&self, func: FuncId, declared: usize) -> usize {
        let info = self.ast.func(func);
        info.params.len() + usize::from(info.this_binding.is_some()) + declared
    }

    fn gen_function(&mut self, func: FuncId) {
        let info = self.ast.func(func);
        let patch = self.program.begin_function(&info.ty);
        self.frames.push(Frame::Function { func, declared: 0 });

        match info.body {
            FuncBody::Block(block) => {
                for &decl in &self.ast.block(block).decls {
                    self.gen_decl(decl);
                }
                if self.return_type(func) == Type::void() {
                    self.gen_implicit_return(func);
                }
            }
            FuncBody::Expr(expr) => {
                self.gen_expr(expr);
                if self.ast.expr(expr).ty != Type::void() {
                    self.program.op(Opcode::SetReturn);
                }
                for _ in &self.ast.func(func).params {
                    self.program.op(Opcode::Pop);
                }
                self.program.emit_return();
            }
        }

        self.frames.pop();
        self.program
            .end_function(patch, &self.ast.func(func).upvalue_indices);
    }

    /// Falling off the end of a void function returns without a value.
    fn gen_implicit_return(&mut self, func: FuncId) {
        let declared = match self.frames.last() {
            Some(Frame::Function { declared, .. }) => *declared,
            _ => 0,
        };
        for _ in 0..self.function_scope_slots(func, declared) {
            self.program.op(Opcode::Pop);
        }
        self.program.emit_return();
    }

    fn gen_block(&mut self, block: BlockId) {
        self.frames.push(Frame::Block { declared: 0 });
        for &decl in &self.ast.block(block).decls {
            self.gen_decl(decl);
        }
        let declared = match self.frames.pop() {
            Some(Frame::Block { declared }) => declared,
            _ => 0,
        };
        for _ in 0..declared {
            self.program.op(Opcode::Pop);
        }
    }

    fn gen_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        match stmt {
            Stmt::Print(expr) => {
                match expr {
                    Some(expr) => {
                        self.gen_expr(*expr);
                        if self.ast.expr(*expr).ty != Type::str() {
                            self.program.op(Opcode::Str);
                        }
                    }
                    // A blank print prints an empty string.
                    None => self.program.constant(Constant::Str(String::new())),
                }
                self.program.op(Opcode::Print);
            }
            Stmt::Block(block) => self.gen_block(*block),
            Stmt::If { arms, else_block } => {
                let mut end_jumps = Vec::new();
                for &(cond, block) in arms {
                    self.gen_expr(cond);
                    // A taken branch runs its block and jumps to the end;
                    // otherwise fall through to the next test.
                    let skip = self.program.begin_jump(Some(false));
                    self.gen_block(block);
                    end_jumps.push(self.program.begin_jump(None));
                    self.program.end_jump(skip);
                }
                if let Some(block) = else_block {
                    self.gen_block(*block);
                }
                for jump in end_jumps {
                    self.program.end_jump(jump);
                }
            }
            Stmt::While { cond, block } => {
                let entry = self.program.start_loop();
                match cond {
                    Some(cond) => {
                        self.gen_expr(*cond);
                        let exit = self.program.begin_jump(Some(false));
                        self.gen_block(*block);
                        self.program.loop_back(entry);
                        self.program.end_jump(exit);
                    }
                    None => {
                        self.gen_block(*block);
                        self.program.loop_back(entry);
                    }
                }
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.gen_expr(*expr);
                    self.program.op(Opcode::SetReturn);
                }
                self.gen_return_pops();
                self.program.emit_return();
            }
            Stmt::Expr(expr) => {
                self.gen_expr(*expr);
                if self.ast.expr(*expr).ty != Type::void() {
                    self.program.op(Opcode::Pop);
                }
            }
            Stmt::Set { target, value } => {
                self.gen_expr(*value);
                if let ExprKind::Ident { index, .. } = &self.ast.expr(*target).kind {
                    self.program.set(*index);
                }
            }
        }
    }

    /// Pops every live local in every scope between the return point and
    /// the function root, including the parameters.
    fn gen_return_pops(&mut self) {
        let mut pops = 0;
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Block { declared } => pops += declared,
                Frame::Function { func, declared } => {
                    pops += self.function_scope_slots(*func, *declared);
                    break;
                }
            }
        }
        for _ in 0..pops {
            self.program.op(Opcode::Pop);
        }
    }

    fn gen_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Int(value) => self.program.constant(Constant::Int(*value)),
            ExprKind::Num(value) => self.program.constant(Constant::Num(*value)),
            ExprKind::Str(value) => self.program.constant(Constant::Str(value.clone())),
            ExprKind::Bool(value) => self.program.op(if *value {
                Opcode::PushTrue
            } else {
                Opcode::PushFalse
            }),
            ExprKind::Nil => self.program.op(Opcode::PushNil),
            ExprKind::Ident { name, ref_, index } => {
                if ref_.is_none() && BUILTINS.contains_key(name.as_str()) {
                    self.gen_builtin_closure(name);
                } else {
                    self.program.load(*index);
                }
            }
            ExprKind::Unary {
                operand, opcodes, ..
            } => {
                self.gen_expr(*operand);
                for &op in opcodes {
                    self.program.op(op);
                }
            }
            ExprKind::Binary {
                op: crate::ast::BinaryOp::And,
                lhs,
                rhs,
                ..
            } => {
                // Short-circuit: a false left operand is the result.
                self.gen_expr(*lhs);
                let when_false = self.program.begin_jump(Some(false));
                self.gen_expr(*rhs);
                let end = self.program.begin_jump(None);
                self.program.end_jump(when_false);
                self.program.op(Opcode::PushFalse);
                self.program.end_jump(end);
            }
            ExprKind::Binary {
                op: crate::ast::BinaryOp::Or,
                lhs,
                rhs,
                ..
            } => {
                // Short-circuit: a true left operand is the result.
                self.gen_expr(*lhs);
                let when_true = self.program.begin_jump(Some(true));
                self.gen_expr(*rhs);
                let end = self.program.begin_jump(None);
                self.program.end_jump(when_true);
                self.program.op(Opcode::PushTrue);
                self.program.end_jump(end);
            }
            ExprKind::Binary {
                lhs, rhs, opcodes, ..
            } => {
                self.gen_expr(*lhs);
                self.gen_expr(*rhs);
                for &op in opcodes {
                    self.program.op(op);
                }
            }
            ExprKind::Call { callee, args } => self.gen_call(*callee, args),
            ExprKind::Tuple(elements) => {
                let ty = self.ast.expr(id).ty.clone();
                self.program.begin_struct(&ty);
                for &element in elements {
                    self.gen_expr(element);
                }
                self.program.end_struct(elements.len());
            }
            ExprKind::Lambda(func) => self.gen_function(*func),
            ExprKind::Case {
                binding,
                target,
                arms,
                fallback,
            } => self.gen_case(id, *target, *binding, arms, *fallback),
            ExprKind::Construct { .. } => self.gen_construct(id),
            ExprKind::Access {
                target,
                field,
                field_span: _,
            } => {
                self.gen_expr(*target);
                let target_ty = &self.ast.expr(*target).ty;
                if let Some(offset) = target_ty
                    .as_struct()
                    .and_then(|decl| self.field_offset(decl, field))
                {
                    self.program.op(Opcode::GetField);
                    self.program.index(offset);
                }
            }
        }
    }

    /// A builtin name used as a value becomes a synthesized closure that
    /// forwards its parameters to the builtin opcode.
    fn gen_builtin_closure(&mut self, name: &str) {
        let builtin = &BUILTINS[name];
        let Some((params, ret)) = builtin.ty.as_function() else {
            return;
        };
        let (param_count, non_void) = (params.len(), *ret != Type::void());

        let patch = self.program.begin_function(&builtin.ty);
        for i in 0..param_count {
            self.program.op(Opcode::PushLocal);
            self.program.index(1 + i as i32);
        }
        self.program.op(builtin.opcode);
        if non_void {
            self.program.op(Opcode::SetReturn);
        }
        for _ in 0..param_count {
            self.program.op(Opcode::Pop);
        }
        self.program.emit_return();
        self.program.end_function(patch, &[]);
    }

    fn gen_call(&mut self, callee: ExprId, args: &[ExprId]) {
        // A direct builtin call skips the closure object entirely.
        if let ExprKind::Ident { name, ref_: None, .. } = &self.ast.expr(callee).kind {
            if let Some(builtin) = BUILTINS.get(name.as_str()) {
                let opcode = builtin.opcode;
                for &arg in args {
                    self.gen_expr(arg);
                }
                self.program.op(opcode);
                return;
            }
        }
        self.gen_expr(callee);
        for &arg in args {
            self.gen_expr(arg);
        }
        let non_void = match self.ast.expr(callee).ty.as_function() {
            Some((_, ret)) => *ret != Type::void(),
            None => true,
        };
        self.program.call(args.len(), non_void);
    }

    fn gen_case(
        &mut self,
        id: ExprId,
        target: ExprId,
        binding: BindingId,
        arms: &[(crate::ast::TypeExprId, ExprId)],
        fallback: ExprId,
    ) {
        self.gen_expr(target);
        let void_result = self.ast.expr(id).ty == Type::void();
        let slot = self.ast.binding(binding).index;
        let mut end_jumps = Vec::new();

        for &(arm_type, value) in arms {
            let arm_ty = self.ast.type_expr(arm_type).ty.clone();
            self.program.match_type(slot, &arm_ty);
            let skip = self.program.begin_jump(Some(false));
            self.gen_expr(value);
            // The result replaces the dispatched-on temporary.
            self.program.op(if void_result {
                Opcode::Pop
            } else {
                Opcode::Squash
            });
            end_jumps.push(self.program.begin_jump(None));
            self.program.end_jump(skip);
        }

        self.gen_expr(fallback);
        self.program.op(if void_result {
            Opcode::Pop
        } else {
            Opcode::Squash
        });
        for jump in end_jumps {
            self.program.end_jump(jump);
        }
    }

    fn gen_construct(&mut self, id: ExprId) {
        let ExprKind::Construct {
            ref_, inits, index, ..
        } = &self.ast.expr(id).kind
        else {
            return;
        };
        let Some(decl) = *ref_ else { return };
        let slot = *index;
        let data = self.ast.struct_decl(decl);
        let ty = self.ast.expr(id).ty.clone();

        let field_count = data.params.len() + data.generators.len();
        self.program.begin_struct(&ty);
        // Fields load in declaration order, found by label.
        for param in &data.params {
            let field_name = &self.ast.binding(param.binding).name;
            if let Some(init) = inits.iter().find(|init| &init.name == field_name) {
                self.gen_expr(init.value);
            }
        }
        // Generator slots initially hold the generator closures.
        for &func in &data.generators {
            if let Some(binding) = self.ast.func(func).binding {
                self.program.load(self.ast.binding(binding).index);
            }
        }
        self.program.end_struct(field_count);

        // Run each generator over the partial struct and store its result
        // into the slot its closure occupied.
        let mut offset = data.params.len();
        for _ in &data.generators {
            self.program.op(Opcode::ExtractField);
            self.program.index(0);
            self.program.index(1 + offset as i32);
            self.program.load(slot);
            self.program.call(1, true);
            self.program.op(Opcode::SetField);
            self.program.index(1 + offset as i32);
            offset += 1;
        }
    }

    /// Field offsets include the type-tag slot: parameters first, then
    /// generator results.
    fn field_offset(&self, decl: DeclId, field: &str) -> Option<i32> {
        let data = self.ast.struct_decl(decl);
        for (position, param) in data.params.iter().enumerate() {
            if self.ast.binding(param.binding).name == field {
                return Some(1 + position as i32);
            }
        }
        for (position, func) in data.generators.iter().enumerate() {
            let binding = self.ast.func(*func).binding?;
            if self.ast.binding(binding).name == field {
                return Some(1 + (data.params.len() + position) as i32);
            }
        }
        None
    }
}
