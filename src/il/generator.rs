use crate::{
    ast::{Ast, BinOp, CaseArm, ExprId, ExprKind, LetBinding, UnOp},
    builtins::{Builtin, SELF_TYPE},
    error::{error, LowerError, LowerErrorKind},
    prelude::*,
};

use super::{optimiser::optimise, scope::Binding, stream::InstructionStream, tac::*};

type Result<T> = std::result::Result<T, LowerError>;

/// Lower the expression `node` into `stream`. The value of the expression ends up in
/// `destination`, or in a fresh symbol if no destination is given. Returns the symbol
/// holding the value.
///
/// With `resolve_phi` set, an assignment that copies a variable which was rebound since it
/// came into scope is emitted as a ɸ-function of the old and the new value.
pub fn lower(
    ast: &Ast,
    node: ExprId,
    stream: &mut InstructionStream,
    destination: Option<Symbol>,
    resolve_phi: bool,
) -> Result<Symbol> {
    TacGenerator { ast }.lower(node, stream, destination, resolve_phi)
}

/// The object a method is dispatched on.
enum Receiver<'a> {
    Dynamic(ExprId),
    Static(ExprId, &'a str),
    SelfObject,
}

struct TacGenerator<'a> {
    ast: &'a Ast,
}
impl<'a> TacGenerator<'a> {
    /// Lower an expression.
    fn lower(
        &self,
        node: ExprId,
        stream: &mut InstructionStream,
        destination: Option<Symbol>,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        let destination = match destination {
            Some(destination) => destination,
            None => stream.request_fresh_symbol(),
        };
        let expr = match self.ast.get(node) {
            Some(expr) => expr,
            None => return error(LowerErrorKind::DanglingNode(node), 0),
        };
        let line = expr.line;
        trace!("Lower {} at line {} into {}", expr.kind.name(), line, destination);

        let instr = match &expr.kind {
            ExprKind::Assign { name, value } => {
                return self.lower_assign(name, *value, line, stream, destination, resolve_phi)
            }
            ExprKind::Dispatch {
                receiver,
                method,
                args,
            } => {
                let receiver = Receiver::Dynamic(*receiver);
                return self
                    .lower_dispatch(receiver, method, args, line, stream, destination, resolve_phi);
            }
            ExprKind::StaticDispatch {
                receiver,
                type_name,
                method,
                args,
            } => {
                let receiver = Receiver::Static(*receiver, type_name);
                return self
                    .lower_dispatch(receiver, method, args, line, stream, destination, resolve_phi);
            }
            ExprKind::SelfDispatch { method, args } => {
                let receiver = Receiver::SelfObject;
                return self
                    .lower_dispatch(receiver, method, args, line, stream, destination, resolve_phi);
            }
            ExprKind::If {
                predicate,
                then_branch,
                else_branch,
            } => {
                return self.lower_if(
                    *predicate,
                    *then_branch,
                    *else_branch,
                    line,
                    stream,
                    destination,
                    resolve_phi,
                )
            }
            ExprKind::While { predicate, body } => {
                return self.lower_while(*predicate, *body, line, stream, destination, resolve_phi)
            }
            ExprKind::Block(exprs) => {
                return self.lower_block(exprs, stream, destination, resolve_phi)
            }
            ExprKind::Let { bindings, body } => {
                return self.lower_let(bindings, *body, line, stream, destination, resolve_phi)
            }
            ExprKind::Case { scrutinee, arms } => {
                return self
                    .lower_case(node, *scrutinee, arms, line, stream, destination, resolve_phi)
            }
            ExprKind::Binary(op, left, right) => {
                return self
                    .lower_binary(*op, *left, *right, line, stream, destination, resolve_phi)
            }
            ExprKind::Internal(name) => {
                Instruction::call(destination.clone(), Symbol::Intrinsic(name.clone()), vec![])
            }
            ExprKind::New(type_name) => Instruction::new_object(destination.clone(), type_name),
            ExprKind::IsVoid(value) => {
                let value = self.lower(*value, stream, None, resolve_phi)?;
                Instruction::is_void(destination.clone(), value)
            }
            ExprKind::Unary(op, operand) => {
                let operand = self.lower(*operand, stream, None, resolve_phi)?;
                Instruction::unary(*op, destination.clone(), operand)
            }
            ExprKind::Integer(i) => Instruction::constant(destination.clone(), Symbol::Integer(*i)),
            ExprKind::Str(s) => Instruction::constant(destination.clone(), Symbol::Str(s.clone())),
            ExprKind::Bool(b) => Instruction::constant(destination.clone(), Symbol::Bool(*b)),
            ExprKind::Identifier(name) => {
                let version = stream.latest_version_of(name);
                Instruction::assign(destination.clone(), Symbol::variable(name, version))
            }
            kind @ ExprKind::NoExpr => {
                return error(LowerErrorKind::UnhandledNode(kind.name()), line)
            }
        };

        stream.append(instr.at_line(line), resolve_phi);
        Ok(destination)
    }

    /// Lower an assignment. The value is computed straight into the next version of the
    /// variable, which is then copied into the destination.
    fn lower_assign(
        &self,
        name: &str,
        value: ExprId,
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        let version = stream.latest_version_of(name) + 1;
        let target = Symbol::variable(name, version);
        let value = self.lower(value, stream, Some(target), resolve_phi)?;

        stream.append(
            Instruction::assign(destination.clone(), value).at_line(line),
            resolve_phi,
        );
        Ok(destination)
    }

    /// Lower a method call. Arguments are evaluated left to right, then the receiver, which is
    /// passed as the last argument.
    #[allow(clippy::too_many_arguments)]
    fn lower_dispatch(
        &self,
        receiver: Receiver,
        method: &str,
        args: &[ExprId],
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        stream.append(Instruction::ignore(), resolve_phi);

        let mut arguments = Vec::with_capacity(args.len() + 1);
        for arg in args {
            arguments.push(self.lower(*arg, stream, None, resolve_phi)?);
        }

        let current_class = stream.context().class_index;
        let (class_index, dispatch, receiver) = match receiver {
            Receiver::Dynamic(expr) => {
                let class_index = match self.ast.get(expr) {
                    Some(expr) if expr.static_type == SELF_TYPE => current_class,
                    Some(expr) => self.resolve_class(stream, &expr.static_type, line)?,
                    None => return error(LowerErrorKind::DanglingNode(expr), line),
                };
                let value = self.lower(expr, stream, None, resolve_phi)?;
                (class_index, DispatchKind::Virtual, value)
            }
            Receiver::Static(expr, type_name) => {
                let class_index = self.resolve_class(stream, type_name, line)?;
                let value = self.lower(expr, stream, None, resolve_phi)?;
                (class_index, DispatchKind::Static, value)
            }
            Receiver::SelfObject => (
                current_class,
                DispatchKind::Virtual,
                Symbol::variable("self", 0),
            ),
        };
        arguments.push(receiver);

        let method_index = self.resolve_method(stream, class_index, method, line)?;
        let target = Symbol::Method(MethodRef::new(class_index, method_index, dispatch));
        stream.append(
            Instruction::call(destination.clone(), target, arguments).at_line(line),
            resolve_phi,
        );
        Ok(destination)
    }

    fn resolve_class(&self, stream: &InstructionStream, name: &str, line: usize) -> Result<usize> {
        match stream.context().classes.class_index(name) {
            Some(index) => Ok(index),
            None => error(LowerErrorKind::UnresolvedClass(name.to_string()), line),
        }
    }

    fn resolve_method(
        &self,
        stream: &InstructionStream,
        class_index: usize,
        method: &str,
        line: usize,
    ) -> Result<usize> {
        let class = match stream.context().classes.class(class_index) {
            Some(class) => class,
            None => return error(LowerErrorKind::UnresolvedClass(class_index.to_string()), line),
        };

        match class.method_index(method) {
            Some(index) => Ok(index),
            None => error(
                LowerErrorKind::UnresolvedMethod {
                    class: class.name.clone(),
                    method: method.to_string(),
                },
                line,
            ),
        }
    }

    /// Lower a conditional. The else branch is laid out first, directly after the branch
    /// instruction, so the branch only has to jump when the predicate holds.
    ///
    /// Variables from outside the conditional that either branch rebinds are merged with a
    /// ɸ-function at the join.
    #[allow(clippy::too_many_arguments)]
    fn lower_if(
        &self,
        predicate: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        // Merging the branches may rebind the destination's own variable, so its value is
        // only written once every merge is done.
        if destination.as_variable().is_some() {
            let result = stream.request_fresh_symbol();
            self.lower_if(
                predicate,
                then_branch,
                else_branch,
                line,
                stream,
                result.clone(),
                resolve_phi,
            )?;
            stream.append(
                Instruction::assign(destination.clone(), result).at_line(line),
                resolve_phi,
            );
            return Ok(destination);
        }

        let else_label = stream.next_label();
        let then_label = stream.next_label();
        let join_label = stream.next_label();

        let condition = self.lower(predicate, stream, None, resolve_phi)?;
        stream.append(
            Instruction::branch(condition, then_label).at_line(line),
            resolve_phi,
        );

        stream.append(Instruction::comment("else branch"), resolve_phi);
        stream.append(Instruction::label(else_label), resolve_phi);
        let before = stream.bindings().clone();
        let depth = before.depth();
        let else_result = stream.request_fresh_symbol();
        self.lower(else_branch, stream, Some(else_result.clone()), resolve_phi)?;
        let after_else = stream.bindings().clone();
        stream.append(Instruction::jump(join_label), resolve_phi);

        stream.append(Instruction::comment("then branch"), resolve_phi);
        stream.append(Instruction::label(then_label), resolve_phi);
        stream.restore_bindings(before);
        let then_result = stream.request_fresh_symbol();
        self.lower(then_branch, stream, Some(then_result.clone()), resolve_phi)?;

        let diverged = after_else.diverging(stream.bindings(), depth);

        stream.append(Instruction::comment("if-join"), resolve_phi);
        stream.append(Instruction::label(join_label), resolve_phi);
        stream.append(
            Instruction::phi(destination.clone(), else_result, then_result).at_line(line),
            resolve_phi,
        );

        for (index, from_else, from_then) in diverged {
            let merged = stream.request_fresh_symbol();
            debug!("if-join at line {}: {} = ɸ({}, {})", line, merged, from_else, from_then);
            stream.append(
                Instruction::phi(merged.clone(), from_else, from_then).at_line(line),
                resolve_phi,
            );
            stream.rebind(index, merged);
        }
        Ok(destination)
    }

    /// Lower a loop. The predicate is evaluated at the top of every iteration; the body jumps
    /// back to it unconditionally.
    ///
    /// A variable the body rebinds has two possible values in the predicate: the one from
    /// before the loop and the one from the previous iteration. If the predicate copies the
    /// variable, that copy becomes a ɸ-function of both. Otherwise a new ɸ-function is
    /// inserted right before the predicate and the variable is rebound to it.
    fn lower_while(
        &self,
        predicate: ExprId,
        body: ExprId,
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        let cond_label = stream.next_label();
        let join_label = stream.next_label();
        let before = stream.bindings().clone();

        stream.append(Instruction::comment("while-pred"), resolve_phi);
        stream.append(Instruction::label(cond_label), resolve_phi);
        let cond_start = stream.end();
        let condition = self.lower(predicate, stream, None, resolve_phi)?;
        let negated = stream.request_fresh_symbol();
        stream.append(
            Instruction::unary(UnOp::Not, negated.clone(), condition).at_line(line),
            resolve_phi,
        );
        stream.append(
            Instruction::branch(negated, join_label).at_line(line),
            resolve_phi,
        );
        let cond_end = stream.end();

        stream.append(Instruction::comment("while-body"), resolve_phi);
        let body_result = stream.request_fresh_symbol();
        self.lower(body, stream, Some(body_result), resolve_phi)?;
        stream.append(Instruction::jump(cond_label), resolve_phi);

        let diverged = before.diverging(stream.bindings(), before.depth());
        let mut inserted = 0;
        for (index, pre_loop, post_body) in diverged {
            // Every insertion moves the predicate one position down.
            let range = (cond_start + inserted)..(cond_end + inserted);
            if stream.convert_read_to_phi(range, &pre_loop, &post_body) {
                debug!("while at line {}: back edge of {} merged in predicate", line, pre_loop);
                continue;
            }

            let merged = stream.request_fresh_symbol();
            debug!("while at line {}: {} = ɸ({}, {})", line, merged, post_body, pre_loop);
            stream.insert_at(
                Instruction::phi(merged.clone(), post_body, pre_loop).at_line(line),
                cond_start,
                resolve_phi,
            );
            stream.rebind(index, merged);
            inserted += 1;
        }

        stream.append(Instruction::comment("while-join"), resolve_phi);
        stream.append(Instruction::label(join_label), resolve_phi);
        stream.append(
            Instruction::default_value(destination.clone(), Builtin::Object.name()).at_line(line),
            resolve_phi,
        );
        Ok(destination)
    }

    fn lower_block(
        &self,
        exprs: &[ExprId],
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        if let Some((last, init)) = exprs.split_last() {
            for expr in init {
                self.lower(*expr, stream, None, resolve_phi)?;
            }
            self.lower(*last, stream, Some(destination.clone()), resolve_phi)?;
        }
        Ok(destination)
    }

    /// Lower a let. Every binding is in scope for the initialisers after it, and all of them
    /// for the body.
    fn lower_let(
        &self,
        bindings: &[LetBinding],
        body: ExprId,
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        let depth = stream.bindings().depth();

        for binding in bindings {
            let symbol = stream.request_fresh_symbol();
            match binding.init {
                Some(init) => {
                    self.lower(init, stream, Some(symbol.clone()), resolve_phi)?;
                }
                None => {
                    stream.append(
                        Instruction::default_value(symbol.clone(), &binding.type_name).at_line(line),
                        resolve_phi,
                    );
                }
            }
            stream.push_binding(Binding::new(&binding.name, symbol));
        }

        self.lower(body, stream, Some(destination.clone()), resolve_phi)?;
        stream.truncate_bindings(depth);
        Ok(destination)
    }

    /// Lower a case. Each arm is lowered into a listing of its own, in which the arm's variable
    /// is bound to the value being dispatched on.
    #[allow(clippy::too_many_arguments)]
    fn lower_case(
        &self,
        node: ExprId,
        scrutinee: ExprId,
        arms: &[CaseArm],
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        // Arms write to the case's own result. A variable destination would be rebound
        // separately in every arm, so the result is copied into it afterwards.
        if destination.as_variable().is_some() {
            let result = stream.request_fresh_symbol();
            self.lower_case(node, scrutinee, arms, line, stream, result.clone(), resolve_phi)?;
            stream.append(
                Instruction::assign(destination.clone(), result).at_line(line),
                resolve_phi,
            );
            return Ok(destination);
        }

        let value = stream.request_fresh_symbol();
        self.lower(scrutinee, stream, Some(value.clone()), resolve_phi)?;

        let mut branches = Vec::with_capacity(arms.len());
        for arm in arms {
            let mut branch = stream.branch(&arm.name, value.clone());
            self.lower(arm.body, &mut branch, Some(destination.clone()), resolve_phi)?;
            stream.absorb_counters(&branch);

            let options = *branch.options();
            trace!(
                "case at line {}: arm {}: {} lowered to {} instructions",
                line,
                arm.name,
                arm.type_name,
                branch.len()
            );
            branches.push(optimise(branch.into_listing(), &[destination.clone()], &options));
        }

        stream.append(
            Instruction::case(destination.clone(), value, node, branches).at_line(line),
            resolve_phi,
        );
        Ok(destination)
    }

    /// Lower a binary operation. Comparisons are preceded by an ignore marker.
    #[allow(clippy::too_many_arguments)]
    fn lower_binary(
        &self,
        op: BinOp,
        left: ExprId,
        right: ExprId,
        line: usize,
        stream: &mut InstructionStream,
        destination: Symbol,
        resolve_phi: bool,
    ) -> Result<Symbol> {
        if op.is_comparison() {
            stream.append(Instruction::ignore(), resolve_phi);
        }

        let left_result = stream.request_fresh_symbol();
        let right_result = stream.request_fresh_symbol();
        let left = self.lower(left, stream, Some(left_result), resolve_phi)?;
        let right = self.lower(right, stream, Some(right_result), resolve_phi)?;

        stream.append(
            Instruction::binary(op, destination.clone(), left, right).at_line(line),
            resolve_phi,
        );
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    macro_rules! assert_generates {
        ($tree:expr, $root:expr, $il:expr) => {{
            init_logging();
            let classes = class_table(None);
            let mut stream = main_stream(&classes);
            lower(&$tree.ast, $root, &mut stream, None, false).unwrap();

            let instr_lines: Vec<_> = stream
                .listing()
                .iter_instructions()
                .map(ToString::to_string)
                .collect();

            assert_eq!(&$il[..], instr_lines)
        }};
    }

    fn lower_error(tree: &TreeBuilder, root: ExprId) -> LowerErrorKind {
        let classes = class_table(None);
        let mut stream = main_stream(&classes);
        let err = lower(&tree.ast, root, &mut stream, None, false).unwrap_err();
        err.kind().clone()
    }

    #[test]
    fn literal_loads_into_destination() {
        let mut tree = TreeBuilder::new();
        let root = tree.string("hi");

        assert_generates!(tree, root, ["%t0 = \"hi\""])
    }

    #[test]
    fn if_expression_merges_branch_results() {
        let mut tree = TreeBuilder::new();
        let one = tree.int(1);
        let two = tree.int(2);
        let less = tree.binary(BinOp::LessThan, one, two);
        let three = tree.int(3);
        let four = tree.int(4);
        let root = tree.if_(less, three, four);

        assert_generates!(
            tree,
            root,
            [
                "ignore",
                "%t2 = 1",
                "%t3 = 2",
                "%t1 = %t2 < %t3",
                "if %t1 goto L1",
                "# else branch",
                "L0:",
                "%t4 = 4",
                "goto L2",
                "# then branch",
                "L1:",
                "%t5 = 3",
                "# if-join",
                "L2:",
                "%t0 = ɸ(%t4, %t5)"
            ]
        )
    }

    #[test]
    fn arithmetic_has_no_ignore_marker() {
        let mut tree = TreeBuilder::new();
        let six = tree.int(6);
        let two = tree.int(2);
        let root = tree.binary(BinOp::Divide, six, two);

        assert_generates!(tree, root, ["%t1 = 6", "%t2 = 2", "%t0 = %t1 / %t2"])
    }

    #[test]
    fn unary_operand_is_evaluated_first() {
        let mut tree = TreeBuilder::new();
        let three = tree.int(3);
        let root = tree.add(ExprKind::Unary(UnOp::Negate, three));

        assert_generates!(tree, root, ["%t1 = 3", "%t0 = ~ %t1"])
    }

    #[test]
    fn unbound_variables_get_increasing_versions() {
        let mut tree = TreeBuilder::new();
        let one = tree.int(1);
        let first = tree.assign("y", one);
        let y = tree.id("y");
        let one = tree.int(1);
        let plus = tree.binary(BinOp::Add, y, one);
        let second = tree.assign("y", plus);
        let root = tree.block(vec![first, second]);

        assert_generates!(
            tree,
            root,
            [
                "y^1 = 1",
                "%t1 = y^1",
                "%t2 = y^1",
                "%t3 = 1",
                "y^2 = %t2 + %t3",
                "%t0 = y^2"
            ]
        )
    }

    #[test]
    fn let_bound_variable_is_rebound_on_every_write() {
        let mut tree = TreeBuilder::new();
        let zero = tree.int(0);
        let increment = |tree: &mut TreeBuilder| {
            let x = tree.id("x");
            let one = tree.int(1);
            let plus = tree.binary(BinOp::Add, x, one);
            tree.assign("x", plus)
        };
        let first = increment(&mut tree);
        let second = increment(&mut tree);
        let x = tree.id("x");
        let block = tree.block(vec![first, second, x]);
        let root = tree.let_(vec![LetBinding::new("x", "Int", Some(zero))], block);

        assert_generates!(
            tree,
            root,
            [
                "%t1 = 0",
                "%t3 = %t1",
                "%t4 = 1",
                "%t5 = %t3 + %t4",
                "%t2 = %t5",
                "%t7 = %t5",
                "%t8 = 1",
                "%t9 = %t7 + %t8",
                "%t6 = %t9",
                "%t0 = %t9"
            ]
        )
    }

    #[test]
    fn let_without_initialiser_loads_default_value() {
        let mut tree = TreeBuilder::new();
        let s = tree.id("s");
        let root = tree.let_(vec![LetBinding::new("s", "String", None)], s);

        assert_generates!(tree, root, ["%t1 = default String", "%t0 = %t1"])
    }

    #[test]
    fn let_binding_goes_out_of_scope_after_body() {
        let mut tree = TreeBuilder::new();
        let one = tree.int(1);
        let x = tree.id("x");
        let inner = tree.let_(vec![LetBinding::new("x", "Int", Some(one))], x);
        let x = tree.id("x");
        let root = tree.block(vec![inner, x]);

        assert_generates!(tree, root, ["%t2 = 1", "%t1 = %t2", "%t0 = x^0"])
    }

    #[test]
    fn variable_reassigned_in_one_branch_is_merged_after_the_conditional() {
        let mut tree = TreeBuilder::new();
        let zero = tree.int(0);
        let predicate = tree.boolean(true);
        let one = tree.int(1);
        let then_branch = tree.assign("x", one);
        let else_branch = tree.int(2);
        let cond = tree.if_(predicate, then_branch, else_branch);
        let x = tree.id("x");
        let block = tree.block(vec![cond, x]);
        let root = tree.let_(vec![LetBinding::new("x", "Int", Some(zero))], block);

        assert_generates!(
            tree,
            root,
            [
                "%t1 = 0",
                "%t3 = true",
                "if %t3 goto L1",
                "# else branch",
                "L0:",
                "%t4 = 2",
                "goto L2",
                "# then branch",
                "L1:",
                "%t6 = 1",
                "%t5 = %t6",
                "# if-join",
                "L2:",
                "%t2 = ɸ(%t4, %t5)",
                "%t7 = ɸ(%t1, %t6)",
                "%t0 = %t7"
            ]
        )
    }

    #[test]
    fn loop_variable_read_by_predicate_becomes_a_phi() {
        let mut tree = TreeBuilder::new();
        let zero = tree.int(0);
        let i = tree.id("i");
        let ten = tree.int(10);
        let predicate = tree.binary(BinOp::LessThan, i, ten);
        let i = tree.id("i");
        let one = tree.int(1);
        let plus = tree.binary(BinOp::Add, i, one);
        let body = tree.assign("i", plus);
        let root_loop = tree.while_(predicate, body);
        let root = tree.let_(vec![LetBinding::new("i", "Int", Some(zero))], root_loop);

        assert_generates!(
            tree,
            root,
            [
                "%t1 = 0",
                "# while-pred",
                "L0:",
                "ignore",
                "%t3 = ɸ(%t1, %t9)",
                "%t4 = 10",
                "%t2 = %t3 < %t4",
                "%t5 = not %t2",
                "if %t5 goto L1",
                "# while-body",
                "%t7 = %t1",
                "%t8 = 1",
                "%t9 = %t7 + %t8",
                "%t6 = %t9",
                "goto L0",
                "# while-join",
                "L1:",
                "%t0 = default Object"
            ]
        )
    }

    #[test]
    fn loop_variable_not_read_by_predicate_gets_a_phi_before_it() {
        let mut tree = TreeBuilder::new();
        let zero = tree.int(0);
        let predicate = tree.boolean(true);
        let one = tree.int(1);
        let body = tree.assign("i", one);
        let root_loop = tree.while_(predicate, body);
        let i = tree.id("i");
        let block = tree.block(vec![root_loop, i]);
        let root = tree.let_(vec![LetBinding::new("i", "Int", Some(zero))], block);

        assert_generates!(
            tree,
            root,
            [
                "%t1 = 0",
                "# while-pred",
                "L0:",
                "%t7 = ɸ(%t6, %t1)",
                "%t3 = true",
                "%t4 = not %t3",
                "if %t4 goto L1",
                "# while-body",
                "%t6 = 1",
                "%t5 = %t6",
                "goto L0",
                "# while-join",
                "L1:",
                "%t2 = default Object",
                "%t0 = %t7"
            ]
        )
    }

    #[test]
    fn empty_block_emits_nothing() {
        let mut tree = TreeBuilder::new();
        let root = tree.block(vec![]);

        assert_generates!(tree, root, [] as [&str; 0])
    }

    #[test]
    fn self_dispatch_passes_self_as_last_argument() {
        let mut tree = TreeBuilder::new();
        let five = tree.int(5);
        let root = tree.self_dispatch("out_int", vec![five]);

        assert_generates!(
            tree,
            root,
            ["ignore", "%t1 = 5", "%t0 = call method(5, 4) (%t1, self^0)"]
        )
    }

    #[test]
    fn dispatch_resolves_receiver_static_type() {
        let mut tree = TreeBuilder::new();
        let counter = tree.new_object("Counter");
        let root = tree.dispatch(counter, "inc", vec![]);

        assert_generates!(
            tree,
            root,
            [
                "ignore",
                "%t1 = new Counter",
                format!("%t0 = call method({}, 3) (%t1)", COUNTER).as_str()
            ]
        )
    }

    #[test]
    fn dispatch_on_self_type_uses_current_class() {
        let mut tree = TreeBuilder::new();
        let this = tree.typed(ExprKind::Identifier("self".to_string()), SELF_TYPE);
        let root = tree.dispatch(this, "main", vec![]);

        assert_generates!(
            tree,
            root,
            ["ignore", "%t1 = self^0", "%t0 = call method(5, 5) (%t1)"]
        )
    }

    #[test]
    fn static_dispatch_is_flagged_static() {
        let mut tree = TreeBuilder::new();
        let main = tree.new_object("Main");
        let one = tree.int(1);
        let root = tree.static_dispatch(main, "IO", "out_int", vec![one]);

        assert_generates!(
            tree,
            root,
            [
                "ignore",
                "%t1 = 1",
                "%t2 = new Main",
                "%t0 = call static(1, 4) (%t1, %t2)"
            ]
        )
    }

    #[test]
    fn internal_body_calls_intrinsic() {
        let mut tree = TreeBuilder::new();
        let root = tree.add(ExprKind::Internal("IO.out_string".to_string()));

        assert_generates!(tree, root, ["%t0 = call @IO.out_string ()"])
    }

    #[test]
    fn case_arms_are_lowered_into_branches() {
        init_logging();
        let mut tree = TreeBuilder::new();
        let scrutinee = tree.int(1);
        let n = tree.id("n");
        let two = tree.int(2);
        let root = tree.case(
            scrutinee,
            vec![CaseArm::new("n", "Int", n), CaseArm::new("o", "Object", two)],
        );
        let classes = class_table(None);
        let mut stream = main_stream(&classes);

        let result = lower(&tree.ast, root, &mut stream, None, false).unwrap();

        assert_eq!(Symbol::Fresh(0), result);
        assert_eq!(2, stream.len());
        let case = stream.get(crate::listing::Position(1)).unwrap();
        assert_eq!(
            format!("%t0 = case %t1 of {} (2 branches)", root),
            case.to_string()
        );
        let branches: Vec<Vec<String>> = case
            .branches
            .iter()
            .map(|branch| branch.iter_instructions().map(ToString::to_string).collect())
            .collect();
        assert_eq!(vec![vec!["%t0 = %t1"], vec!["%t0 = 2"]], branches);
    }

    #[test]
    fn symbols_stay_unique_across_case_arms() {
        init_logging();
        let mut tree = TreeBuilder::new();
        let scrutinee = tree.int(1);
        let a = tree.int(2);
        let b = tree.int(3);
        let first = tree.binary(BinOp::Add, a, b);
        let c = tree.int(4);
        let d = tree.int(5);
        let second = tree.binary(BinOp::Add, c, d);
        let root = tree.case(
            scrutinee,
            vec![CaseArm::new("a", "Int", first), CaseArm::new("b", "Bool", second)],
        );
        let classes = class_table(None);
        let mut stream = main_stream(&classes);

        lower(&tree.ast, root, &mut stream, None, false).unwrap();
        let after = stream.request_fresh_symbol();

        let case = stream.get(crate::listing::Position(1)).unwrap();
        let first: Vec<_> = case.branches[0].iter_instructions().map(ToString::to_string).collect();
        let second: Vec<_> = case.branches[1].iter_instructions().map(ToString::to_string).collect();
        assert_eq!(vec!["%t2 = 2", "%t3 = 3", "%t0 = %t2 + %t3"], first);
        assert_eq!(vec!["%t4 = 4", "%t5 = 5", "%t0 = %t4 + %t5"], second);
        assert_eq!(Symbol::Fresh(6), after);
    }

    #[test]
    fn case_into_variable_copies_the_result() {
        let mut tree = TreeBuilder::new();
        let scrutinee = tree.int(1);
        let arm = tree.int(2);
        let case = tree.case(scrutinee, vec![CaseArm::new("n", "Int", arm)]);
        let root = tree.assign("z", case);

        assert_generates!(
            tree,
            root,
            [
                "%t2 = 1",
                format!("%t1 = case %t2 of {} (1 branches)", case).as_str(),
                "z^1 = %t1",
                "%t0 = z^1"
            ]
        )
    }

    #[test]
    fn unknown_method_is_an_error() {
        let mut tree = TreeBuilder::new();
        let root = tree.self_dispatch("nope", vec![]);

        assert_eq!(
            LowerErrorKind::UnresolvedMethod {
                class: "Main".to_string(),
                method: "nope".to_string()
            },
            lower_error(&tree, root)
        );
    }

    #[test]
    fn unknown_receiver_class_is_an_error() {
        let mut tree = TreeBuilder::new();
        let receiver = tree.typed(ExprKind::Identifier("thing".to_string()), "Nope");
        let root = tree.dispatch(receiver, "abort", vec![]);

        assert_eq!(
            LowerErrorKind::UnresolvedClass("Nope".to_string()),
            lower_error(&tree, root)
        );
    }

    #[test]
    fn no_expr_cannot_be_lowered() {
        let mut tree = TreeBuilder::new();
        let root = tree.add(ExprKind::NoExpr);

        assert_eq!(
            LowerErrorKind::UnhandledNode("no_expr"),
            lower_error(&tree, root)
        );
    }

    #[test]
    fn node_from_another_tree_is_an_error() {
        let mut other = TreeBuilder::new();
        other.int(1);
        let foreign = other.int(2);
        let tree = TreeBuilder::new();

        assert_eq!(
            LowerErrorKind::DanglingNode(foreign),
            lower_error(&tree, foreign)
        );
    }
}
