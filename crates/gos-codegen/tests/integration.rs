//! Integration tests: AST → codegen → VM

use gos_ast::Node;
use gos_codegen::{compile_program, CodegenError};
use gos_vm::{HeapError, Opcode, Program, TraceEvent, Value, Vm, VmConfig, VmError};
use pretty_assertions::assert_eq;

/// Helper: compile an AST to a Program
fn compile(ast: &Node) -> Program {
    compile_program(ast).expect("codegen failed")
}

fn run(ast: &Node) -> Result<Value, VmError> {
    let mut vm = Vm::new(compile(ast)).expect("vm init failed");
    vm.run_to_value()
}

/// Helper: run with tracing on, returning the result and the interleaving
fn run_traced(ast: &Node) -> (Result<Value, VmError>, Vec<TraceEvent>) {
    let config = VmConfig {
        trace: true,
        ..VmConfig::default()
    };
    let mut vm = Vm::with_config(compile(ast), config).expect("vm init failed");
    let result = vm.run_to_value();
    (result, vm.trace().to_vec())
}

fn call(name: &str, args: Vec<Node>) -> Node {
    Node::apply(Node::name(name), args)
}

fn num(n: f64) -> Value {
    Value::Number(n)
}

fn first(trace: &[TraceEvent], op: Opcode) -> usize {
    trace
        .iter()
        .position(|e| e.op == op)
        .expect("opcode never executed")
}

// =============================================================================
// Expressions and scopes
// =============================================================================

#[test]
fn test_add_literals() {
    let ast = Node::binop("+", Node::lit(10), Node::lit(5));
    assert_eq!(run(&ast), Ok(num(15.0)));
}

#[test]
fn test_const_reassigned_in_branch() {
    // const x = 1; if (1 > 0) { x = 2 } else { x = 3 }; x
    let ast = Node::block(Node::seq(vec![
        Node::constant("x", Node::lit(1)),
        Node::cond(
            Node::binop(">", Node::lit(1), Node::lit(0)),
            Node::block(Node::assign("x", Node::lit(2))),
            Some(Node::block(Node::assign("x", Node::lit(3)))),
        ),
        Node::name("x"),
    ]));
    assert_eq!(run(&ast), Ok(num(2.0)));
}

#[test]
fn test_zero_arg_call() {
    let ast = Node::block(Node::seq(vec![
        Node::function("f", &[], Node::block(Node::ret(Node::lit(1)))),
        call("f", vec![]),
    ]));
    assert_eq!(run(&ast), Ok(num(1.0)));
}

#[test]
fn test_json_program() {
    let json = serde_json::json!({
        "tag": "blk",
        "body": {"tag": "seq", "stmts": [
            {"tag": "const", "sym": "x", "expr": {"tag": "lit", "val": 4}},
            {"tag": "binop", "sym": "*",
             "frst": {"tag": "nam", "sym": "x"},
             "scnd": {"tag": "unop", "sym": "-unary", "frst": {"tag": "lit", "val": 2}}}
        ]}
    });
    let ast = Node::from_json(&json.to_string()).unwrap();
    assert_eq!(run(&ast), Ok(num(-8.0)));
}

#[test]
fn test_string_concat_and_equality() {
    let ast = Node::binop(
        "===",
        Node::binop("+", Node::lit("go"), Node::lit("lang")),
        Node::lit("golang"),
    );
    assert_eq!(run(&ast), Ok(Value::Bool(true)));
}

#[test]
fn test_colliding_strings_are_not_aliased() {
    // "Ba" and "C@" share a djb2 hash
    let ast = Node::binop("===", Node::lit("Ba"), Node::lit("C@"));
    assert_eq!(run(&ast), Ok(Value::Bool(false)));

    let ast = Node::seq(vec![
        Node::lit("Ba"),
        Node::binop("+", Node::lit("C"), Node::lit("@")),
    ]);
    assert_eq!(run(&ast), Ok(Value::Str("C@".into())));
}

#[test]
fn test_logical_ops_yield_operands() {
    let ast = Node::binop("||", Node::lit(0), Node::lit("fallback"));
    assert_eq!(run(&ast), Ok(Value::Str("fallback".into())));
    let ast = Node::binop("&&", Node::lit(1), Node::lit(2));
    assert_eq!(run(&ast), Ok(num(2.0)));
    let ast = Node::binop("&&", Node::null(), Node::lit(2));
    assert_eq!(run(&ast), Ok(Value::Null));
}

#[test]
fn test_while_sum() {
    // var i = 0; var s = 0; while (i < 10) { i = i + 1; s = s + i; } s
    let ast = Node::block(Node::seq(vec![
        Node::var("i", Node::lit(0)),
        Node::var("s", Node::lit(0)),
        Node::while_loop(
            Node::binop("<", Node::name("i"), Node::lit(10)),
            Node::block(Node::seq(vec![
                Node::assign("i", Node::binop("+", Node::name("i"), Node::lit(1))),
                Node::assign("s", Node::binop("+", Node::name("s"), Node::name("i"))),
            ])),
        ),
        Node::name("s"),
    ]));
    assert_eq!(run(&ast), Ok(num(55.0)));
}

#[test]
fn test_use_before_init() {
    let ast = Node::block(Node::seq(vec![
        Node::constant("y", Node::name("x")),
        Node::constant("x", Node::lit(1)),
        Node::name("y"),
    ]));
    assert_eq!(run(&ast), Err(VmError::UseBeforeInit { frame: 1, slot: 1 }));
}

// =============================================================================
// Functions and closures
// =============================================================================

#[test]
fn test_recursion() {
    // fun fact(n) { return n <= 1 ? 1 : n * fact(n - 1); } fact(5)
    let body = Node::block(Node::ret(Node::cond(
        Node::binop("<=", Node::name("n"), Node::lit(1)),
        Node::lit(1),
        Some(Node::binop(
            "*",
            Node::name("n"),
            call("fact", vec![Node::binop("-", Node::name("n"), Node::lit(1))]),
        )),
    )));
    let ast = Node::block(Node::seq(vec![
        Node::function("fact", &["n"], body),
        call("fact", vec![Node::lit(5)]),
    ]));
    assert_eq!(run(&ast), Ok(num(120.0)));
}

#[test]
fn test_closure_capture_isolation() {
    // each call of make_adder gets its own frame for x
    let ast = Node::block(Node::seq(vec![
        Node::function(
            "make_adder",
            &["x"],
            Node::block(Node::ret(Node::lambda(
                &["y"],
                Node::block(Node::ret(Node::binop("+", Node::name("x"), Node::name("y")))),
            ))),
        ),
        Node::constant("add1", call("make_adder", vec![Node::lit(1)])),
        Node::constant("add10", call("make_adder", vec![Node::lit(10)])),
        Node::binop(
            "+",
            call("add1", vec![Node::lit(5)]),
            call("add10", vec![Node::lit(5)]),
        ),
    ]));
    assert_eq!(run(&ast), Ok(num(21.0)));
}

#[test]
fn test_closure_shares_mutable_frame() {
    let counter = Node::block(Node::seq(vec![
        Node::var("c", Node::lit(0)),
        Node::ret(Node::lambda(
            &[],
            Node::block(Node::seq(vec![
                Node::assign("c", Node::binop("+", Node::name("c"), Node::lit(1))),
                Node::ret(Node::name("c")),
            ])),
        )),
    ]));
    let ast = Node::block(Node::seq(vec![
        Node::function("counter", &[], counter),
        Node::constant("k", call("counter", vec![])),
        call("k", vec![]),
        call("k", vec![]),
        call("k", vec![]),
    ]));
    assert_eq!(run(&ast), Ok(num(3.0)));
}

#[test]
fn test_return_unwinds_nested_blocks() {
    let body = Node::block(Node::while_loop(
        Node::lit(true),
        Node::block(Node::cond(
            Node::lit(true),
            Node::block(Node::ret(Node::lit(42))),
            None,
        )),
    ));
    let ast = Node::block(Node::seq(vec![
        Node::function("f", &[], body),
        Node::binop("+", call("f", vec![]), Node::lit(0)),
    ]));
    assert_eq!(run(&ast), Ok(num(42.0)));
}

#[test]
fn test_arity_mismatch() {
    let ast = Node::block(Node::seq(vec![
        Node::function("f", &["a"], Node::block(Node::ret(Node::name("a")))),
        call("f", vec![Node::lit(1), Node::lit(2)]),
    ]));
    assert_eq!(run(&ast), Err(VmError::ArityMismatch { expected: 1, got: 2 }));
}

#[test]
fn test_unbound_symbol_is_compile_error() {
    let ast = Node::block(Node::seq(vec![Node::name("ghost")]));
    assert_eq!(
        compile_program(&ast).err(),
        Some(CodegenError::UnboundSymbol("ghost".into()))
    );
}

// =============================================================================
// Builtins
// =============================================================================

#[test]
fn test_pairs() {
    let ast = Node::block(Node::seq(vec![
        Node::constant(
            "l",
            call("pair", vec![Node::lit(1), call("pair", vec![Node::lit(2), Node::null()])]),
        ),
        call("set_head", vec![Node::name("l"), Node::lit(0)]),
        Node::name("l"),
    ]));
    assert_eq!(run(&ast), Ok(Value::list(vec![num(0.0), num(2.0)])));

    let ast = call(
        "head",
        vec![call("tail", vec![call("pair", vec![Node::lit(1), call("pair", vec![Node::lit(2), Node::null()])])])],
    );
    assert_eq!(run(&ast), Ok(num(2.0)));
}

#[test]
fn test_long_list() {
    // var l = null; var i = 0; while (i < n) { l = pair(i, l); i = i + 1; } display(l); l
    const N: usize = 20_000;
    let ast = Node::block(Node::seq(vec![
        Node::var("l", Node::null()),
        Node::var("i", Node::lit(0)),
        Node::while_loop(
            Node::binop("<", Node::name("i"), Node::lit(N as f64)),
            Node::seq(vec![
                Node::assign("l", call("pair", vec![Node::name("i"), Node::name("l")])),
                Node::assign("i", Node::binop("+", Node::name("i"), Node::lit(1))),
            ]),
        ),
        call("display", vec![Node::name("l")]),
        Node::name("l"),
    ]));
    let config = VmConfig {
        heap_bytes: 32 << 20,
        ..VmConfig::default()
    };
    let mut vm = Vm::with_config(compile(&ast), config).unwrap();
    let expected = Value::list((0..N).rev().map(|i| num(i as f64)));
    assert_eq!(vm.run_to_value(), Ok(expected));

    let output = vm.take_output();
    assert_eq!(output.len(), 1);
    assert!(output[0].starts_with("[19999, [19998, "));
    assert!(output[0].ends_with(&format!("[0, null{}", "]".repeat(N))));
}

#[test]
fn test_cyclic_pair() {
    // const p = pair(1, null); set_tail(p, p); display(p); "x" + p
    let ast = Node::block(Node::seq(vec![
        Node::constant("p", call("pair", vec![Node::lit(1), Node::null()])),
        call("set_tail", vec![Node::name("p"), Node::name("p")]),
        call("display", vec![Node::name("p")]),
        Node::binop("+", Node::lit("x"), Node::name("p")),
    ]));
    let mut vm = Vm::new(compile(&ast)).unwrap();
    assert_eq!(vm.run_to_value(), Ok(Value::Str("x[1, <cycle>]".into())));
    assert_eq!(vm.take_output(), vec!["[1, <cycle>]".to_string()]);

    // the cycle itself has no finite result value
    let ast = Node::block(Node::seq(vec![
        Node::constant("p", call("pair", vec![Node::lit(1), Node::null()])),
        call("set_tail", vec![Node::name("p"), Node::name("p")]),
        Node::name("p"),
    ]));
    assert!(matches!(
        run(&ast),
        Err(VmError::Heap(HeapError::Cyclic(_)))
    ));
}

#[test]
fn test_display_output() {
    let ast = Node::seq(vec![
        call("display", vec![Node::lit(1)]),
        call("display", vec![Node::lit("hi")]),
        call("is_function", vec![Node::name("display")]),
    ]);
    let mut vm = Vm::new(compile(&ast)).unwrap();
    assert_eq!(vm.run_to_value(), Ok(Value::Bool(true)));
    assert_eq!(vm.take_output(), vec!["1".to_string(), "\"hi\"".to_string()]);
}

#[test]
fn test_error_builtin() {
    let ast = call("error", vec![Node::lit("bad input")]);
    let err = run(&ast).unwrap_err();
    assert_eq!(err, VmError::User("bad input".into()));
    assert!(!err.is_fault());
}

#[test]
fn test_go_with_builtin_runs_immediately() {
    let ast = Node::seq(vec![
        Node::go(call("display", vec![Node::lit(7)])),
        Node::lit(1),
    ]);
    let mut vm = Vm::new(compile(&ast)).unwrap();
    assert_eq!(vm.run_to_value(), Ok(num(1.0)));
    assert_eq!(vm.take_output(), vec!["7".to_string()]);
}

// =============================================================================
// Goroutines and channels
// =============================================================================

#[test]
fn test_rendezvous_sender_first() {
    // const ch = chan; var x = 0; go (() => ch <- 5)(); x = <-ch; x
    let ast = Node::block(Node::seq(vec![
        Node::constant("ch", Node::make_chan()),
        Node::var("x", Node::lit(0)),
        Node::go(Node::apply(
            Node::lambda(&[], Node::send(Node::name("ch"), Node::lit(5))),
            vec![],
        )),
        Node::assign("x", Node::recv(Node::name("ch"))),
        Node::name("x"),
    ]));
    let (result, trace) = run_traced(&ast);
    assert_eq!(result, Ok(num(5.0)));
    assert!(first(&trace, Opcode::Send) < first(&trace, Opcode::Recv));
}

#[test]
fn test_rendezvous_receiver_first() {
    // the goroutine receives into x, then signals on done
    let worker = Node::lambda(
        &[],
        Node::seq(vec![
            Node::assign("x", Node::recv(Node::name("ch"))),
            Node::send(Node::name("done"), Node::lit(true)),
        ]),
    );
    let ast = Node::block(Node::seq(vec![
        Node::constant("ch", Node::make_chan()),
        Node::constant("done", Node::make_chan()),
        Node::var("x", Node::lit(0)),
        Node::go(Node::apply(worker, vec![])),
        Node::send(Node::name("ch"), Node::lit(5)),
        Node::recv(Node::name("done")),
        Node::name("x"),
    ]));
    let (result, trace) = run_traced(&ast);
    assert_eq!(result, Ok(num(5.0)));
    assert!(first(&trace, Opcode::Recv) < first(&trace, Opcode::Send));
}

#[test]
fn test_channel_reuse_in_order() {
    let producer = Node::lambda(
        &[],
        Node::seq(vec![
            Node::send(Node::name("ch"), Node::lit(1)),
            Node::send(Node::name("ch"), Node::lit(2)),
            Node::send(Node::name("ch"), Node::lit(3)),
        ]),
    );
    let ast = Node::block(Node::seq(vec![
        Node::constant("ch", Node::make_chan()),
        Node::go(Node::apply(producer, vec![])),
        Node::constant("a", Node::recv(Node::name("ch"))),
        Node::constant("b", Node::recv(Node::name("ch"))),
        Node::constant("c", Node::recv(Node::name("ch"))),
        Node::binop(
            "+",
            Node::binop(
                "+",
                Node::binop("*", Node::name("a"), Node::lit(100)),
                Node::binop("*", Node::name("b"), Node::lit(10)),
            ),
            Node::name("c"),
        ),
    ]));
    assert_eq!(run(&ast), Ok(num(123.0)));
}

fn multi_sender_program() -> Node {
    Node::block(Node::seq(vec![
        Node::constant("ch", Node::make_chan()),
        Node::function("sender", &["v"], Node::send(Node::name("ch"), Node::name("v"))),
        Node::go(call("sender", vec![Node::lit(1)])),
        Node::go(call("sender", vec![Node::lit(2)])),
        Node::go(call("sender", vec![Node::lit(3)])),
        Node::binop(
            "+",
            Node::binop("+", Node::recv(Node::name("ch")), Node::recv(Node::name("ch"))),
            Node::recv(Node::name("ch")),
        ),
    ]))
}

#[test]
fn test_multiple_senders_one_channel() {
    assert_eq!(run(&multi_sender_program()), Ok(num(6.0)));
}

#[test]
fn test_deterministic_trace() {
    let ast = multi_sender_program();
    let (first_result, first_trace) = run_traced(&ast);
    let (second_result, second_trace) = run_traced(&ast);
    assert_eq!(first_result, second_result);
    assert_eq!(first_trace, second_trace);
    assert!(first_trace.iter().any(|e| e.fiber == 3));
}

#[test]
fn test_round_robin_order() {
    // two spinning goroutines plus main counting to 5
    let ast = Node::block(Node::seq(vec![
        Node::function(
            "spin",
            &[],
            Node::while_loop(Node::lit(true), Node::seq(vec![])),
        ),
        Node::go(call("spin", vec![])),
        Node::go(call("spin", vec![])),
        Node::var("i", Node::lit(0)),
        Node::while_loop(
            Node::binop("<", Node::name("i"), Node::lit(5)),
            Node::assign("i", Node::binop("+", Node::name("i"), Node::lit(1))),
        ),
        Node::name("i"),
    ]));
    let (result, trace) = run_traced(&ast);
    assert_eq!(result, Ok(num(5.0)));

    let spawns: Vec<usize> = trace
        .iter()
        .enumerate()
        .filter(|(_, e)| e.op == Opcode::GoCall)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(spawns.len(), 2);
    let after = &trace[spawns[1] + 1..];
    assert!(after.len() > 30);
    for (k, event) in after.iter().enumerate() {
        assert_eq!(event.fiber, [1, 2, 0][k % 3], "event {} of {:?}", k, after);
    }
    assert_eq!(trace.last().map(|e| (e.fiber, e.op)), Some((0, Opcode::Done)));
}

#[test]
fn test_deadlock_detected() {
    let ast = Node::block(Node::seq(vec![
        Node::constant("ch", Node::make_chan()),
        Node::recv(Node::name("ch")),
    ]));
    assert_eq!(run(&ast), Err(VmError::Deadlock { parked: 1 }));
}

#[test]
fn test_step_limit() {
    let ast = Node::while_loop(Node::lit(true), Node::seq(vec![]));
    let config = VmConfig {
        max_steps: Some(1_000),
        ..VmConfig::default()
    };
    let mut vm = Vm::with_config(compile(&ast), config).unwrap();
    assert_eq!(vm.run(), Err(VmError::StepLimitExceeded(1_000)));
}
