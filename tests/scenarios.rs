//! End-to-end scenarios run through the public `Runner` API, each built as a
//! hand-authored semantic AST (there is no parser in this crate — source
//! text is the Transformer's job, out of scope here).

use std::rc::Rc;

use slip::ast::{FilterPredicate, PathAst, PathKind, Segment, Term};
use slip::{CodeData, Object, Runner};

fn path(kind: PathKind, segments: Vec<Segment>) -> Term {
    Term::Path(Rc::new(PathAst::new(kind, segments)))
}

fn name_segments(names: &[&str]) -> Vec<Segment> {
    names.iter().map(|n| Segment::Name((*n).to_owned())).collect()
}

fn get(names: &[&str]) -> Term {
    path(PathKind::Get, name_segments(names))
}

fn set(names: &[&str]) -> Term {
    path(PathKind::Set, name_segments(names))
}

fn piped(name: &str) -> Term {
    path(PathKind::Piped, vec![Segment::Name(name.to_owned())])
}

fn del(names: &[&str]) -> Term {
    path(PathKind::Del, name_segments(names))
}

fn run(exprs: Vec<Vec<Term>>) -> slip::Outcome {
    Runner::new(CodeData::new(exprs)).run()
}

#[test]
fn arithmetic_is_left_to_right_with_no_precedence() {
    // 10 + 5 * 2
    let expr = vec![Term::Int(10), get(&["+"]), Term::Int(5), get(&["*"]), Term::Int(2)];
    let outcome = run(vec![expr]);
    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(outcome.value, Object::Int(30));
}

#[test]
fn prototype_lookup_falls_through_inherited_scope() {
    // Character: scope #{ hp: 100 }
    // Player: scope #{} |inherit Character
    // Player.hp
    let character = vec![set(&["Character"]), get(&["scope"]), Term::DictTag(vec![vec![set(&["hp"]), Term::Int(100)]])];

    // The positional call `scope #{}` must be isolated in its own Group when
    // more pipe-chain terms follow it in the same expr, or the callable-head
    // rule would swallow `|inherit Character` as bare positional arguments.
    let player = vec![
        set(&["Player"]),
        Term::Group(vec![vec![get(&["scope"]), Term::DictTag(vec![])]]),
        piped("inherit"),
        get(&["Character"]),
    ];

    let read_hp = vec![get(&["Player", "hp"])];

    let outcome = run(vec![character, player, read_hp]);
    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(outcome.value, Object::Int(100));
}

#[test]
fn vectorized_update_adds_ten_to_every_matching_player() {
    // players: #[ #{name:"A", hp:75}, #{name:"B", hp:45}, #{name:"C", hp:30} ]
    // players.hp[< 50]: + 10
    // #[ players[0].hp, players[1].hp, players[2].hp ]
    fn player(name: &str, hp: i64) -> Vec<Term> {
        vec![Term::DictTag(vec![
            vec![set(&["name"]), Term::Str(Rc::from(name))],
            vec![set(&["hp"]), Term::Int(hp)],
        ])]
    }

    let players = vec![
        set(&["players"]),
        Term::ListLit(vec![player("A", 75), player("B", 45), player("C", 30)]),
    ];

    let filter_query = Segment::FilterQuery(FilterPredicate::Expr(vec![get(&["hp"]), get(&["<"]), Term::Int(50)]));
    let update_path = path(PathKind::Set, vec![Segment::Name("players".to_owned()), filter_query, Segment::Name("hp".to_owned())]);
    let update = vec![update_path, piped("+"), Term::Int(10)];

    fn hp_at(index: i64) -> Vec<Term> {
        vec![path(
            PathKind::Get,
            vec![Segment::Name("players".to_owned()), Segment::Index(vec![Term::Int(index)]), Segment::Name("hp".to_owned())],
        )]
    }
    let read_back = vec![Term::ListLit(vec![hp_at(0), hp_at(1), hp_at(2)])];

    let outcome = run(vec![players, update, read_back]);
    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(outcome.value, Object::List(vec![Object::Int(75), Object::Int(55), Object::Int(40)]));
}

#[test]
fn example_driven_dispatch_picks_the_method_matching_argument_types() {
    // add: fn {a, b} [ a + b ]
    //   |example { a: 2,   b: 3   -> 5 }
    //   |example { a: 2.5, b: 3.5 -> 6.0 }
    // #[ add 2 3, add 2.5 3.5 ]
    let params = Term::CodeLit(CodeData::new(vec![vec![get(&["a"])], vec![get(&["b"])]]));
    let body = Term::CodeLit(CodeData::new(vec![vec![get(&["a"]), get(&["+"]), get(&["b"])]]));
    let example_int = Term::CodeLit(CodeData::new(vec![
        vec![set(&["a"]), Term::Int(2)],
        vec![set(&["b"]), Term::Int(3)],
        vec![Term::Int(5)],
    ]));
    let example_float = Term::CodeLit(CodeData::new(vec![
        vec![set(&["a"]), Term::Float(2.5)],
        vec![set(&["b"]), Term::Float(3.5)],
        vec![Term::Float(6.0)],
    ]));

    let define_add = vec![set(&["add"]), get(&["fn"]), params, body, piped("example"), example_int, piped("example"), example_float];

    let call_add_ints = vec![get(&["add"]), Term::Int(2), Term::Int(3)];
    let call_add_floats = vec![get(&["add"]), Term::Float(2.5), Term::Float(3.5)];
    let calls = vec![Term::ListLit(vec![call_add_ints, call_add_floats])];

    let outcome = run(vec![define_add, calls]);
    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(outcome.value, Object::List(vec![Object::Int(5), Object::Float(6.0)]));
}

#[test]
fn delete_cascades_prune_and_a_later_reference_fails() {
    // A: scope #{ B: scope #{ C: scope #{ x: 1 } } }
    // ~A.B.C.x
    // (do [ A ]).outcome.status
    let scope_c = vec![set(&["C"]), get(&["scope"]), Term::DictTag(vec![vec![set(&["x"]), Term::Int(1)]])];
    let scope_b = vec![set(&["B"]), get(&["scope"]), Term::DictTag(vec![scope_c])];
    let define_a = vec![set(&["A"]), get(&["scope"]), Term::DictTag(vec![scope_b])];

    let delete_x = vec![del(&["A", "B", "C", "x"])];

    let do_body = CodeData::new(vec![vec![get(&["A"])]]);
    let do_call = vec![get(&["do"]), Term::CodeLit(do_body)];

    let outcome = run(vec![define_a, delete_x, do_call]);
    assert!(outcome.ok, "{:?}", outcome.error);
    let Object::Dict(top) = &outcome.value else {
        panic!("expected a dict result, got {:?}", outcome.value);
    };
    let Some(Object::Dict(inner)) = top.get("outcome") else {
        panic!("expected an `outcome` dict, got {top:?}");
    };
    assert_eq!(inner.get("status"), Some(&Object::Str("err".to_owned())));
}

#[test]
fn task_is_driven_by_receive_and_channel_preserves_send_order() {
    // ch: make-channel
    // task [ foreach n #[1,2,3,4,5] [ send ch n ] ]
    // #[ receive ch, receive ch, receive ch, receive ch, receive ch ]
    let make_ch = vec![set(&["ch"]), get(&["make-channel"])];

    let send_n = vec![get(&["send"]), get(&["ch"]), get(&["n"])];
    let loop_body = Term::CodeLit(CodeData::new(vec![send_n]));
    let numbers = Term::ListLit((1..=5).map(|i| vec![Term::Int(i)]).collect());
    let foreach_expr = vec![get(&["foreach"]), get(&["n"]), numbers, loop_body];
    let task_body = Term::CodeLit(CodeData::new(vec![foreach_expr]));
    let spawn_task = vec![get(&["task"]), task_body];

    let receives = (0..5).map(|_| vec![get(&["receive"]), get(&["ch"])]).collect();
    let read_back = vec![Term::ListLit(receives)];

    let outcome = run(vec![make_ch, spawn_task, read_back]);
    assert!(outcome.ok, "{:?}", outcome.error);
    assert_eq!(
        outcome.value,
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3), Object::Int(4), Object::Int(5)])
    );
}
