use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;
use qgraphic::{CollectPublish, ExcKind, Exception, Frame, Runner};

/// Runs a program and returns everything it published.
fn run_collect(source: &str) -> CollectPublish {
    let runner = Runner::new(source.to_owned(), "test.qgk").expect("parse error");
    let mut out = CollectPublish::new();
    runner.run(&mut out).expect("runtime error");
    out
}

/// Runs a program expected to fail and returns the exception.
fn run_err(source: &str) -> Exception {
    let mut out = CollectPublish::new();
    match Runner::new(source.to_owned(), "test.qgk") {
        Ok(runner) => runner.run(&mut out).expect_err("expected a failure"),
        Err(exc) => exc,
    }
}

/// Evaluates an integer expression by writing it into a published pixel.
fn eval_int(expr: &str) -> i64 {
    let source = format!("Frame f = Frame().\nint v = {expr}.\nf -> (0 0) = (v v v).\nPublish f.\n");
    run_collect(&source).published()[0].get_pixel(0, 0).unwrap().0
}

/// Evaluates a boolean condition by branching on it.
fn eval_bool(cond: &str) -> bool {
    let source = format!(
        "Frame f = Frame().\n({cond}) ?\n    f -> (0 0) = (1 1 1).\n!?\n    f -> (0 0) = (2 2 2).\n!\nPublish f.\n"
    );
    let out = run_collect(&source);
    match out.published()[0].get_pixel(0, 0).unwrap() {
        (1, 1, 1) => true,
        (2, 2, 2) => false,
        other => panic!("unexpected marker pixel {other:?}"),
    }
}

fn scratch_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("qgraphic-run-{name}-{}-{nanos}", std::process::id()))
}

// ---- end-to-end scenarios ----

#[test]
fn pixel_write_publishes_a_single_red_pixel() {
    let out = run_collect("Frame f = Frame().\nf -> (0 0) = (31 0 0).\nPublish f.\n");
    assert_eq!(out.published().len(), 1);
    let frame = &out.published()[0];
    assert_eq!(frame.get_pixel(0, 0), Ok((31, 0, 0)));
    for (y, row) in frame.pixels().iter().enumerate() {
        for (x, &pixel) in row.iter().enumerate() {
            if (x, y) != (0, 0) {
                assert_eq!(pixel, (0, 0, 0), "pixel ({x},{y})");
            }
        }
    }
}

#[test]
fn function_call_with_forward_reference() {
    let source = "Do paint{} .\npaint{} => None:\n    Frame f = Frame().\n    f -> (5 5) = (0 63 0).\n    Publish f.\n!\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(5, 5), Ok((0, 63, 0)));
}

#[test]
fn if_else_takes_the_then_branch() {
    let source = "int x = 3.\n(x > 0) ?\n    Publish Frame().\n!?\n    return.\n!\n";
    let out = run_collect(source);
    // The else branch holds a top-level return, which would fail the run;
    // success means it was not taken.
    assert_eq!(out.published().len(), 1);
    assert_eq!(*out.published().first().unwrap(), Frame::new());
}

#[test]
fn for_loop_paints_the_diagonal() {
    let source = "Frame f = Frame().\nFor int i in [0 1 2 3] :\n    f -> (i i) = (31 63 31).\n!\nPublish f.\n";
    let out = run_collect(source);
    let frame = &out.published()[0];
    for i in 0..4 {
        assert_eq!(frame.get_pixel(i, i), Ok((31, 63, 31)));
    }
    assert_eq!(frame.get_pixel(4, 4), Ok((0, 0, 0)));
    assert_eq!(frame.get_pixel(0, 1), Ok((0, 0, 0)));
}

#[test]
fn flood_fill_respects_a_rect_outline() {
    let source = "Frame f = Frame().\n\
        makeLine{f (0 0) (10 0) (31 0 0)}.\n\
        makeLine{f (0 10) (10 10) (31 0 0)}.\n\
        makeLine{f (0 0) (0 10) (31 0 0)}.\n\
        makeLine{f (10 0) (10 10) (31 0 0)}.\n\
        Fill{f 1 1 (0 0 31)}.\n\
        Publish f.\n";
    let frame = run_collect(source).published()[0].clone();
    for y in 1..10 {
        for x in 1..10 {
            assert_eq!(frame.get_pixel(x, y), Ok((0, 0, 31)), "inside ({x},{y})");
        }
    }
    assert_eq!(frame.get_pixel(0, 0), Ok((31, 0, 0)));
    assert_eq!(frame.get_pixel(5, 0), Ok((31, 0, 0)));
    assert_eq!(frame.get_pixel(20, 20), Ok((0, 0, 0)));
}

// ---- declarations and defaults ----

#[test]
fn declared_defaults_are_zero_values() {
    let source = "int i.\nstring s.\nbool b.\nlist l.\ncolor c.\npixel p.\nNone n.\nFrame f = Frame().\n\
        ((i == 0) and (s == \"\") and (b == false) and (c == (0 0 0)) and (p == (0 0)) and (l == []) and (n == none)) ?\n\
        f -> (0 0) = (1 1 1).\n!\nPublish f.\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(0, 0), Ok((1, 1, 1)));
}

#[test]
fn frame_default_is_a_fresh_zeroed_frame() {
    let out = run_collect("Frame f.\nPublish f.\n");
    assert_eq!(out.published()[0], Frame::new());
}

// ---- operators ----

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(eval_int("2 + 3 * 4"), 14);
    assert_eq!(eval_int("10 - 2 - 3"), 5);
    assert_eq!(eval_int("(2 + 3) * 4"), 20);
    assert_eq!(eval_int("- 5 + 10"), 5);
}

#[test]
fn bitwise_ops_mask_to_32_bits() {
    assert_eq!(eval_int("1 | 6"), 7);
    assert_eq!(eval_int("12 & 10"), 8);
    assert_eq!(eval_int("~0 & 255"), 255);
    // `&` binds tighter than `|`, and `+` tighter than `&`.
    assert_eq!(eval_int("1 | 2 & 3"), 3);
    assert_eq!(eval_int("1 & 2 + 3"), 1);
}

#[test]
fn comparisons_and_equality() {
    assert!(eval_bool("1 < 2"));
    assert!(eval_bool("2 <= 2"));
    assert!(!eval_bool("1 > 2"));
    assert!(eval_bool("(1 2) < (1 3)"));
    assert!(eval_bool("(1 2 3) == (1 2 3)"));
    assert!(!eval_bool("(1 2) == (1 2 0)"));
    assert!(eval_bool("\"ab\" < \"b\""));
    assert!(eval_bool("[1 2 3] == [1 2 3]"));
    assert!(!eval_bool("1 == \"1\""));
}

#[test]
fn string_and_list_concatenation() {
    assert!(eval_bool("\"ab\" + \"cd\" == \"abcd\""));
    assert!(eval_bool("[1] + [2 3] == [1 2 3]"));
}

#[test]
fn boolean_logic_and_truthiness() {
    assert!(eval_bool("true and true"));
    assert!(!eval_bool("true and false"));
    assert!(eval_bool("false or true"));
    assert!(eval_bool("true xor false"));
    assert!(!eval_bool("true xor true"));
    assert!(eval_bool("not false"));
    assert!(eval_bool("not 0"));
    assert!(eval_bool("not \"\""));
    assert!(eval_bool("not []"));
    assert!(eval_bool("1 and \"x\""));
    assert!(!eval_bool("none or false"));
}

#[test]
fn and_or_short_circuit_without_evaluating_the_right_operand() {
    // `boom` is undefined; evaluating it would fail the run.
    assert!(!eval_bool("false and boom{}"));
    assert!(eval_bool("true or boom{}"));
    let err = run_err("int x = (true and boom{}).");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
}

#[test]
fn comparing_unrelated_types_is_a_runtime_error() {
    let err = run_err("int x = (1 < \"a\").");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert_eq!(err.line(), Some(1));
}

// ---- indexing and lists ----

#[test]
fn indexing_lists_tuples_and_strings() {
    assert_eq!(eval_int("[5 6 7]<1>"), 6);
    assert_eq!(eval_int("[5 6 7]<-1>"), 7);
    assert_eq!(eval_int("(4 5 6)<0>"), 4);
    assert!(eval_bool("\"abc\"<1> == \"b\""));
    assert!(eval_bool("\"abc\"<-1> == \"c\""));
}

#[test]
fn index_out_of_range_is_a_runtime_error() {
    let err = run_err("int x = [1 2]<5>.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("out of range"));
}

#[test]
fn list_element_assignment_and_aliasing() {
    let source = "list a = [1 2 3].\nlist b = a.\nb<1> = 9.\na<-1> = 8.\nFrame f = Frame().\n\
        (a == [1 9 8]) ?\n    f -> (0 0) = (1 1 1).\n!\nPublish f.\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(0, 0), Ok((1, 1, 1)));
}

#[test]
fn assigning_into_a_tuple_is_a_runtime_error() {
    let err = run_err("pixel p = (1 2).\np<0> = 3.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
}

// ---- walrus forms ----

#[test]
fn walrus_assignment_writes_through_and_yields_the_value() {
    let source = "int x = 0.\nint y = (x = 5) + 1.\nFrame f = Frame().\nf -> (0 0) = (x y 0).\nPublish f.\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(0, 0), Ok((5, 6, 0)));
}

#[test]
fn walrus_declaration_defines_in_the_current_scope() {
    assert_eq!(eval_int("(int z = 7) + z"), 14);
}

#[test]
fn walrus_assignment_to_undefined_name_fails() {
    let err = run_err("int y = (ghost = 5).");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("ghost"));
}

// ---- control flow ----

#[test]
fn while_loop_runs_until_the_condition_fails() {
    let source = "int acc = 1.\nint i = 0.\nWhile (i < 4)\n    (acc = acc * 2).\n    (i = i + 1).\n!\n\
        Frame f = Frame().\nf -> (0 0) = (acc acc acc).\nPublish f.\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(0, 0).unwrap().0, 16);
}

#[test]
fn for_loop_variable_is_scoped_to_the_iteration() {
    let err = run_err("For int i in [1 2] :\n    int y = i.\n!\nint z = i.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains('i'));
    assert_eq!(err.line(), Some(4));
}

#[test]
fn for_over_a_non_list_is_a_runtime_error() {
    let err = run_err("For x in 5 :\n    int y = x.\n!\n");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("list"));
}

#[test]
fn return_exits_only_the_enclosing_function() {
    let source = "first{} => int:\n    return (1).\n!\n\
        second{} => int:\n    int x = Do first{}.\n    return (x + 1).\n!\n\
        Frame f = Frame().\nint v = Do second{}.\nf -> (0 0) = (v v v).\nPublish f.\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(0, 0).unwrap().0, 2);
}

#[test]
fn falling_off_a_function_returns_none() {
    let source = "noop{} => None:\n    int x = 1.\n!\nFrame f = Frame().\n\
        (Do noop{} == none) ?\n    f -> (0 0) = (1 1 1).\n!\nPublish f.\n";
    let out = run_collect(source);
    assert_eq!(out.published()[0].get_pixel(0, 0), Ok((1, 1, 1)));
}

#[test]
fn top_level_return_is_a_runtime_error() {
    let err = run_err("return.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("outside"));
}

#[test]
fn recursion_through_the_global_closure() {
    let source = "countdown{int n} => None:\n    (n > 0) ?\n        f -> (n 0) = (9 9 9).\n        Do countdown{n - 1}.\n    !\n!\n\
        Frame f = Frame().\nDo countdown{3} .\nPublish f.\n";
    let out = run_collect(source);
    let frame = &out.published()[0];
    for x in 1..=3 {
        assert_eq!(frame.get_pixel(x, 0), Ok((9, 9, 9)));
    }
    assert_eq!(frame.get_pixel(0, 0), Ok((0, 0, 0)));
}

#[test]
fn argument_count_mismatch_reports_the_call_line() {
    let source = "pair{int a int b} => int:\n    return (a + b).\n!\nint x = Do pair{1}.";
    let err = run_err(source);
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert_eq!(err.line(), Some(4));
    assert!(err.message().contains("mismatch") || err.message().contains("arguments"));
}

// ---- pointers and pixel assignment ----

#[test]
fn pointer_on_non_frame_is_a_runtime_error() {
    let err = run_err("int x = 1.\npixel p = (0 0).\nint y = (x -> p)<0>.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("pointer"));
}

#[test]
fn pixel_assignment_requires_a_color_tuple() {
    let err = run_err("Frame f = Frame().\nf -> (0 0) = 5.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert_eq!(err.line(), Some(2));
}

#[test]
fn pixel_assignment_out_of_range_is_a_runtime_error() {
    let err = run_err("Frame f = Frame().\nf -> (64 0) = (1 1 1).");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("outside"));
}

#[test]
fn pixel_components_outside_rgb565_are_stored_unmodified() {
    let out = run_collect("Frame f = Frame().\nf -> (0 0) = (999 70 40).\nPublish f.\n");
    assert_eq!(out.published()[0].get_pixel(0, 0), Ok((999, 70, 40)));
}

// ---- built-ins through the language ----

#[test]
fn drawing_builtins_accept_pixel_refs_as_points() {
    let source = "Frame f = Frame().\nmakeRect{f f -> (1 1) (3 3) (7 8 9)}.\nPublish f.\n";
    let out = run_collect(source);
    let frame = &out.published()[0];
    assert_eq!(frame.get_pixel(1, 1), Ok((7, 8, 9)));
    assert_eq!(frame.get_pixel(3, 3), Ok((7, 8, 9)));
    assert_eq!(frame.get_pixel(0, 0), Ok((0, 0, 0)));
}

#[test]
fn get_pixel_and_channels_read_back_writes() {
    let source = "Frame f = Frame().\nsetColor{f -> (2 2) (1 2 3)}.\nsetRed{f -> (2 2) 30}.\n\
        Frame g = Frame().\ng -> (0 0) = getPixel{f -> (2 2)}.\n\
        g -> (1 0) = (getRed{f -> (2 2)} getGreen{f -> (2 2)} getBlue{f -> (2 2)}).\nPublish g.\n";
    let out = run_collect(source);
    let frame = &out.published()[0];
    assert_eq!(frame.get_pixel(0, 0), Ok((30, 2, 3)));
    assert_eq!(frame.get_pixel(1, 0), Ok((30, 2, 3)));
}

#[test]
fn make_rect_out_of_range_fails_at_the_call_line() {
    let err = run_err("Frame f = Frame().\nmakeRect{f (60 0) (70 2) (1 1 1)}.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert_eq!(err.line(), Some(2));
}

#[test]
fn save_and_load_qgc_round_trip_through_the_language() {
    let path = scratch_path("roundtrip.qgc");
    let path_str = path.display().to_string();
    let source = format!(
        "Frame f = Frame().\nf -> (7 9) = (11 22 13).\nSaveQGC{{f \"{path_str}\"}}.\n\
         Frame g = LoadQGC{{\"{path_str}\"}}.\nPublish g.\n"
    );
    let out = run_collect(&source);
    assert_eq!(out.published()[0].get_pixel(7, 9), Ok((11, 22, 13)));
    std::fs::remove_file(&path).ok();
}

#[test]
fn load_qgc_missing_file_is_a_runtime_error_at_the_call_line() {
    let err = run_err("Frame f = LoadQGC{\"/nonexistent/frame.qgc\"}.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert_eq!(err.line(), Some(1));
}

// ---- publish and send ----

#[test]
fn publish_requires_a_frame() {
    let err = run_err("Publish 5.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("Frame"));
}

#[test]
fn send_requires_a_string_and_reaches_the_handler() {
    let out = run_collect("Send \"frames/latest.qgc\".");
    assert_eq!(out.sent_paths(), ["frames/latest.qgc"]);

    let err = run_err("Send 5.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("string"));
}

#[test]
fn publish_inside_a_loop_publishes_each_time() {
    let out = run_collect("Frame f = Frame().\nFor i in [1 2 3] :\n    Publish f.\n!\n");
    assert_eq!(out.published().len(), 3);
}

// ---- error surface ----

#[test]
fn lex_error_surfaces_with_position() {
    let err = run_err("int x = @.");
    assert_eq!(err.kind(), ExcKind::LexError);
    assert_eq!(err.line(), Some(1));
    assert_eq!(err.column(), Some(9));
}

#[test]
fn undefined_variable_reports_name_and_line() {
    let err = run_err("int x = 1.\nint y = ghost.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("ghost"));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn assignment_to_undefined_variable_fails() {
    let err = run_err("ghost = 1.");
    assert_eq!(err.kind(), ExcKind::RuntimeError);
    assert!(err.message().contains("ghost"));
}

#[test]
fn first_error_stops_the_run() {
    let out_err = run_err("Frame f = Frame().\nPublish f.\nint x = ghost.\nPublish f.\n");
    assert_eq!(out_err.line(), Some(3));
    // Only the publish before the error happened.
    let runner = Runner::new(
        "Frame f = Frame().\nPublish f.\nint x = ghost.\nPublish f.\n".to_owned(),
        "test.qgk",
    )
    .unwrap();
    let mut out = CollectPublish::new();
    runner.run(&mut out).unwrap_err();
    assert_eq!(out.published().len(), 1);
}
