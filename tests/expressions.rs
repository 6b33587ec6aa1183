mod common;

use std::sync::Arc;

use common::TestResult;
use stagerun::expr::{
    CompareOp, ContextBuilder, EvalError, Evaluator, Expr, ExpressionContext, Value, interpolate,
    parse, parse_assignment,
};
use stagerun::fs::mock::MockFileSystem;

fn evaluator() -> Evaluator {
    Evaluator::new(Arc::new(MockFileSystem::new()))
}

fn linux_ctx() -> ExpressionContext {
    ExpressionContext::new()
        .with("os", "linux")
        .with("arch", "x86_64")
        .with("family", "unix")
        .with("count", 10.0)
        .with("version", "1.10.0")
        .with("env.HOME", "/home/ci")
        .with("flag", true)
}

fn eval_bool(text: &str) -> bool {
    evaluator()
        .evaluate_bool(text, &linux_ctx())
        .unwrap_or_else(|e| panic!("'{text}' failed: {e}"))
}

#[test]
fn literal_comparisons_and_logic() {
    assert!(eval_bool(r#""linux" == "linux""#));
    assert!(eval_bool("!(false)"));
    assert!(eval_bool("1 < 2 && 2 < 3"));
    assert!(!eval_bool("1 < 2 && 3 < 2"));
    assert!(eval_bool("false || 'x' != 'y'"));
}

#[test]
fn two_strings_compare_lexicographically() {
    assert!(eval_bool(r#""10" < "9""#));
    assert!(eval_bool("'abc' < 'abd'"));
}

#[test]
fn number_against_numeric_string_compares_numerically() {
    assert!(eval_bool("count > 9"));
    assert!(eval_bool("count >= '9'"));
    assert!(eval_bool("count == '10'"));
}

#[test]
fn semver_compare_is_numeric_aware() -> TestResult {
    let v = evaluator().evaluate(r#"semverCompare("1.10.0","1.9.0")"#, &linux_ctx())?;
    assert_eq!(v, Value::Num(1.0));

    assert!(eval_bool("semverCompare(version, '1.10.0') == 0"));
    assert!(eval_bool("semverCompare('v2.0.0-rc.1', '2.0.0') < 0"));
    Ok(())
}

#[test]
fn variables_resolve_from_context() {
    assert!(eval_bool("os == 'linux'"));
    assert!(eval_bool("startsWith(env.HOME, '/home')"));
    assert!(eval_bool("flag"));
    assert!(eval_bool("flag == true"));
}

#[test]
fn deeply_nested_expression() {
    let text = "((os == 'linux' && (arch == 'x86_64' || arch == 'aarch64')) \
                || !(family == 'unix' && (count < 3 || contains(os, 'win'))))";
    assert!(eval_bool(text));

    let text = "!((os == 'linux' && (arch == 'x86_64' || (count > 100 && flag))))";
    assert!(!eval_bool(text));
}

#[test]
fn not_applies_to_the_whole_comparison() -> TestResult {
    assert_eq!(
        parse("!os == 'windows'")?,
        Expr::Not(Box::new(Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Var("os".to_string())),
            right: Box::new(Expr::Literal(Value::from("windows"))),
        }))
    );
    assert!(eval_bool("!os == 'windows'"));
    Ok(())
}

#[test]
fn and_binds_tighter_than_or() -> TestResult {
    assert!(eval_bool("true || false && false"));
    assert!(eval_bool("false && true || true"));
    assert!(!eval_bool("false && (true || true)"));

    let t = || Box::new(Expr::Literal(Value::Bool(true)));
    let f = || Box::new(Expr::Literal(Value::Bool(false)));
    assert_eq!(
        parse("true || false && false")?,
        Expr::Or(t(), Box::new(Expr::And(f(), f())))
    );
    Ok(())
}

#[test]
fn long_operator_chains_are_rejected_not_overflowed() {
    let ctx = ExpressionContext::new();
    for op in [" && ", " || ", " == "] {
        let text = vec!["true"; 20_000].join(op);
        match evaluator().evaluate(&text, &ctx) {
            Err(EvalError::Syntax { message, .. }) => {
                assert!(message.contains("too deeply"), "{message}")
            }
            other => panic!("expected syntax error for a {op:?} chain, got {other:?}"),
        }
    }

    let text = vec!["true"; 50].join(" && ");
    assert!(evaluator().evaluate_bool(&text, &ctx).unwrap());
}

#[test]
fn string_helpers() {
    assert!(eval_bool("contains('release-build', 'build')"));
    assert!(eval_bool("endsWith(version, '.0')"));
    assert!(eval_bool("matches(arch, '^x86_[0-9]+$')"));
    assert!(!eval_bool("matches(os, '^win')"));
}

#[test]
fn unmatched_parenthesis_is_a_syntax_error() {
    let ctx = linux_ctx();
    for text in ["(os == 'linux'", "os == 'linux')", "((true)", ""] {
        let err = evaluator().evaluate(text, &ctx).unwrap_err();
        assert!(
            matches!(err, EvalError::Syntax { .. }),
            "expected syntax error for {text:?}, got {err:?}"
        );
    }
}

#[test]
fn single_ampersand_is_rejected() {
    let err = parse("true & false").unwrap_err();
    match err {
        EvalError::Syntax { message, .. } => assert!(message.contains("&&")),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn unknown_function_and_arity_errors() {
    let ctx = linux_ctx();

    let err = evaluator().evaluate("frobnicate(os)", &ctx).unwrap_err();
    assert_eq!(err, EvalError::UnknownFunction("frobnicate".to_string()));

    let err = evaluator().evaluate("contains(os)", &ctx).unwrap_err();
    assert_eq!(
        err,
        EvalError::Arity {
            function: "contains".to_string(),
            expected: 2,
            got: 1,
        }
    );
}

#[test]
fn invalid_regex_is_an_error_not_false() {
    let err = evaluator()
        .evaluate("matches(os, '(unclosed')", &linux_ctx())
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidArgument { ref function, .. } if function == "matches"));
}

#[test]
fn unresolved_variable_is_empty_unless_strict() -> TestResult {
    let ctx = linux_ctx();

    assert_eq!(
        evaluator().evaluate("missing", &ctx)?,
        Value::Str(String::new())
    );
    assert!(evaluator().evaluate_bool("!missing", &ctx)?);

    let strict = evaluator().with_strict_variables(true);
    let err = strict.evaluate("missing == ''", &ctx).unwrap_err();
    assert_eq!(err, EvalError::UndefinedVariable("missing".to_string()));
    Ok(())
}

#[test]
fn file_exists_uses_the_filesystem_abstraction() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/work/.skip", "");
    fs.add_file("/work/sub/Cargo.toml", "[package]");

    let eval = Evaluator::new(Arc::new(fs)).with_base_dir("/work");
    let ctx = ExpressionContext::new();

    assert!(eval.evaluate_bool("fileExists('.skip')", &ctx)?);
    assert!(eval.evaluate_bool("fileExists('sub/Cargo.toml')", &ctx)?);
    assert!(eval.evaluate_bool("fileExists('sub')", &ctx)?);
    assert!(eval.evaluate_bool("fileExists('/work/.skip')", &ctx)?);
    assert!(!eval.evaluate_bool("fileExists('missing.txt')", &ctx)?);

    let err = eval.evaluate("fileExists('')", &ctx).unwrap_err();
    assert!(matches!(err, EvalError::InvalidArgument { .. }));
    Ok(())
}

#[test]
fn interpolation_substitutes_each_placeholder() -> TestResult {
    let ctx = linux_ctx().with("target", "aarch64-linux");
    let out = interpolate(
        "cargo build --target {{ target }} # {{os}}/{{ count }}",
        &ctx,
        &evaluator(),
    )?;
    assert_eq!(out, "cargo build --target aarch64-linux # linux/10");

    let out = interpolate("no placeholders here", &ctx, &evaluator())?;
    assert_eq!(out, "no placeholders here");

    let err = interpolate("echo {{ (os }}", &ctx, &evaluator()).unwrap_err();
    assert!(matches!(err, EvalError::Syntax { .. }));
    Ok(())
}

#[test]
fn context_layers_apply_in_order() {
    let ctx = ContextBuilder::new()
        .with_overrides([("target".to_string(), Value::from("cli"))])
        .with_env([("HOME".to_string(), "/h".to_string())])
        .with_vars([
            ("target".to_string(), Value::from("config")),
            ("jobs".to_string(), Value::Num(4.0)),
        ])
        .with_inputs([("profile".to_string(), Value::from("release"))])
        .with_labels(["ci".to_string()])
        .build();

    assert_eq!(ctx.get("target"), Some(&Value::from("cli")));
    assert_eq!(ctx.get("jobs"), Some(&Value::Num(4.0)));
    assert_eq!(ctx.get("env.HOME"), Some(&Value::from("/h")));
    assert_eq!(ctx.get("inputs.profile"), Some(&Value::from("release")));
    assert!(ctx.has_label("ci"));
    assert_eq!(ctx.labels().collect::<Vec<_>>(), vec!["ci"]);
}

#[test]
fn platform_facts_become_variables_and_labels() {
    let ctx = ContextBuilder::new().with_platform_facts().build();
    assert_eq!(ctx.get("os"), Some(&Value::from(std::env::consts::OS)));
    assert_eq!(ctx.get("arch"), Some(&Value::from(std::env::consts::ARCH)));
    assert!(ctx.has_label(std::env::consts::OS));
}

#[cfg(unix)]
#[test]
fn environment_entries_that_are_not_utf8_are_left_out() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let ctx = ContextBuilder::new()
        .with_os_env([
            (OsString::from("GOOD"), OsString::from("fine")),
            (OsString::from("BAD_VALUE"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
            (OsString::from_vec(vec![0x42, 0xfe]), OsString::from("x")),
        ])
        .build();

    assert_eq!(ctx.get("env.GOOD"), Some(&Value::from("fine")));
    assert_eq!(ctx.get("env.BAD_VALUE"), None);
}

#[test]
fn assignments_parse_scalars() {
    assert_eq!(
        parse_assignment("jobs=8"),
        Ok(("jobs".to_string(), Value::Num(8.0)))
    );
    assert_eq!(
        parse_assignment("fast=true"),
        Ok(("fast".to_string(), Value::Bool(true)))
    );
    assert_eq!(
        parse_assignment("target=x86_64=gnu"),
        Ok(("target".to_string(), Value::from("x86_64=gnu")))
    );
    assert_eq!(
        parse_assignment("empty="),
        Ok(("empty".to_string(), Value::from("")))
    );
    assert!(parse_assignment("no-equals-sign").is_err());
    assert!(parse_assignment("=value").is_err());
}
