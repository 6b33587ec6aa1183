mod common;

use std::collections::BTreeMap;

use stagerun::action::{Action, ActionTable, Runnable, Variant};
use stagerun::dag::{
    Condition, FinishedStep, PlanDecision, Scheduler, Stage, Step, StepRunState,
};
use stagerun::engine::StepOutcome;
use stagerun::expr::ExpressionContext;
use stagerun::types::{OnError, SkipReason, StepStatus};
use stagerun_test_utils::builders::{StageBuilder, echo_actions, scheduler_for};

fn names(steps: &[stagerun::dag::ScheduledStep]) -> Vec<&str> {
    steps.iter().map(|s| s.name.as_str()).collect()
}

fn finished<'a>(steps: &'a [FinishedStep], name: &str) -> &'a FinishedStep {
    steps
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("{name} did not finish in this transition"))
}

fn diamond(on_error_b: OnError) -> Scheduler {
    let (stage, actions) = StageBuilder::new("release")
        .step("A", &[])
        .step("B", &["A"])
        .on_error(on_error_b)
        .step("C", &["A"])
        .step("D", &["B", "C"])
        .build_with_actions();
    scheduler_for(&stage, actions, ExpressionContext::new(), 8)
}

#[test]
fn start_schedules_roots_in_declaration_order() {
    let (stage, actions) = StageBuilder::new("s")
        .step("lint", &[])
        .step("test", &["lint"])
        .step("fmt", &[])
        .step("docs", &[])
        .build_with_actions();
    let mut scheduler = scheduler_for(&stage, actions, ExpressionContext::new(), 8);

    let step = scheduler.start();
    assert_eq!(names(&step.newly_scheduled), ["lint", "fmt", "docs"]);
    assert!(step.newly_finished.is_empty());
    assert_eq!(scheduler.running_count(), 3);
    assert_eq!(scheduler.run_state_of("test"), Some(StepRunState::Pending));
    assert_eq!(scheduler.deps_terminal("test"), Some(false));

    // A second start is ignored.
    let again = scheduler.start();
    assert!(again.newly_scheduled.is_empty());
}

#[test]
fn dependents_wait_for_every_requirement() {
    let mut scheduler = diamond(OnError::Stop);

    assert_eq!(names(&scheduler.start().newly_scheduled), ["A"]);

    let step = scheduler.handle_completion("A", &StepOutcome::Success);
    assert_eq!(finished(&step.newly_finished, "A").status, StepStatus::Ok);
    assert_eq!(names(&step.newly_scheduled), ["B", "C"]);

    let step = scheduler.handle_completion("C", &StepOutcome::Success);
    assert!(step.newly_scheduled.is_empty(), "D must wait for B");
    assert_eq!(scheduler.deps_terminal("D"), Some(false));

    let step = scheduler.handle_completion("B", &StepOutcome::Success);
    assert_eq!(names(&step.newly_scheduled), ["D"]);

    let step = scheduler.handle_completion("D", &StepOutcome::Success);
    assert!(step.run_just_finished);
    assert!(scheduler.is_finished());
}

#[test]
fn stop_failure_skips_transitive_dependents_naming_the_root_cause() {
    let (stage, actions) = StageBuilder::new("s")
        .step("A", &[])
        .step("B", &["A"])
        .step("C", &["B"])
        .step("other", &[])
        .build_with_actions();
    let mut scheduler = scheduler_for(&stage, actions, ExpressionContext::new(), 8);
    scheduler.start();

    let step = scheduler.handle_completion("A", &StepOutcome::failed_with_code(2));

    let a = finished(&step.newly_finished, "A");
    assert_eq!(a.status, StepStatus::Error);
    assert_eq!(a.message, "exited with status 2");

    for dependent in ["B", "C"] {
        let f = finished(&step.newly_finished, dependent);
        assert_eq!(f.status, StepStatus::Skipped);
        assert_eq!(f.skip_reason, Some(SkipReason::Blocked("A".to_string())));
    }
    assert!(step.newly_scheduled.is_empty());

    // Unrelated work keeps going.
    assert_eq!(scheduler.run_state_of("other"), Some(StepRunState::Running));
    assert!(!scheduler.is_finished());

    let step = scheduler.handle_completion("other", &StepOutcome::Success);
    assert!(step.run_just_finished);
}

#[test]
fn warn_failure_lets_dependents_run() {
    let mut scheduler = diamond(OnError::Warn);
    scheduler.start();
    scheduler.handle_completion("A", &StepOutcome::Success);

    let step = scheduler.handle_completion("B", &StepOutcome::failed_with_error("lint found 3 issues"));
    let b = finished(&step.newly_finished, "B");
    assert_eq!(b.status, StepStatus::Warn);
    assert_eq!(b.message, "lint found 3 issues");

    let step = scheduler.handle_completion("C", &StepOutcome::Success);
    assert_eq!(names(&step.newly_scheduled), ["D"]);
}

#[test]
fn false_condition_skips_without_cascading() {
    let stage = Stage::new(
        "s",
        vec![
            Step::new("A", "A").when(Condition::Expr("os == 'windows'".to_string())),
            Step::new("B", "B").requires("A"),
            Step::new("C", "C").when(Condition::Labels(vec!["ci".to_string()])),
        ],
    );
    let ctx = ExpressionContext::new().with("os", "linux");
    let mut scheduler = scheduler_for(&stage, echo_actions(&["A", "B", "C"]), ctx, 8);

    let step = scheduler.start();
    let a = finished(&step.newly_finished, "A");
    assert_eq!(a.status, StepStatus::Skipped);
    assert_eq!(a.skip_reason, Some(SkipReason::ConditionNotMet));

    let c = finished(&step.newly_finished, "C");
    assert_eq!(c.skip_reason, Some(SkipReason::ConditionNotMet));

    assert_eq!(names(&step.newly_scheduled), ["B"]);
}

#[test]
fn active_label_satisfies_only_filter() {
    let stage = Stage::new(
        "s",
        vec![Step::new("A", "A").when(Condition::Labels(vec![
            "nightly".to_string(),
            "ci".to_string(),
        ]))],
    );
    let ctx = ExpressionContext::new().with_label("ci");
    let mut scheduler = scheduler_for(&stage, echo_actions(&["A"]), ctx, 1);
    assert_eq!(names(&scheduler.start().newly_scheduled), ["A"]);
}

#[test]
fn no_matching_variant_skips_without_cascading() {
    let mut actions = echo_actions(&["after"]);
    actions.insert(Action::with_variants(
        "sign",
        vec![Variant {
            guard: "os == 'macos'".to_string(),
            runnable: Runnable::Command("codesign".to_string()),
        }],
    ));
    let stage = Stage::new(
        "s",
        vec![
            Step::new("sign", "sign"),
            Step::new("after", "after").requires("sign"),
        ],
    );
    let ctx = ExpressionContext::new().with("os", "linux");
    let mut scheduler = scheduler_for(&stage, actions, ctx, 4);

    let step = scheduler.start();
    assert_eq!(
        finished(&step.newly_finished, "sign").skip_reason,
        Some(SkipReason::NoMatchingVariant)
    );
    assert_eq!(names(&step.newly_scheduled), ["after"]);
}

#[test]
fn invalid_condition_fails_the_step_under_its_policy() {
    let stage = Stage::new(
        "s",
        vec![
            Step::new("strict", "x").when(Condition::Expr("((".to_string())),
            Step::new("after_strict", "x").requires("strict"),
            Step::new("lenient", "x")
                .when(Condition::Expr("((".to_string()))
                .on_error(OnError::Warn),
            Step::new("after_lenient", "x").requires("lenient"),
        ],
    );
    let mut scheduler = scheduler_for(&stage, echo_actions(&["x"]), ExpressionContext::new(), 4);

    let step = scheduler.start();

    let strict = finished(&step.newly_finished, "strict");
    assert_eq!(strict.status, StepStatus::Error);
    assert!(strict.message.starts_with("invalid condition"), "{}", strict.message);
    assert_eq!(
        finished(&step.newly_finished, "after_strict").skip_reason,
        Some(SkipReason::Blocked("strict".to_string()))
    );

    assert_eq!(finished(&step.newly_finished, "lenient").status, StepStatus::Warn);
    assert_eq!(names(&step.newly_scheduled), ["after_lenient"]);
}

#[test]
fn broken_variant_guard_fails_the_step_under_its_policy() {
    let mut actions = echo_actions(&["after"]);
    actions.insert(Action::with_variants(
        "pkg",
        vec![
            Variant {
                guard: "((".to_string(),
                runnable: Runnable::Command("pack.bat".to_string()),
            },
            Variant {
                guard: "true".to_string(),
                runnable: Runnable::Command("./pack.sh".to_string()),
            },
        ],
    ));
    let stage = Stage::new(
        "s",
        vec![
            Step::new("pkg", "pkg"),
            Step::new("after_pkg", "after").requires("pkg"),
            Step::new("pkg_soft", "pkg").on_error(OnError::Warn),
            Step::new("after_soft", "after").requires("pkg_soft"),
        ],
    );
    let mut scheduler = scheduler_for(&stage, actions, ExpressionContext::new(), 4);

    let step = scheduler.start();

    let pkg = finished(&step.newly_finished, "pkg");
    assert_eq!(pkg.status, StepStatus::Error);
    assert!(
        pkg.message.starts_with("invalid variant guard in action 'pkg'"),
        "{}",
        pkg.message
    );
    assert_eq!(
        finished(&step.newly_finished, "after_pkg").skip_reason,
        Some(SkipReason::Blocked("pkg".to_string()))
    );

    assert_eq!(finished(&step.newly_finished, "pkg_soft").status, StepStatus::Warn);
    assert_eq!(names(&step.newly_scheduled), ["after_soft"]);
    assert!(!scheduler.is_finished());
}

#[test]
fn commands_and_env_are_interpolated_at_dispatch() {
    let mut action = Action::command("build", "cargo build --target {{ target }}");
    action.env = BTreeMap::from([("PROFILE".to_string(), "{{ inputs.profile }}".to_string())]);
    let mut actions = ActionTable::new();
    actions.insert(action);

    let stage = Stage::new("s", vec![Step::new("build", "build")]);
    let ctx = ExpressionContext::new()
        .with("target", "wasm32-unknown-unknown")
        .with("inputs.profile", "release");
    let mut scheduler = scheduler_for(&stage, actions, ctx, 1);

    let step = scheduler.start();
    let scheduled = &step.newly_scheduled[0];
    assert_eq!(
        scheduled.runnable,
        Runnable::Command("cargo build --target wasm32-unknown-unknown".to_string())
    );
    assert_eq!(scheduled.env.get("PROFILE").map(String::as_str), Some("release"));
    assert_eq!(scheduled.stage, "s");
}

#[test]
fn max_parallel_caps_running_steps_and_fills_freed_slots_in_order() {
    let (stage, actions) = StageBuilder::new("s")
        .step("a", &[])
        .step("b", &[])
        .step("c", &[])
        .step("d", &[])
        .build_with_actions();
    let mut scheduler = scheduler_for(&stage, actions, ExpressionContext::new(), 2);

    assert_eq!(names(&scheduler.start().newly_scheduled), ["a", "b"]);
    assert_eq!(scheduler.run_state_of("c"), Some(StepRunState::Ready));

    let step = scheduler.handle_completion("b", &StepOutcome::Success);
    assert_eq!(names(&step.newly_scheduled), ["c"]);
    assert_eq!(scheduler.running_count(), 2);

    let step = scheduler.handle_completion("a", &StepOutcome::Success);
    assert_eq!(names(&step.newly_scheduled), ["d"]);
}

#[test]
fn stray_completions_are_ignored() {
    let mut scheduler = diamond(OnError::Stop);
    scheduler.start();

    let step = scheduler.handle_completion("nope", &StepOutcome::Success);
    assert!(step.newly_finished.is_empty());

    // D is not running yet.
    let step = scheduler.handle_completion("D", &StepOutcome::Success);
    assert!(step.newly_finished.is_empty());
    assert_eq!(scheduler.run_state_of("D"), Some(StepRunState::Pending));
}

#[test]
fn cancel_skips_waiting_steps_and_leaves_running_ones() {
    let (stage, actions) = StageBuilder::new("s")
        .step("a", &[])
        .step("b", &[])
        .step("c", &["a"])
        .step("d", &[])
        .build_with_actions();
    let mut scheduler = scheduler_for(&stage, actions, ExpressionContext::new(), 2);
    scheduler.start();

    let step = scheduler.cancel();
    assert!(scheduler.is_cancelled());
    assert!(!step.run_just_finished);
    for name in ["c", "d"] {
        let f = finished(&step.newly_finished, name);
        assert_eq!(f.status, StepStatus::Skipped);
        assert_eq!(f.skip_reason, Some(SkipReason::Cancelled));
    }
    assert_eq!(scheduler.running_count(), 2);

    // Cancelling twice changes nothing.
    assert!(scheduler.cancel().newly_finished.is_empty());

    let step = scheduler.handle_completion("a", &StepOutcome::Terminated);
    assert_eq!(finished(&step.newly_finished, "a").status, StepStatus::Terminated);
    assert!(step.newly_scheduled.is_empty());

    let step = scheduler.handle_completion("b", &StepOutcome::Success);
    assert!(step.run_just_finished);
    assert_eq!(scheduler.run_state_of("b"), Some(StepRunState::Done(StepStatus::Ok)));
}

#[test]
fn plan_resolves_without_running() {
    let mut actions = echo_actions(&["A", "B"]);
    actions.insert(Action::command("C", "deploy {{ env }}"));
    let stage = Stage::new(
        "s",
        vec![
            Step::new("A", "A"),
            Step::new("B", "B")
                .requires("A")
                .when(Condition::Expr("false".to_string())),
            Step::new("C", "C").requires("B"),
        ],
    );
    let ctx = ExpressionContext::new().with("env", "staging");
    let scheduler = scheduler_for(&stage, actions, ctx, 1);

    let plan = scheduler.plan();
    assert_eq!(plan.len(), 3);
    assert_eq!(plan[0].decision, PlanDecision::Run(Runnable::Command("echo A".to_string())));
    assert_eq!(plan[1].decision, PlanDecision::Skip(SkipReason::ConditionNotMet));
    assert_eq!(plan[1].requires, ["A"]);
    assert_eq!(plan[2].level, 2);
    assert_eq!(
        plan[2].decision,
        PlanDecision::Run(Runnable::Command("deploy staging".to_string()))
    );
    assert_eq!(scheduler.running_count(), 0);
}
