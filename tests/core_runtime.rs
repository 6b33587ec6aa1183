use std::time::Duration;

use stagerun::engine::{CoreCommand, CoreRuntime, RuntimeEvent, StepOutcome};
use stagerun::expr::ExpressionContext;
use stagerun::output::StepEvent;
use stagerun::types::{OutputLine, StepStatus};
use stagerun_test_utils::builders::{StageBuilder, scheduler_for};

fn core() -> CoreRuntime {
    let (stage, actions) = StageBuilder::new("s")
        .step("build", &[])
        .step("test", &["build"])
        .step("docs", &[])
        .build_with_actions();
    CoreRuntime::new(scheduler_for(&stage, actions, ExpressionContext::new(), 4))
}

fn kinds(commands: &[CoreCommand]) -> Vec<String> {
    commands
        .iter()
        .map(|c| match c {
            CoreCommand::DispatchSteps(steps) => format!(
                "dispatch {}",
                steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(",")
            ),
            CoreCommand::Emit(StepEvent::Started { step }) => format!("started {step}"),
            CoreCommand::Emit(StepEvent::Output { step, .. }) => format!("output {step}"),
            CoreCommand::Emit(StepEvent::Finished { step, summary }) => {
                format!("finished {step} {}", summary.status)
            }
            CoreCommand::TerminateRunning => "terminate".to_string(),
        })
        .collect()
}

fn completed(step: &str, outcome: StepOutcome) -> RuntimeEvent {
    RuntimeEvent::StepCompleted {
        step: step.to_string(),
        outcome,
        duration: Duration::from_millis(20),
    }
}

#[test]
fn started_events_precede_dispatch() {
    let mut core = core();
    let step = core.start();

    assert_eq!(
        kinds(&step.commands),
        ["started build", "started docs", "dispatch build,docs"]
    );
    assert!(step.keep_running);
    assert_eq!(core.results()[0].status, StepStatus::Running);
    assert_eq!(core.results()[0].command.as_deref(), Some("echo build"));
}

#[test]
fn completion_finishes_then_unblocks() {
    let mut core = core();
    core.start();

    let step = core.step(RuntimeEvent::StepOutput {
        step: "build".to_string(),
        line: OutputLine::stdout("ok"),
    });
    assert_eq!(kinds(&step.commands), ["output build"]);

    let step = core.step(completed("build", StepOutcome::Success));
    assert_eq!(
        kinds(&step.commands),
        ["finished build ok", "started test", "dispatch test"]
    );

    core.step(completed("docs", StepOutcome::Success));
    let step = core.step(completed("test", StepOutcome::failed_with_code(1)));
    assert_eq!(kinds(&step.commands), ["finished test error"]);
    assert!(!step.keep_running);
    assert!(core.is_finished());

    let result = core.into_result(Duration::from_secs(1));
    assert!(!result.success());
    assert_eq!(result.step("build").unwrap().output, vec![OutputLine::stdout("ok")]);
    assert_eq!(result.step("test").unwrap().duration, Duration::from_millis(20));
}

#[test]
fn output_from_a_step_that_is_not_running_is_dropped() {
    let mut core = core();
    core.start();

    let step = core.step(RuntimeEvent::StepOutput {
        step: "test".to_string(),
        line: OutputLine::stdout("too early"),
    });
    assert!(step.commands.is_empty());
    assert!(core.results()[1].output.is_empty());
}

#[test]
fn cancel_skips_waiting_and_terminates_running() {
    let mut core = core();
    core.start();

    let step = core.step(RuntimeEvent::CancelRequested);
    assert_eq!(kinds(&step.commands), ["finished test skipped", "terminate"]);
    assert!(core.is_cancelled());
    assert!(step.keep_running);

    core.step(completed("build", StepOutcome::Terminated));
    let step = core.step(completed("docs", StepOutcome::Terminated));
    assert!(!step.keep_running);

    let result = core.into_result(Duration::ZERO);
    assert!(result.cancelled);
    assert_eq!(result.counts().terminated, 2);
}
