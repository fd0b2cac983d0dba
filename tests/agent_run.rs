//! Agent execution loop integration tests
//!
//! Drives the agent with scripted reasoning clients and observers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use taskpilot::actions::{ActionRegistry, ActionSpec, FieldType, ParamSchema};
use taskpilot::agent::{
    ActionFailure, ActionOutcome, AgentStatus, Decision, DecisionRequest, ReasoningClient,
};
use taskpilot::core::{ActionInvocation, ActionResult, Observation, PilotError, Result, Task};
use taskpilot::observe::EnvironmentObserver;
use taskpilot::Agent;

/// Replays queued decisions; once the queue is empty it keeps going without
/// acting.
#[derive(Default)]
struct ScriptedReasoner {
    decisions: Mutex<VecDeque<Result<Decision>>>,
    /// History length seen on each turn
    seen_history: Mutex<Vec<usize>>,
    /// Offered action names on each turn
    seen_actions: Mutex<Vec<Vec<String>>>,
    /// Summaries shown on each turn
    seen_summaries: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    fn new(decisions: Vec<Result<Decision>>) -> Arc<Self> {
        Arc::new(Self {
            decisions: Mutex::new(decisions.into()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoner {
    async fn decide(&self, request: &DecisionRequest<'_>) -> Result<Decision> {
        self.seen_history.lock().unwrap().push(request.history.len());
        self.seen_actions
            .lock()
            .unwrap()
            .push(request.actions.iter().map(|a| a.name().to_string()).collect());
        self.seen_summaries
            .lock()
            .unwrap()
            .push(request.history_summary());

        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Decision::act("keep looking", vec![])))
    }
}

/// Observer that reports a new page on every call
#[derive(Default)]
struct PageObserver {
    calls: AtomicUsize,
    visual_requests: AtomicUsize,
}

#[async_trait]
impl EnvironmentObserver for PageObserver {
    async fn observe(&self, include_visual: bool) -> Result<Observation> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if include_visual {
            self.visual_requests.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Observation {
            text: format!("- link \"Investing\" [ref=e{}]", n),
            url: Some(format!("https://robinhood.com/page/{}", n)),
            title: Some("Robinhood".to_string()),
            image: include_visual.then(|| "aW1hZ2U=".to_string()),
        })
    }
}

fn invoke(name: &str, arguments: Value) -> ActionInvocation {
    ActionInvocation::new(name, arguments)
}

fn webpage_registry(calls: Arc<AtomicUsize>) -> ActionRegistry {
    ActionRegistry::new()
        .with_action(ActionSpec::from_fn(
            "go_to_webpage",
            "Go to the webpage",
            ParamSchema::new().with_default(
                "link",
                FieldType::Url,
                "Webpage link",
                json!("https://robinhood.com"),
            ),
            move |args| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ActionResult::text(args.get_str("link").unwrap_or_default()))
            },
        ))
        .unwrap()
}

fn agent(
    registry: ActionRegistry,
    reasoner: Arc<ScriptedReasoner>,
    observer: Arc<PageObserver>,
) -> Agent {
    Agent::builder(Task::new("Return the holdings as JSON"))
        .registry(Arc::new(registry))
        .reasoner(reasoner)
        .observer(observer)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_completes_with_payload_on_first_step() {
    let payload = json!({"cryptocurrencies": [], "stocks": []});
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::new(vec![Ok(Decision::complete(
        "Found the holdings",
        payload.clone(),
    )
    .with_invocation(invoke("go_to_webpage", json!({}))))]);

    let agent = agent(
        webpage_registry(Arc::clone(&calls)),
        reasoner,
        Arc::new(PageObserver::default()),
    );
    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history.status(), AgentStatus::Done);
    assert!(history.is_done());
    assert_eq!(history.final_result(), Some(&payload));
    assert_eq!(history.final_result(), history.final_result());

    // handler output recorded verbatim
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        history.steps()[0].actions[0].outcome,
        ActionOutcome::Completed(ActionResult::text("https://robinhood.com"))
    );
}

#[tokio::test]
async fn test_runs_out_of_steps_without_completion() {
    let reasoner = ScriptedReasoner::new(vec![]);
    let observer = Arc::new(PageObserver::default());
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        Arc::clone(&reasoner),
        Arc::clone(&observer),
    );

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 5);
    assert_eq!(history.status(), AgentStatus::StepsExhausted);
    assert!(history.final_result().is_none());
    assert!(history.failure().is_none());
    assert_eq!(observer.calls.load(Ordering::SeqCst), 5);

    // steps are numbered in order and each turn sees all earlier steps
    let numbers: Vec<_> = history.steps().iter().map(|s| s.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(*reasoner.seen_history.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_unknown_action_is_recorded_and_run_continues() {
    let reasoner = ScriptedReasoner::new(vec![
        Ok(Decision::act("try it", vec![invoke("fly_to_moon", json!({}))])),
        Ok(Decision::complete("gave up", json!({"stocks": []}))),
    ]);
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        Arc::clone(&reasoner),
        Arc::new(PageObserver::default()),
    );

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history.status(), AgentStatus::Done);
    let errors = history.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, 1);
    assert_eq!(
        errors[0].1,
        &ActionFailure::UnknownAction {
            name: "fly_to_moon".into()
        }
    );

    // the failure is shown to the next reasoning turn
    let summaries = reasoner.seen_summaries.lock().unwrap();
    assert!(summaries[1].contains("fly_to_moon"));
    assert!(summaries[1].contains("ERROR"));
}

#[tokio::test]
async fn test_surplus_invocations_are_not_executed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::new(vec![Ok(Decision::act(
        "open twice",
        vec![
            invoke("go_to_webpage", json!({})),
            invoke("go_to_webpage", json!({"link": "https://robinhood.com/account"})),
        ],
    ))]);
    let agent = agent(
        webpage_registry(Arc::clone(&calls)),
        reasoner,
        Arc::new(PageObserver::default()),
    );

    let history = agent.run(1, 1).await.unwrap();
    let actions = &history.steps()[0].actions;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(actions.len(), 2);
    assert!(matches!(actions[0].outcome, ActionOutcome::Completed(_)));
    assert_eq!(
        actions[1].outcome,
        ActionOutcome::Failed(ActionFailure::BudgetExceeded { limit: 1 })
    );
}

#[tokio::test]
async fn test_unreachable_reasoner_fails_run_but_keeps_history() {
    let reasoner = ScriptedReasoner::new(vec![
        Ok(Decision::act("look", vec![])),
        Ok(Decision::act("look again", vec![])),
        Err(PilotError::reasoning_unavailable("connection refused")),
        Ok(Decision::complete("never reached", json!({}))),
    ]);
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        reasoner,
        Arc::new(PageObserver::default()),
    );

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history.status(), AgentStatus::Failed);
    assert!(history.failure().unwrap().contains("connection refused"));
    assert!(history.final_result().is_none());
}

/// Observer whose session dies after the first observation
#[derive(Default)]
struct FailingObserver {
    calls: AtomicUsize,
}

#[async_trait]
impl EnvironmentObserver for FailingObserver {
    async fn observe(&self, _include_visual: bool) -> Result<Observation> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(Observation::text("- link \"Investing\" [ref=e1]")),
            _ => Err(PilotError::observation("browser process crashed: target closed")),
        }
    }
}

#[tokio::test]
async fn test_observer_failure_fails_run_but_keeps_history() {
    let reasoner = ScriptedReasoner::new(vec![]);
    let observer = Arc::new(FailingObserver::default());
    let agent = Agent::builder(Task::new("t"))
        .reasoner(Arc::clone(&reasoner) as Arc<dyn ReasoningClient>)
        .observer(Arc::clone(&observer) as Arc<dyn EnvironmentObserver>)
        .build()
        .unwrap();

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history.status(), AgentStatus::Failed);
    assert!(history.failure().unwrap().contains("target closed"));
    assert!(history.final_result().is_none());
    // no reasoning turn without an observation
    assert_eq!(reasoner.seen_history.lock().unwrap().len(), 1);
    assert_eq!(observer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_malformed_decision_fails_run_but_keeps_history() {
    let reasoner = ScriptedReasoner::new(vec![
        Ok(Decision::act("look", vec![])),
        Err(PilotError::decision_format("model returned neither tool calls nor an answer")),
        Ok(Decision::complete("never reached", json!({"stocks": []}))),
    ]);
    let observer = Arc::new(PageObserver::default());
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        reasoner,
        Arc::clone(&observer),
    );

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history.status(), AgentStatus::Failed);
    assert!(history.failure().unwrap().contains("neither tool calls"));
    assert!(history.final_result().is_none());
    assert_eq!(observer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::new(vec![Ok(Decision::act(
        "bad link",
        vec![invoke("go_to_webpage", json!({"link": 42, "tab": 2}))],
    ))]);
    let agent = agent(
        webpage_registry(Arc::clone(&calls)),
        reasoner,
        Arc::new(PageObserver::default()),
    );

    let history = agent.run(1, 1).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    match &history.steps()[0].actions[0].outcome {
        ActionOutcome::Failed(ActionFailure::Validation { violations }) => {
            let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
            assert!(fields.contains(&"link"));
            assert!(fields.contains(&"tab"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_handler_error_recorded_and_next_step_runs() {
    let registry = ActionRegistry::new()
        .with_action(ActionSpec::from_fn(
            "click_element",
            "Click",
            ParamSchema::new().required("ref", FieldType::String, "Element ref"),
            |_| Err(PilotError::browser("element detached")),
        ))
        .unwrap();
    let reasoner = ScriptedReasoner::new(vec![
        Ok(Decision::act("click", vec![invoke("click_element", json!({"ref": "e1"}))])),
        Ok(Decision::complete("done", json!({"stocks": []}))),
    ]);
    let agent = agent(registry, reasoner, Arc::new(PageObserver::default()));

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.status(), AgentStatus::Done);
    match history.errors()[0].1 {
        ActionFailure::Execution { reason } => assert!(reason.contains("element detached")),
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_actions_run_in_proposed_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ActionRegistry::new();
    for name in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        registry
            .register(ActionSpec::from_fn(name, name, ParamSchema::new(), move |_| {
                log.lock().unwrap().push(name);
                Ok(ActionResult::text(name))
            }))
            .unwrap();
    }
    let reasoner = ScriptedReasoner::new(vec![Ok(Decision::act(
        "all three",
        vec![
            invoke("third", json!({})),
            invoke("first", json!({})),
            invoke("second", json!({})),
        ],
    ))]);
    let agent = agent(registry, reasoner, Arc::new(PageObserver::default()));

    let history = agent.run(1, 3).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["third", "first", "second"]);
    assert_eq!(history.action_names(), vec!["third", "first", "second"]);
}

#[tokio::test]
async fn test_zero_budgets_rejected_before_any_step() {
    let observer = Arc::new(PageObserver::default());
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        ScriptedReasoner::new(vec![]),
        Arc::clone(&observer),
    );

    assert!(matches!(agent.run(0, 1).await, Err(PilotError::Config(_))));
    assert!(matches!(agent.run(5, 0).await, Err(PilotError::Config(_))));
    assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_collaborators_rejected() {
    let err = Agent::builder(Task::new("t"))
        .observer(Arc::new(PageObserver::default()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, PilotError::Config(_)));

    let err = Agent::builder(Task::new("t"))
        .reasoner(ScriptedReasoner::new(vec![]))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, PilotError::Config(_)));
}

#[tokio::test]
async fn test_cancelled_before_first_step() {
    let observer = Arc::new(PageObserver::default());
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        ScriptedReasoner::new(vec![]),
        Arc::clone(&observer),
    );
    agent.cancellation_token().cancel();

    let history = agent.run(5, 1).await.unwrap();

    assert!(history.is_empty());
    assert_eq!(history.status(), AgentStatus::Cancelled);
    assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
}

/// Cancels the shared token while deciding, so the current step finishes.
struct CancellingReasoner {
    token: tokio_util::sync::CancellationToken,
}

#[async_trait]
impl ReasoningClient for CancellingReasoner {
    async fn decide(&self, _request: &DecisionRequest<'_>) -> Result<Decision> {
        self.token.cancel();
        Ok(Decision::act("stop me", vec![]))
    }
}

#[tokio::test]
async fn test_cancellation_takes_effect_between_steps() {
    let token = tokio_util::sync::CancellationToken::new();
    let agent = Agent::builder(Task::new("t"))
        .reasoner(Arc::new(CancellingReasoner {
            token: token.clone(),
        }))
        .observer(Arc::new(PageObserver::default()))
        .cancellation_token(token)
        .build()
        .unwrap();

    let history = agent.run(5, 1).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history.status(), AgentStatus::Cancelled);
}

#[tokio::test]
async fn test_consecutive_failure_cap() {
    let decisions = (0..5)
        .map(|_| Ok(Decision::act("again", vec![invoke("missing", json!({}))])))
        .collect();
    let agent = Agent::builder(Task::new("t"))
        .reasoner(ScriptedReasoner::new(decisions))
        .observer(Arc::new(PageObserver::default()))
        .max_consecutive_failures(Some(3))
        .build()
        .unwrap();

    let history = agent.run(10, 1).await.unwrap();

    assert_eq!(history.len(), 3);
    assert_eq!(history.status(), AgentStatus::Failed);
    assert!(history.failure().unwrap().contains("3 consecutive"));
}

#[tokio::test]
async fn test_vision_flag_forwarded() {
    let observer = Arc::new(PageObserver::default());
    let agent = Agent::builder(Task::new("t"))
        .reasoner(ScriptedReasoner::new(vec![]))
        .observer(Arc::clone(&observer) as Arc<dyn EnvironmentObserver>)
        .use_vision(false)
        .build()
        .unwrap();

    let history = agent.run(2, 1).await.unwrap();

    assert_eq!(observer.visual_requests.load(Ordering::SeqCst), 0);
    assert!(history.steps().iter().all(|s| s.observation.image.is_none()));
    assert_eq!(
        history.urls(),
        vec!["https://robinhood.com/page/1", "https://robinhood.com/page/2"]
    );
}

#[tokio::test]
async fn test_registry_shared_across_concurrent_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(webpage_registry(Arc::clone(&calls)));

    let build = |payload: Value| {
        Agent::builder(Task::new("t"))
            .registry(Arc::clone(&registry))
            .reasoner(ScriptedReasoner::new(vec![
                Ok(Decision::act("open", vec![invoke("go_to_webpage", json!({}))])),
                Ok(Decision::complete("done", payload)),
            ]))
            .observer(Arc::new(PageObserver::default()))
            .build()
            .unwrap()
    };
    let a = build(json!({"run": "a"}));
    let b = build(json!({"run": "b"}));

    let (ha, hb) = tokio::join!(a.run(5, 1), b.run(5, 1));
    let (ha, hb) = (ha.unwrap(), hb.unwrap());

    assert_eq!(ha.final_result(), Some(&json!({"run": "a"})));
    assert_eq!(hb.final_result(), Some(&json!({"run": "b"})));
    assert_eq!(ha.len(), 2);
    assert_eq!(hb.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_offered_actions_match_registry() {
    let reasoner = ScriptedReasoner::new(vec![]);
    let agent = agent(
        webpage_registry(Arc::new(AtomicUsize::new(0))),
        Arc::clone(&reasoner),
        Arc::new(PageObserver::default()),
    );

    agent.run(1, 1).await.unwrap();

    assert_eq!(
        *reasoner.seen_actions.lock().unwrap(),
        vec![vec!["go_to_webpage".to_string()]]
    );
}

#[test]
fn test_saved_history_replays() {
    let history = tokio_test::block_on(async {
        let agent = agent(
            webpage_registry(Arc::new(AtomicUsize::new(0))),
            ScriptedReasoner::new(vec![Ok(Decision::complete(
                "done",
                json!({"stocks": [{"symbol": "AAPL"}]}),
            )
            .with_invocation(invoke("go_to_webpage", json!({}))))]),
            Arc::new(PageObserver::default()),
        );
        agent.run(3, 1).await.unwrap()
    });

    let path = std::env::temp_dir().join(format!("taskpilot-replay-{}.json", std::process::id()));
    history.save_to_file(&path).unwrap();
    let loaded = taskpilot::History::load_from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.final_result(), history.final_result());
    assert_eq!(loaded.action_names(), vec!["go_to_webpage"]);
    assert_eq!(loaded.status(), AgentStatus::Done);
}
