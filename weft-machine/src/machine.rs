//! Runtime state-machine executor.

use crate::definition::{Definition, Event, State};
use crate::error::MachineError;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A running machine: an immutable definition plus a mutable current-state
/// cursor.
///
/// One `execute` call drives one transition chain. Concurrent `execute`
/// calls on the same machine must be serialized by the caller; the
/// definition itself can be shared between machines.
pub struct StateMachine {
    definition: Arc<Definition>,
    current: Option<String>,
}

impl StateMachine {
    pub fn new(definition: Arc<Definition>) -> Self {
        Self {
            definition,
            current: None,
        }
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// The state the machine currently points at, if any `execute` has run.
    pub fn current_state(&self) -> Option<&State> {
        self.current
            .as_deref()
            .and_then(|id| self.definition.state(id))
    }

    /// Executes one event from the named source state.
    ///
    /// Sets the current state to `source_state_id`, then repeatedly: picks
    /// the first satisfied transition, fires its actions in declaration
    /// order, and either stays (no target) or exits the current state and
    /// enters the target. An entry hook returning [`MachineError::Skip`]
    /// continues the chain from the entered state.
    pub fn execute(
        &mut self,
        token: &CancellationToken,
        source_state_id: &str,
        event: &Event,
        args: &[Value],
    ) -> Result<(), MachineError> {
        tracing::debug!(source = source_state_id, "executing");
        let definition = self.definition.clone();
        if definition.state(source_state_id).is_none() {
            return Err(MachineError::StateNotFound {
                id: source_state_id.to_string(),
            });
        }
        self.current = Some(source_state_id.to_string());

        loop {
            let current_id = self.current.as_deref().expect("current state set above");
            let current = definition
                .state(current_id)
                .expect("current state tracked in definition");

            let transition = current.transform(event)?;

            for action in &transition.actions {
                tracing::debug!(state = %current.id, action = %action, "invoking action");
                current.handler().action(action, token, event, args)?;
            }

            let Some(target_id) = transition.target_id.clone() else {
                tracing::debug!(source = %current.id, target = %current.id, "state retained");
                return Ok(());
            };

            tracing::debug!(source = %current.id, target = %target_id, "transitioning");
            current.handler().exit(token, event, args)?;
            let next = definition
                .state(&target_id)
                .expect("transition targets validated at build");
            self.current = Some(target_id);
            match next.handler().entry(token, event, args) {
                Err(MachineError::Skip) => continue,
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::StateHandler;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: &'static str,
        trace: Trace,
        skip_on_entry: bool,
    }

    impl Recording {
        fn new(label: &'static str, trace: &Trace) -> Arc<dyn StateHandler> {
            Arc::new(Self {
                label,
                trace: trace.clone(),
                skip_on_entry: false,
            })
        }

        fn skipping(label: &'static str, trace: &Trace) -> Arc<dyn StateHandler> {
            Arc::new(Self {
                label,
                trace: trace.clone(),
                skip_on_entry: true,
            })
        }
    }

    impl StateHandler for Recording {
        fn entry(
            &self,
            _token: &CancellationToken,
            _event: &Event,
            _args: &[Value],
        ) -> Result<(), MachineError> {
            self.trace.lock().push(format!("entry:{}", self.label));
            if self.skip_on_entry {
                return Err(MachineError::Skip);
            }
            Ok(())
        }

        fn exit(
            &self,
            _token: &CancellationToken,
            _event: &Event,
            _args: &[Value],
        ) -> Result<(), MachineError> {
            self.trace.lock().push(format!("exit:{}", self.label));
            Ok(())
        }

        fn has_action(&self, name: &str) -> bool {
            matches!(name, "Check" | "Edit" | "Fail")
        }

        fn action(
            &self,
            name: &str,
            _token: &CancellationToken,
            _event: &Event,
            args: &[Value],
        ) -> Result<(), MachineError> {
            self.trace
                .lock()
                .push(format!("action:{}:{}({})", self.label, name, args.len()));
            if name == "Fail" {
                return Err(MachineError::handler("action rejected"));
            }
            Ok(())
        }
    }

    const DSL: &str = r#"<stateMachine name="flow" version="1">
    <states>
        <state id="Start" isStart="true">start</state>
        <state id="Task1">task one</state>
        <state id="End" isEnd="true">end</state>
    </states>
    <transitions>
        <transition sourceId="Start" targetId="Task1" condition="op==&quot;go&quot;">Start-&gt;Task1</transition>
        <transition sourceId="Task1" targetId="End" condition="op==&quot;end&quot;">Task1-&gt;End</transition>
        <transition sourceId="Task1" condition="op==&quot;touch&quot;" actions="Check,Edit">self</transition>
    </transitions>
</stateMachine>"#;

    fn build(trace: &Trace) -> StateMachine {
        let handlers: HashMap<String, Arc<dyn StateHandler>> = [
            ("Start".to_string(), Recording::new("start", trace)),
            ("Task1".to_string(), Recording::new("task1", trace)),
            ("End".to_string(), Recording::new("end", trace)),
        ]
        .into();
        StateMachine::new(Arc::new(Definition::from_dsl(DSL, handlers).unwrap()))
    }

    fn event(value: serde_json::Value) -> Event {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn test_happy_path() {
        let trace: Trace = Trace::default();
        let mut machine = build(&trace);
        let token = CancellationToken::new();

        machine
            .execute(&token, "Start", &event(json!({"op": "go"})), &[])
            .unwrap();
        assert_eq!(machine.current_state().unwrap().id, "Task1");

        machine
            .execute(&token, "Task1", &event(json!({"op": "end"})), &[])
            .unwrap();
        assert_eq!(machine.current_state().unwrap().id, "End");

        assert_eq!(
            trace.lock().clone(),
            vec!["exit:start", "entry:task1", "exit:task1", "entry:end"]
        );
    }

    #[test]
    fn test_action_only_transition_retains_state() {
        let trace: Trace = Trace::default();
        let mut machine = build(&trace);
        let token = CancellationToken::new();

        machine
            .execute(
                &token,
                "Task1",
                &event(json!({"op": "touch"})),
                &[json!(1), json!(2)],
            )
            .unwrap();
        assert_eq!(machine.current_state().unwrap().id, "Task1");
        // Check runs before Edit, each receiving the args; no exit/entry.
        assert_eq!(
            trace.lock().clone(),
            vec!["action:task1:Check(2)", "action:task1:Edit(2)"]
        );
    }

    #[test]
    fn test_unknown_source_state() {
        let trace: Trace = Trace::default();
        let mut machine = build(&trace);
        let err = machine
            .execute(
                &CancellationToken::new(),
                "Ghost",
                &event(json!({})),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, MachineError::StateNotFound { .. }));
    }

    #[test]
    fn test_all_transitions_unsatisfied() {
        let trace: Trace = Trace::default();
        let mut machine = build(&trace);
        let err = machine
            .execute(
                &CancellationToken::new(),
                "Start",
                &event(json!({"op": "sideways"})),
                &[],
            )
            .unwrap_err();
        match err {
            MachineError::AllTransitionsUnsatisfied { state } => assert_eq!(state, "Start"),
            other => panic!("expected unsatisfied error, got {other}"),
        }
        // The cursor stays on the source state.
        assert_eq!(machine.current_state().unwrap().id, "Start");
    }

    #[test]
    fn test_failing_action_aborts_execution() {
        let dsl = r#"<stateMachine name="f" version="1">
    <states>
        <state id="Start" isStart="true"/>
        <state id="End" isEnd="true"/>
    </states>
    <transitions>
        <transition sourceId="Start" targetId="End" actions="Fail"/>
    </transitions>
</stateMachine>"#;
        let trace: Trace = Trace::default();
        let handlers: HashMap<String, Arc<dyn StateHandler>> = [
            ("Start".to_string(), Recording::new("start", &trace)),
            ("End".to_string(), Recording::new("end", &trace)),
        ]
        .into();
        let mut machine = StateMachine::new(Arc::new(Definition::from_dsl(dsl, handlers).unwrap()));
        let err = machine
            .execute(&CancellationToken::new(), "Start", &event(json!({})), &[])
            .unwrap_err();
        assert!(matches!(err, MachineError::Handler(_)));
        // Exit and entry never ran.
        assert_eq!(trace.lock().clone(), vec!["action:start:Fail(0)"]);
        assert_eq!(machine.current_state().unwrap().id, "Start");
    }

    #[test]
    fn test_entry_skip_continues_transitioning() {
        let dsl = r#"<stateMachine name="f" version="1">
    <states>
        <state id="Start" isStart="true"/>
        <state id="Mid"/>
        <state id="End" isEnd="true"/>
    </states>
    <transitions>
        <transition sourceId="Start" targetId="Mid"/>
        <transition sourceId="Mid" targetId="End"/>
    </transitions>
</stateMachine>"#;
        let trace: Trace = Trace::default();
        let handlers: HashMap<String, Arc<dyn StateHandler>> = [
            ("Start".to_string(), Recording::new("start", &trace)),
            ("Mid".to_string(), Recording::skipping("mid", &trace)),
            ("End".to_string(), Recording::new("end", &trace)),
        ]
        .into();
        let mut machine = StateMachine::new(Arc::new(Definition::from_dsl(dsl, handlers).unwrap()));
        machine
            .execute(&CancellationToken::new(), "Start", &event(json!({})), &[])
            .unwrap();
        // Mid's entry asked to keep going, landing on End in one execute.
        assert_eq!(machine.current_state().unwrap().id, "End");
        assert_eq!(
            trace.lock().clone(),
            vec!["exit:start", "entry:mid", "exit:mid", "entry:end"]
        );
    }

    mod wired {
        use super::*;
        use weft_inject::{Graph, Provide};

        #[derive(Default)]
        struct ApprovalHandler {
            approvals: Mutex<Vec<String>>,
        }

        impl weft_inject::Inject for ApprovalHandler {}

        impl StateHandler for ApprovalHandler {
            fn has_action(&self, name: &str) -> bool {
                name == "Approve"
            }

            fn action(
                &self,
                _name: &str,
                _token: &CancellationToken,
                event: &Event,
                _args: &[Value],
            ) -> Result<(), MachineError> {
                let who = event
                    .get("user")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                self.approvals.lock().push(who.to_string());
                Ok(())
            }
        }

        #[test]
        fn test_handler_supplied_by_inject_graph() {
            let graph = Graph::new();
            graph
                .provide(
                    Provide::value(ApprovalHandler::default())
                        .with_port::<dyn StateHandler>(|v| v),
                )
                .unwrap();
            graph.init().unwrap();

            let handler: Arc<dyn StateHandler> = graph.obtain_port();
            let dsl = r#"<stateMachine name="approval" version="1">
    <states>
        <state id="Pending" isStart="true"/>
        <state id="Approved" isEnd="true"/>
    </states>
    <transitions>
        <transition sourceId="Pending" targetId="Approved" actions="Approve"/>
    </transitions>
</stateMachine>"#;
            let handlers: HashMap<String, Arc<dyn StateHandler>> = [
                ("Pending".to_string(), handler.clone()),
                ("Approved".to_string(), handler),
            ]
            .into();
            let mut machine =
                StateMachine::new(Arc::new(Definition::from_dsl(dsl, handlers).unwrap()));
            machine
                .execute(
                    &CancellationToken::new(),
                    "Pending",
                    &event(json!({"user": "alice"})),
                    &[],
                )
                .unwrap();

            assert_eq!(machine.current_state().unwrap().id, "Approved");
            let concrete: Arc<ApprovalHandler> = graph.obtain();
            assert_eq!(concrete.approvals.lock().clone(), vec!["alice"]);
        }
    }
}
