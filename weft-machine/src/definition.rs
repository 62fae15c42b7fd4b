//! Validated machine definitions.

use crate::dsl;
use crate::error::MachineError;
use crate::expr::Expr;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The runtime event: a variable pool for guard expressions, also handed to
/// every hook and action.
pub type Event = Map<String, Value>;

/// Business logic bound to a state.
///
/// `entry` and `exit` run when the state is entered and left. Actions are
/// dispatched by name: `has_action` validates bindings at build time and
/// `action` invokes them at run time. An `entry` returning
/// [`MachineError::Skip`] makes the machine immediately transition again
/// from the entered state.
pub trait StateHandler: Send + Sync {
    fn entry(
        &self,
        _token: &CancellationToken,
        _event: &Event,
        _args: &[Value],
    ) -> Result<(), MachineError> {
        Ok(())
    }

    fn exit(
        &self,
        _token: &CancellationToken,
        _event: &Event,
        _args: &[Value],
    ) -> Result<(), MachineError> {
        Ok(())
    }

    fn has_action(&self, _name: &str) -> bool {
        false
    }

    fn action(
        &self,
        name: &str,
        _token: &CancellationToken,
        _event: &Event,
        _args: &[Value],
    ) -> Result<(), MachineError> {
        Err(MachineError::handler(format!("no action named `{name}`")))
    }
}

/// One guarded edge out of a state.
#[derive(Clone)]
pub struct Transition {
    pub source_id: String,
    /// Absent for action-only transitions that retain the current state.
    pub target_id: Option<String>,
    pub condition: String,
    pub actions: Vec<String>,
    guard: Option<Expr>,
}

impl Transition {
    /// Whether the guard is satisfied by `event`. An empty guard is always
    /// satisfied; a non-boolean result is an error.
    pub fn satisfied(&self, event: &Event) -> Result<bool, MachineError> {
        let Some(guard) = &self.guard else {
            return Ok(true);
        };
        let value = guard.eval(event).map_err(|source| MachineError::Condition {
            expression: self.condition.clone(),
            source,
        })?;
        match value {
            Value::Bool(result) => {
                tracing::debug!(condition = %self.condition, result, "checked condition");
                Ok(result)
            }
            _ => Err(MachineError::ResultNotBoolean),
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source_id", &self.source_id)
            .field("target_id", &self.target_id)
            .field("condition", &self.condition)
            .field("actions", &self.actions)
            .finish()
    }
}

/// A state and its outgoing transitions.
pub struct State {
    pub id: String,
    pub desc: String,
    pub is_start: bool,
    pub is_end: bool,
    handler: Arc<dyn StateHandler>,
    transitions: Vec<Transition>,
}

impl State {
    pub fn handler(&self) -> &Arc<dyn StateHandler> {
        &self.handler
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Picks the first transition whose guard is satisfied, in declaration
    /// order.
    pub(crate) fn transform(&self, event: &Event) -> Result<&Transition, MachineError> {
        for transition in &self.transitions {
            if transition.satisfied(event)? {
                return Ok(transition);
            }
        }
        Err(MachineError::AllTransitionsUnsatisfied {
            state: self.id.clone(),
        })
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .field("is_start", &self.is_start)
            .field("is_end", &self.is_end)
            .field("transitions", &self.transitions)
            .finish()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[State] id: {}, desc: {}, isStart: {}, isEnd: {}",
            self.id, self.desc, self.is_start, self.is_end
        )
    }
}

/// An immutable, validated machine definition.
#[derive(Debug)]
pub struct Definition {
    pub name: String,
    pub version: String,
    pub start_state_id: String,
    states: HashMap<String, State>,
    flattened: Vec<Transition>,
}

impl Definition {
    /// Builds a definition from the XML DSL and a handler per declared
    /// state.
    ///
    /// Build failures: a transition source that is not a declared state; a
    /// transition with neither a known target nor any actions; a declared
    /// state without a handler; an action name its source handler does not
    /// expose; an invalid guard expression.
    pub fn from_dsl(
        dsl_text: &str,
        handlers: HashMap<String, Arc<dyn StateHandler>>,
    ) -> Result<Self, MachineError> {
        let doc = dsl::parse_document(dsl_text)?;

        let mut states = HashMap::new();
        let mut start_state_id = String::new();
        for entry in &doc.states.entries {
            let handler = handlers
                .get(&entry.id)
                .cloned()
                .ok_or_else(|| MachineError::MissingHandler {
                    id: entry.id.clone(),
                })?;
            if entry.is_start {
                start_state_id = entry.id.clone();
            }
            states.insert(
                entry.id.clone(),
                State {
                    id: entry.id.clone(),
                    desc: entry.desc.trim().to_string(),
                    is_start: entry.is_start,
                    is_end: entry.is_end,
                    handler,
                    transitions: Vec::new(),
                },
            );
        }

        for entry in &doc.transitions.entries {
            if !states.contains_key(&entry.source_id) {
                return Err(MachineError::UnknownSource {
                    id: entry.source_id.clone(),
                });
            }

            let actions: Vec<String> = entry
                .actions
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();

            // A target pointing at an undeclared state counts as absent; the
            // transition must then carry actions.
            let target_id = entry
                .target_id
                .clone()
                .filter(|id| !id.is_empty() && states.contains_key(id));
            if actions.is_empty() && target_id.is_none() {
                return Err(MachineError::EmptyTarget {
                    source_id: entry.source_id.clone(),
                });
            }

            let handler = states[&entry.source_id].handler.clone();
            for action in &actions {
                if !handler.has_action(action) {
                    return Err(MachineError::UnboundAction {
                        state: entry.source_id.clone(),
                        action: action.clone(),
                    });
                }
            }

            let guard = if entry.condition.trim().is_empty() {
                None
            } else {
                Some(Expr::parse(&entry.condition).map_err(|source| {
                    MachineError::Condition {
                        expression: entry.condition.clone(),
                        source,
                    }
                })?)
            };

            let transition = Transition {
                source_id: entry.source_id.clone(),
                target_id,
                condition: entry.condition.clone(),
                actions,
                guard,
            };
            states
                .get_mut(&entry.source_id)
                .expect("source validated above")
                .transitions
                .push(transition);
        }

        let mut flattened = Vec::new();
        let mut visited = HashSet::new();
        flatten(&start_state_id, &states, &mut visited, &mut flattened);

        Ok(Self {
            name: doc.name,
            version: doc.version,
            start_state_id,
            states,
            flattened,
        })
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    /// All transitions reachable from the start state, in walk order.
    pub fn transitions(&self) -> &[Transition] {
        &self.flattened
    }

    /// Renders a human-readable state diagram.
    pub fn diagram(&self) -> String {
        let mut out = String::from("@startuml\n\n");
        for transition in &self.flattened {
            let target = transition
                .target_id
                .as_deref()
                .unwrap_or(&transition.source_id);
            let mut label = transition.condition.clone();
            if !transition.actions.is_empty() {
                label.push_str(",actions(");
                label.push_str(&transition.actions.join(","));
                label.push(')');
            }
            out.push_str(&format!(
                "{} --> {} : {}\n",
                transition.source_id, target, label
            ));
        }
        out.push_str("\n@enduml");
        out
    }
}

fn flatten(
    state_id: &str,
    states: &HashMap<String, State>,
    visited: &mut HashSet<String>,
    out: &mut Vec<Transition>,
) {
    if !visited.insert(state_id.to_string()) {
        return;
    }
    let Some(state) = states.get(state_id) else {
        return;
    };
    let mut targets = Vec::new();
    for transition in &state.transitions {
        out.push(transition.clone());
        if let Some(target) = &transition.target_id {
            targets.push(target.clone());
        }
    }
    for target in targets {
        flatten(&target, states, visited, out);
    }
}
