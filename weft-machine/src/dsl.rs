//! XML document model for machine definitions.
//!
//! ```xml
//! <stateMachine name="order" version="1">
//!   <states>
//!     <state id="Start" isStart="true">start</state>
//!     <state id="End" isEnd="true">end</state>
//!   </states>
//!   <transitions>
//!     <transition sourceId="Start" targetId="End" condition="op == &quot;end&quot;"
//!                 actions="Audit">Start-&gt;End</transition>
//!   </transitions>
//! </stateMachine>
//! ```

use crate::error::MachineError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename = "stateMachine")]
pub struct MachineDoc {
    #[serde(rename = "@name", default)]
    pub name: String,

    #[serde(rename = "@version", default)]
    pub version: String,

    pub states: StatesDoc,

    #[serde(default)]
    pub transitions: TransitionsDoc,
}

#[derive(Debug, Deserialize)]
pub struct StatesDoc {
    #[serde(rename = "state", default)]
    pub entries: Vec<StateDoc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransitionsDoc {
    #[serde(rename = "transition", default)]
    pub entries: Vec<TransitionDoc>,
}

#[derive(Debug, Deserialize)]
pub struct StateDoc {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@isStart", default)]
    pub is_start: bool,

    #[serde(rename = "@isEnd", default)]
    pub is_end: bool,

    /// Free-form description.
    #[serde(rename = "$text", default)]
    pub desc: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionDoc {
    #[serde(rename = "@sourceId")]
    pub source_id: String,

    #[serde(rename = "@targetId", default)]
    pub target_id: Option<String>,

    /// Guard expression; empty means always satisfied.
    #[serde(rename = "@condition", default)]
    pub condition: String,

    /// Comma-separated action method names.
    #[serde(rename = "@actions", default)]
    pub actions: String,

    #[serde(rename = "$text", default)]
    pub label: String,
}

/// Parses the XML document.
pub fn parse_document(dsl: &str) -> Result<MachineDoc, MachineError> {
    Ok(quick_xml::de::from_str(dsl)?)
}
