//! Case lesson context delivered once at session init.
//!
//! The lesson is read-only for the orchestrator core; it exists so the
//! downstream response generator can ground the interviewer in the case
//! material.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One step of the interviewer's case guide, keyed by step id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideStep {
    pub title: String,
    pub content: String,
}

/// Static material for one mock case interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlan {
    pub lesson: String,
    pub introduction: String,
    /// Questions in the order the interviewer should raise them.
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub guide_steps: HashMap<String, GuideStep>,
    pub conclusion: String,
    pub persona: String,
}
