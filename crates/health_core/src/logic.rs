//! Predicate trees over a crew member's situation.
//!
//! Quirk, condition and location effects are gated by a [`Logic`] tree. Each
//! leaf is optional; unset leaves are skipped. A node folds its leaves and
//! children with its operator, then XORs the result with `inverse`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{BodyId, ConditionId, CrewContext, Gender, RosterStatus, Situation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    fn identity(self) -> bool {
        matches!(self, Self::And)
    }

    fn apply(self, acc: bool, value: bool) -> bool {
        match self {
            Self::And => acc && value,
            Self::Or => acc || value,
        }
    }
}

/// What a crew member can see of a fellow crew member.
#[derive(Debug, Clone)]
pub struct CrewmateView {
    pub gender: Gender,
    pub trait_name: String,
    pub conditions: SmallVec<[ConditionId; 4]>,
}

/// Input to [`Logic::test`].
#[derive(Debug, Clone)]
pub struct LogicSubject<'a> {
    pub context: &'a CrewContext,
    /// Other crew in the same vessel. Empty when not in a vessel.
    pub crewmates: Vec<&'a CrewmateView>,
}

impl<'a> LogicSubject<'a> {
    pub fn alone(context: &'a CrewContext) -> Self {
        Self {
            context,
            crewmates: Vec::new(),
        }
    }

    /// A crewmate leaf is false, not skipped, when the subject has no vessel.
    fn any_crewmate(&self, predicate: impl Fn(&CrewmateView) -> bool) -> bool {
        self.context.in_vessel() && self.crewmates.iter().any(|m| predicate(m))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logic {
    pub operator: LogicOperator,
    pub inverse: bool,
    pub situation: Option<Situation>,
    pub body: Option<BodyId>,
    pub status: Option<RosterStatus>,
    pub min_mission_days: Option<f64>,
    pub gender: Option<Gender>,
    pub crewmate_gender: Option<Gender>,
    pub crewmate_trait: Option<String>,
    pub crewmate_condition: Option<ConditionId>,
    pub children: Vec<Logic>,
}

impl Logic {
    pub fn test(&self, subject: &LogicSubject<'_>) -> bool {
        let context = subject.context;
        let leaves = [
            self.situation.map(|s| context.situation == Some(s)),
            self.body.as_ref().map(|b| context.body.as_ref() == Some(b)),
            self.status.map(|s| context.status == s),
            self.min_mission_days.map(|d| context.mission_days >= d),
            self.gender.map(|g| context.gender == g),
            self.crewmate_gender
                .map(|g| subject.any_crewmate(|m| m.gender == g)),
            self.crewmate_trait
                .as_ref()
                .map(|t| subject.any_crewmate(|m| m.trait_name == *t)),
            self.crewmate_condition
                .as_ref()
                .map(|c| subject.any_crewmate(|m| m.conditions.contains(c))),
        ];
        let result = leaves
            .into_iter()
            .flatten()
            .chain(self.children.iter().map(|child| child.test(subject)))
            .fold(self.operator.identity(), |acc, value| {
                self.operator.apply(acc, value)
            });
        result ^ self.inverse
    }

    /// Human-readable explanation, two spaces per indent level and `- ` before
    /// each list item.
    pub fn describe(&self, indent: usize) -> String {
        format!("{}{}", pad(indent), self.describe_body(indent))
    }

    fn describe_body(&self, indent: usize) -> String {
        let leaves = self.leaf_descriptions();
        let items = leaves.len() + self.children.len();
        if items == 0 {
            return if self.inverse { "never" } else { "always" }.to_string();
        }
        if items == 1 && !self.inverse {
            if let Some(leaf) = leaves.first() {
                return leaf.clone();
            }
        }
        let mut out = self.header().to_string();
        for leaf in &leaves {
            out.push('\n');
            out.push_str(&pad(indent + 1));
            out.push_str("- ");
            out.push_str(leaf);
        }
        for child in &self.children {
            out.push('\n');
            out.push_str(&pad(indent + 1));
            out.push_str("- ");
            out.push_str(&child.describe_body(indent + 1));
        }
        out
    }

    fn header(&self) -> &'static str {
        match (self.operator, self.inverse) {
            (LogicOperator::And, false) => "all of the following:",
            (LogicOperator::Or, false) => "any of the following:",
            (LogicOperator::And, true) => "not all of the following:",
            (LogicOperator::Or, true) => "none of the following:",
        }
    }

    fn leaf_descriptions(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(situation) = self.situation {
            lines.push(format!("situation is {}", situation.label()));
        }
        if let Some(body) = &self.body {
            lines.push(format!("near {body}"));
        }
        if let Some(status) = self.status {
            lines.push(format!("roster status is {status:?}"));
        }
        if let Some(days) = self.min_mission_days {
            lines.push(format!("on a mission for at least {days} days"));
        }
        if let Some(gender) = self.gender {
            lines.push(format!("is {gender:?}"));
        }
        if let Some(gender) = self.crewmate_gender {
            lines.push(format!("has a {gender:?} crewmate"));
        }
        if let Some(trait_name) = &self.crewmate_trait {
            lines.push(format!("has a crewmate who is a {trait_name}"));
        }
        if let Some(condition) = &self.crewmate_condition {
            lines.push(format!("has a crewmate who is {condition}"));
        }
        lines
    }
}

fn pad(indent: usize) -> String {
    "  ".repeat(indent)
}
