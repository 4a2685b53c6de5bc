//! Parsing of the solver's answer set into action and fluent timelines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ground action scheduled at a time step, e.g. `go_to(agent,n3)` at 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionEntry {
    pub name: String,
    pub step: u32,
}

impl ActionEntry {
    pub fn new(name: impl Into<String>, step: u32) -> Self {
        Self {
            name: name.into(),
            step,
        }
    }
}

impl fmt::Display for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.step)
    }
}

/// A fluent that holds at a time step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FluentEntry {
    pub fact: String,
    pub step: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed atom `{atom}`: {reason}")]
pub struct MalformedAtom {
    pub atom: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    actions: Vec<ActionEntry>,
    fluents: Vec<FluentEntry>,
    goal_steps: Vec<u32>,
    #[serde(skip)]
    malformed: Vec<MalformedAtom>,
}

impl AnswerSet {
    /// Parse raw solver output. Returns `None` when the output carries no
    /// model, i.e. no brace-delimited set or an empty one.
    pub fn parse(raw: &str) -> Option<Self> {
        let body = extract_model(raw)?;
        let mut answer = AnswerSet::default();
        for atom in split_top_level(body) {
            if let Err(err) = answer.push_atom(atom) {
                tracing::warn!(atom = %err.atom, reason = err.reason, "dropping malformed atom");
                answer.malformed.push(err);
            }
        }
        Some(answer)
    }

    fn push_atom(&mut self, atom: &str) -> Result<(), MalformedAtom> {
        if atom.starts_with('-') {
            return Ok(());
        }
        let Some((functor, args)) = split_call(atom) else {
            return Ok(());
        };
        let malformed = |reason| MalformedAtom {
            atom: atom.to_owned(),
            reason,
        };
        match functor {
            "occurs" => {
                let (name, step) = split_step(args).ok_or_else(|| malformed("missing step"))?;
                let step = step.parse().map_err(|_| malformed("step is not a number"))?;
                self.actions.push(ActionEntry::new(name, step));
            }
            "holds" => {
                let (fact, step) = split_step(args).ok_or_else(|| malformed("missing step"))?;
                let step = step.parse().map_err(|_| malformed("step is not a number"))?;
                self.fluents.push(FluentEntry {
                    fact: fact.to_owned(),
                    step,
                });
            }
            "goal" => {
                let step = split_step(args).map_or(args.trim(), |(_, step)| step);
                let step = step.parse().map_err(|_| malformed("step is not a number"))?;
                self.goal_steps.push(step);
            }
            _ => {}
        }
        Ok(())
    }

    /// Actions in execution order: ascending step, solver order on ties.
    pub fn action_stack(&self) -> Vec<ActionEntry> {
        let mut stack = self.actions.clone();
        stack.sort_by_key(|entry| entry.step);
        stack
    }

    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    pub fn fluents(&self) -> &[FluentEntry] {
        &self.fluents
    }

    /// The smallest step at which a goal is reported, if any.
    pub fn current_goal_step(&self) -> Option<u32> {
        self.goal_steps.iter().copied().min()
    }

    pub fn fluents_at(&self, step: u32) -> Vec<String> {
        self.fluents
            .iter()
            .filter(|fluent| fluent.step == step)
            .map(|fluent| fluent.fact.clone())
            .collect()
    }

    pub fn malformed(&self) -> &[MalformedAtom] {
        &self.malformed
    }
}

/// Interior of the first outermost `{...}` group, if it holds anything.
fn extract_model(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in raw[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let body = raw[start + 1..start + offset].trim();
                    return (!body.is_empty()).then_some(body);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on whitespace and commas that sit outside parentheses.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut atoms = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    for (i, c) in body.char_indices() {
        match c {
            '(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                start.get_or_insert(i);
            }
            c if depth == 0 && (c == ',' || c.is_whitespace()) => {
                if let Some(s) = start.take() {
                    atoms.push(&body[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        atoms.push(&body[s..]);
    }
    atoms
}

/// `name(args)` into `("name", "args")`.
///
/// Atoms are classified by this functor matched exactly, so `occurs_at(..)`
/// or `not_holds(..)` are ignored rather than read as actions or fluents.
fn split_call(atom: &str) -> Option<(&str, &str)> {
    let open = atom.find('(')?;
    let inner = atom[open + 1..].strip_suffix(')')?;
    Some((atom[..open].trim(), inner))
}

/// Split an argument list at its last top-level comma.
fn split_step(args: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut last = None;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => last = Some(i),
            _ => {}
        }
    }
    let i = last?;
    Some((args[..i].trim(), args[i + 1..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "SPARC V2.58\n\n\
{occurs(go_to(agent,n2),1), holds(currentlocation(agent,n1),0), \
occurs(seat(agent,c1,table1),0), goal(3), goal(2), \
holds(isattable(c1,table1),2), -holds(isattable(c1,table2),2), \
holds(currentlocation(agent,n2),2), step(4)}\n";

    #[test]
    fn test_no_model() {
        assert!(AnswerSet::parse("").is_none());
        assert!(AnswerSet::parse("SPARC V2.58\n\n").is_none());
        assert!(AnswerSet::parse("{}").is_none());
        assert!(AnswerSet::parse("{ \n }").is_none());
    }

    #[test]
    fn test_action_stack_orders_by_step() {
        let answer = AnswerSet::parse(OUTPUT).unwrap();
        assert_eq!(
            answer.action_stack(),
            vec![
                ActionEntry::new("seat(agent,c1,table1)", 0),
                ActionEntry::new("go_to(agent,n2)", 1),
            ]
        );
    }

    #[test]
    fn test_ties_keep_solver_order() {
        let answer =
            AnswerSet::parse("{occurs(b,1) occurs(a,0) occurs(c,1) occurs(d,0)}").unwrap();
        let names: Vec<_> = answer
            .action_stack()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_goal_step_and_fluents() {
        let answer = AnswerSet::parse(OUTPUT).unwrap();
        assert_eq!(answer.current_goal_step(), Some(2));
        assert_eq!(
            answer.fluents_at(2),
            vec![
                "isattable(c1,table1)".to_owned(),
                "currentlocation(agent,n2)".to_owned(),
            ]
        );
        assert!(answer.fluents_at(7).is_empty());
    }

    #[test]
    fn test_missing_goal_atom() {
        let answer = AnswerSet::parse("{occurs(pick(agent,c1),0)}").unwrap();
        assert_eq!(answer.current_goal_step(), None);
    }

    #[test]
    fn test_negated_atoms_are_ignored() {
        let answer = AnswerSet::parse("{-occurs(go_to(agent,n1),0), -holds(x,0)}").unwrap();
        assert!(answer.actions().is_empty());
        assert!(answer.fluents().is_empty());
    }

    #[test]
    fn test_malformed_step_is_dropped() {
        let answer =
            AnswerSet::parse("{occurs(go_to(agent,n1),x), occurs(pick(agent,c1),1), holds(y)}")
                .unwrap();
        assert_eq!(answer.action_stack(), vec![ActionEntry::new("pick(agent,c1)", 1)]);
        assert_eq!(answer.malformed().len(), 2);
        assert_eq!(answer.malformed()[0].atom, "occurs(go_to(agent,n1),x)");
    }

    #[test]
    fn test_functor_must_match_exactly() {
        let answer = AnswerSet::parse("{not_occurs(a,1) occurs_at(b,2) holdsx(c,0)}").unwrap();
        assert!(answer.actions().is_empty());
        assert!(answer.fluents().is_empty());
    }

    #[test]
    fn test_only_first_model_is_read() {
        let answer = AnswerSet::parse("{occurs(a,0)}\n{occurs(b,0)}").unwrap();
        assert_eq!(answer.action_stack(), vec![ActionEntry::new("a", 0)]);
    }

    #[test]
    fn test_json_omits_malformed_atoms() {
        let answer = AnswerSet::parse("{occurs(a,0), occurs(b,x), goal(1)}").unwrap();
        assert_eq!(answer.malformed().len(), 1);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "actions": [{"name": "a", "step": 0}],
                "fluents": [],
                "goal_steps": [1],
            })
        );
    }
}
