use serde::{Deserialize, Serialize};
use std::fmt;

/// A robot command decoded from a plan action's ground term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotAction {
    GoTo {
        actor: String,
        target: String,
    },
    Seat {
        actor: String,
        client: String,
        table: String,
    },
    Pick {
        actor: String,
        client: String,
    },
    GiveBill {
        actor: String,
        target: String,
    },
    /// Anything the robot does not know how to execute.
    Unknown {
        functor: String,
        args: Vec<String>,
    },
}

impl RobotAction {
    pub fn decode(term: &str) -> Self {
        let term = term.trim();
        let (functor, args) = match term.find('(') {
            Some(open) => {
                let inner = term[open + 1..].strip_suffix(')').unwrap_or(&term[open + 1..]);
                (term[..open].trim(), split_args(inner))
            }
            None => (term, Vec::new()),
        };
        match (functor, args.as_slice()) {
            ("go_to", [actor, target]) => RobotAction::GoTo {
                actor: actor.clone(),
                target: target.clone(),
            },
            ("seat", [actor, client, table]) => RobotAction::Seat {
                actor: actor.clone(),
                client: client.clone(),
                table: table.clone(),
            },
            ("pick", [actor, client]) => RobotAction::Pick {
                actor: actor.clone(),
                client: client.clone(),
            },
            ("give_bill", [actor, target]) => RobotAction::GiveBill {
                actor: actor.clone(),
                target: target.clone(),
            },
            _ => RobotAction::Unknown {
                functor: functor.to_owned(),
                args,
            },
        }
    }
}

impl fmt::Display for RobotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotAction::GoTo { target, .. } => write!(f, "move to {target}"),
            RobotAction::Seat { client, table, .. } => {
                write!(f, "seat client {client} at {table}")
            }
            RobotAction::Pick { client, .. } => write!(f, "pick up client {client}"),
            RobotAction::GiveBill { target, .. } => write!(f, "give the bill to {target}"),
            RobotAction::Unknown { functor, args } => {
                write!(f, "unknown action {functor}({})", args.join(","))
            }
        }
    }
}

fn split_args(inner: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..i].trim().to_owned());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = inner[start..].trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_owned());
    }
    args
}
