//! Linear state machine for wizards that can step back to a previous stage.
use std::fmt;

use crate::errors::{Error, Result};

/// Direction a stage handler chooses after it finishes.
/// A handler error is the third outcome and stops the machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Walks an immutable, ordered list of distinct stages.
/// The index is always within the stage list or exactly one past its end.
#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    stages: Vec<S>,
    index: usize,
}

impl<S> StateMachine<S>
where
    S: Clone + PartialEq + fmt::Display,
{
    pub fn new(stages: Vec<S>) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::EmptyStages);
        }
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].contains(stage) {
                return Err(Error::DuplicateStage {
                    name: stage.to_string(),
                });
            }
        }
        Ok(Self { stages, index: 0 })
    }

    /// Returns the current stage, or None once the machine finished.
    pub fn current_state(&self) -> Option<&S> {
        self.stages.get(self.index)
    }

    pub fn running(&self) -> bool {
        self.index < self.stages.len()
    }

    pub fn next_state(&mut self, direction: Direction) -> Result<()> {
        match direction {
            Direction::Forward => {
                if self.running() {
                    self.index += 1;
                }
                Ok(())
            }
            Direction::Backward => {
                if self.index == 0 {
                    return Err(Error::InvalidBacktrack);
                }
                self.index -= 1;
                Ok(())
            }
        }
    }

    /// Drives the handler over every stage until the machine finishes.
    /// The first handler error aborts the run and is returned as is.
    pub fn run<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&S) -> Result<Direction>,
    {
        while let Some(stage) = self.current_state().cloned() {
            log::debug!("entering stage '{}'", stage);
            let direction = handler(&stage)?;
            self.next_state(direction)?;
        }
        Ok(())
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- statemachine::test_forward_to_end --exact --show-output
#[test]
fn test_forward_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();

    for n in 1..6 {
        let stages: Vec<String> = (0..n).map(|i| format!("stage-{i}")).collect();
        let mut sm = StateMachine::new(stages.clone()).unwrap();
        for (i, stage) in stages.iter().enumerate() {
            assert!(sm.running(), "stopped early at {i}");
            assert_eq!(sm.current_state(), Some(stage));
            sm.next_state(Direction::Forward).unwrap();
        }
        assert!(!sm.running());
        assert_eq!(sm.current_state(), None);

        // forward past the end keeps the terminal marker
        sm.next_state(Direction::Forward).unwrap();
        assert!(!sm.running());
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- statemachine::test_backtrack --exact --show-output
#[test]
fn test_backtrack() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut sm = StateMachine::new(vec!["a", "b", "c"]).unwrap();
    assert!(matches!(
        sm.next_state(Direction::Backward),
        Err(Error::InvalidBacktrack)
    ));
    assert_eq!(sm.current_state(), Some(&"a"));

    sm.next_state(Direction::Forward).unwrap();
    sm.next_state(Direction::Forward).unwrap();
    assert_eq!(sm.current_state(), Some(&"c"));
    sm.next_state(Direction::Backward).unwrap();
    assert_eq!(sm.current_state(), Some(&"b"));
    sm.next_state(Direction::Backward).unwrap();
    assert_eq!(sm.current_state(), Some(&"a"));
    assert!(sm.next_state(Direction::Backward).is_err());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- statemachine::test_new_rejects --exact --show-output
#[test]
fn test_new_rejects() {
    assert!(matches!(
        StateMachine::new(vec!["fee", "airdrop", "fee"]),
        Err(Error::DuplicateStage { name }) if name == "fee"
    ));
    assert!(matches!(
        StateMachine::<&str>::new(vec![]),
        Err(Error::EmptyStages)
    ));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- statemachine::test_run --exact --show-output
#[test]
fn test_run() {
    let _ = env_logger::builder().is_test(true).try_init();

    // goes back once from "c", then finishes
    let mut visited = Vec::new();
    let mut went_back = false;
    let mut sm = StateMachine::new(vec!["a", "b", "c"]).unwrap();
    sm.run(|stage| {
        visited.push(*stage);
        if *stage == "c" && !went_back {
            went_back = true;
            return Ok(Direction::Backward);
        }
        Ok(Direction::Forward)
    })
    .unwrap();
    assert_eq!(visited, vec!["a", "b", "c", "b", "c"]);

    let mut calls = 0;
    let mut sm = StateMachine::new(vec!["a", "b", "c"]).unwrap();
    let res = sm.run(|stage| {
        calls += 1;
        if *stage == "b" {
            return Err(Error::other("cancelled"));
        }
        Ok(Direction::Forward)
    });
    assert!(matches!(res, Err(Error::Other { message }) if message == "cancelled"));
    assert_eq!(calls, 2);
}
