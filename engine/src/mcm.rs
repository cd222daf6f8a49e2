//! Multi-component module composition.
//!
//! Wraps N components (typically a main and a peripheral clock domain) as
//! one [`Component`], so the orchestrator can treat a composed multi-domain
//! suspend path exactly like a single block, recursively.
//!
//! Forwarding rules mirror the orchestrator's own:
//! - `begin`/`pre_enter` run children in registration order; a failure at
//!   child k rolls back children `0..k` with `end`, in reverse order, then
//!   propagates the error unchanged.
//! - `post_enter`/`end` run children in reverse order.
//! - Tables are contributed per child, enter tables in child order and
//!   exit tables reversed, so composition never merges or reorders words
//!   inside a child's table.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::component::{Component, ComponentError, PowerState, WakeSources};

/// A composed component.
pub struct Mcm {
    name: &'static str,
    children: Vec<Box<dyn Component>>,
}

impl Mcm {
    pub fn new(name: &'static str, children: Vec<Box<dyn Component>>) -> Self {
        Self { name, children }
    }

    pub fn children(&self) -> &[Box<dyn Component>] {
        &self.children
    }

    fn forward_fallible(
        &mut self,
        state: PowerState,
        mut op: impl FnMut(&mut dyn Component) -> Result<(), ComponentError>,
    ) -> Result<(), ComponentError> {
        for k in 0..self.children.len() {
            if let Err(e) = op(self.children[k].as_mut()) {
                for rolled in self.children[..k].iter_mut().rev() {
                    rolled.end(state);
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Component for Mcm {
    fn name(&self) -> &'static str {
        self.name
    }

    fn begin(&mut self, state: PowerState, wake: &WakeSources) -> Result<(), ComponentError> {
        self.forward_fallible(state, |c| c.begin(state, wake))
    }

    fn pre_enter(&mut self, state: PowerState) -> Result<(), ComponentError> {
        self.forward_fallible(state, |c| c.pre_enter(state))
    }

    fn post_enter(&mut self, state: PowerState) {
        for c in self.children.iter_mut().rev() {
            c.post_enter(state);
        }
    }

    fn end(&mut self, state: PowerState) {
        for c in self.children.iter_mut().rev() {
            c.end(state);
        }
    }

    fn visit_enter_tables(&self, visit: &mut dyn FnMut(&[u32])) {
        for c in &self.children {
            c.visit_enter_tables(visit);
        }
    }

    fn visit_exit_tables(&self, visit: &mut dyn FnMut(&[u32])) {
        for c in self.children.iter().rev() {
            c.visit_exit_tables(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type CallLog = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: &'static str,
        log: CallLog,
        fail_begin: bool,
        enter: Vec<u32>,
        exit: Vec<u32>,
    }

    impl Probe {
        fn new(name: &'static str, log: &CallLog) -> Self {
            Self {
                name,
                log: log.clone(),
                fail_begin: false,
                enter: vec![],
                exit: vec![],
            }
        }

        fn record(&self, op: &str) {
            self.log.borrow_mut().push(format!("{}.{}", self.name, op));
        }
    }

    impl Component for Probe {
        fn name(&self) -> &'static str {
            self.name
        }
        fn begin(&mut self, _: PowerState, _: &WakeSources) -> Result<(), ComponentError> {
            self.record("begin");
            if self.fail_begin {
                return Err(ComponentError("begin refused"));
            }
            Ok(())
        }
        fn pre_enter(&mut self, _: PowerState) -> Result<(), ComponentError> {
            self.record("pre_enter");
            Ok(())
        }
        fn post_enter(&mut self, _: PowerState) {
            self.record("post_enter");
        }
        fn end(&mut self, _: PowerState) {
            self.record("end");
        }
        fn enter_table(&self) -> &[u32] {
            &self.enter
        }
        fn exit_table(&self) -> &[u32] {
            &self.exit
        }
    }

    fn pair(log: &CallLog) -> Mcm {
        Mcm::new(
            "pair",
            vec![
                Box::new(Probe::new("main", log)),
                Box::new(Probe::new("peripheral", log)),
            ],
        )
    }

    #[test]
    fn test_entry_and_exit_ordering() {
        let log: CallLog = Rc::new(RefCell::new(vec![]));
        let mut mcm = pair(&log);
        let st = PowerState::MemRetained;

        mcm.begin(st, &WakeSources::NONE).unwrap();
        mcm.pre_enter(st).unwrap();
        mcm.post_enter(st);
        mcm.end(st);

        assert_eq!(
            *log.borrow(),
            vec![
                "main.begin",
                "peripheral.begin",
                "main.pre_enter",
                "peripheral.pre_enter",
                "peripheral.post_enter",
                "main.post_enter",
                "peripheral.end",
                "main.end",
            ]
        );
    }

    #[test]
    fn test_begin_failure_rolls_back_earlier_children() {
        let log: CallLog = Rc::new(RefCell::new(vec![]));
        let mut bad = Probe::new("peripheral", &log);
        bad.fail_begin = true;
        let mut mcm = Mcm::new(
            "pair",
            vec![Box::new(Probe::new("main", &log)), Box::new(bad)],
        );

        let err = mcm
            .begin(PowerState::MemRetained, &WakeSources::NONE)
            .unwrap_err();
        assert_eq!(err, ComponentError("begin refused"));
        assert_eq!(
            *log.borrow(),
            vec!["main.begin", "peripheral.begin", "main.end"]
        );
    }

    #[test]
    fn test_table_visit_order() {
        let log: CallLog = Rc::new(RefCell::new(vec![]));
        let mut a = Probe::new("a", &log);
        a.enter = vec![0x1];
        a.exit = vec![0x10];
        let mut b = Probe::new("b", &log);
        b.enter = vec![0x2];
        b.exit = vec![0x20];
        let mcm = Mcm::new("pair", vec![Box::new(a), Box::new(b)]);

        let mut enter = vec![];
        mcm.visit_enter_tables(&mut |t| enter.extend_from_slice(t));
        assert_eq!(enter, vec![0x1, 0x2]);

        let mut exit = vec![];
        mcm.visit_exit_tables(&mut |t| exit.extend_from_slice(t));
        assert_eq!(exit, vec![0x20, 0x10]);
    }

    #[test]
    fn test_nested_composition() {
        let log: CallLog = Rc::new(RefCell::new(vec![]));
        let inner = Mcm::new(
            "inner",
            vec![
                Box::new(Probe::new("i0", &log)),
                Box::new(Probe::new("i1", &log)),
            ],
        );
        let mut outer = Mcm::new(
            "outer",
            vec![Box::new(Probe::new("o0", &log)), Box::new(inner)],
        );

        outer.begin(PowerState::Standby, &WakeSources::NONE).unwrap();
        outer.end(PowerState::Standby);

        assert_eq!(
            *log.borrow(),
            vec!["o0.begin", "i0.begin", "i1.begin", "i1.end", "i0.end", "o0.end"]
        );
    }
}
