//! Ordered before/around/after hook execution for lifecycle events.
//!
//! Hooks are registered once at model-registration time and run in
//! registration order. A `before` hook returning `Ok(false)` vetoes the
//! operation; an `around` hook receives the continuation explicitly and the
//! wrapped body only runs if every `around` hook calls it; `after` hooks run
//! only once the body completed.

use crate::core::Result;
use crate::model::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The host persistence layer's destroy event, reused for soft delete.
    Destroy,
    Restore,
    RealDestroy,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Destroy => "destroy",
            Self::Restore => "restore",
            Self::RealDestroy => "real_destroy",
        }
    }
}

/// The operation body an `around` hook wraps.
pub type Body<'a> = &'a mut dyn FnMut(&mut Record) -> Result<bool>;

pub type BeforeHook = Box<dyn Fn(&mut Record) -> Result<bool> + Send + Sync>;
pub type AroundHook = Box<dyn Fn(&mut Record, Body<'_>) -> Result<bool> + Send + Sync>;
pub type AfterHook = Box<dyn Fn(&mut Record) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct CallbackChain {
    before: Vec<BeforeHook>,
    around: Vec<AroundHook>,
    after: Vec<AfterHook>,
}

impl CallbackChain {
    pub fn push_before(&mut self, hook: BeforeHook) {
        self.before.push(hook);
    }

    pub fn push_around(&mut self, hook: AroundHook) {
        self.around.push(hook);
    }

    pub fn push_after(&mut self, hook: AfterHook) {
        self.after.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.around.is_empty() && self.after.is_empty()
    }

    /// Runs the chain around `body`. `Ok(false)` means the operation was
    /// halted: a `before` veto, an `around` hook that never continued, or an
    /// incomplete body.
    pub fn run(&self, record: &mut Record, body: Body<'_>) -> Result<bool> {
        for hook in &self.before {
            if !hook(record)? {
                return Ok(false);
            }
        }

        let mut body_ran = false;
        let completed = {
            let mut tracked = |record: &mut Record| -> Result<bool> {
                body_ran = true;
                body(record)
            };
            run_around(&self.around, record, &mut tracked)?
        };
        if !body_ran || !completed {
            return Ok(false);
        }

        for hook in &self.after {
            hook(record)?;
        }
        Ok(true)
    }
}

fn run_around(hooks: &[AroundHook], record: &mut Record, body: Body<'_>) -> Result<bool> {
    match hooks.split_first() {
        None => body(record),
        Some((hook, rest)) => hook(record, &mut |record| run_around(rest, record, &mut *body)),
    }
}

/// Hook chains for every lifecycle event of one model.
#[derive(Default)]
pub struct CallbackSet {
    destroy: CallbackChain,
    restore: CallbackChain,
    real_destroy: CallbackChain,
}

impl CallbackSet {
    pub fn chain(&self, event: LifecycleEvent) -> &CallbackChain {
        match event {
            LifecycleEvent::Destroy => &self.destroy,
            LifecycleEvent::Restore => &self.restore,
            LifecycleEvent::RealDestroy => &self.real_destroy,
        }
    }

    pub fn chain_mut(&mut self, event: LifecycleEvent) -> &mut CallbackChain {
        match event {
            LifecycleEvent::Destroy => &mut self.destroy,
            LifecycleEvent::Restore => &mut self.restore,
            LifecycleEvent::RealDestroy => &mut self.real_destroy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::core::{Column, DataType, Value};
    use crate::model::descriptor::ModelDescriptor;

    fn record() -> Record {
        let model = ModelDescriptor::new("note", "notes")
            .column(Column::new("title", DataType::Text))
            .lifecycle("deleted_at");
        Record::new(&model)
    }

    #[test]
    fn test_hooks_run_in_order_around_body() {
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CallbackChain::default();

        let t = trace.clone();
        chain.push_before(Box::new(move |_| {
            t.lock().unwrap().push("before");
            Ok(true)
        }));
        let t = trace.clone();
        chain.push_around(Box::new(move |record, body| {
            t.lock().unwrap().push("around:enter");
            let result = body(record);
            t.lock().unwrap().push("around:exit");
            result
        }));
        let t = trace.clone();
        chain.push_after(Box::new(move |_| {
            t.lock().unwrap().push("after");
            Ok(())
        }));

        let t = trace.clone();
        let completed = chain
            .run(&mut record(), &mut |_| {
                t.lock().unwrap().push("body");
                Ok(true)
            })
            .unwrap();

        assert!(completed);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["before", "around:enter", "body", "around:exit", "after"]
        );
    }

    #[test]
    fn test_before_veto_skips_body_and_after() {
        let mut chain = CallbackChain::default();
        chain.push_before(Box::new(|_| Ok(false)));
        chain.push_after(Box::new(|_| panic!("after hook must not run")));

        let mut ran = false;
        let completed = chain
            .run(&mut record(), &mut |_| {
                ran = true;
                Ok(true)
            })
            .unwrap();

        assert!(!completed);
        assert!(!ran);
    }

    #[test]
    fn test_around_must_continue_for_the_body_to_run() {
        let mut chain = CallbackChain::default();
        chain.push_around(Box::new(|_, _| Ok(true)));

        let mut ran = false;
        let completed = chain
            .run(&mut record(), &mut |_| {
                ran = true;
                Ok(true)
            })
            .unwrap();

        assert!(!completed);
        assert!(!ran);
    }

    #[test]
    fn test_around_hooks_nest_in_registration_order() {
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CallbackChain::default();

        let t = trace.clone();
        chain.push_around(Box::new(move |record, body| {
            t.lock().unwrap().push("outer:enter");
            let result = body(record);
            t.lock().unwrap().push("outer:exit");
            result
        }));
        let t = trace.clone();
        chain.push_around(Box::new(move |record, body| {
            t.lock().unwrap().push("inner:enter");
            let result = body(record);
            t.lock().unwrap().push("inner:exit");
            result
        }));

        chain.run(&mut record(), &mut |_| Ok(true)).unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["outer:enter", "inner:enter", "inner:exit", "outer:exit"]
        );
    }

    #[test]
    fn test_hook_can_mutate_the_record() {
        let mut chain = CallbackChain::default();
        chain.push_after(Box::new(|record| {
            record.set_attribute("title", Value::Text("touched".into()));
            Ok(())
        }));

        let mut record = record();
        chain.run(&mut record, &mut |_| Ok(true)).unwrap();
        assert_eq!(record.attribute("title"), Some(&Value::Text("touched".into())));
    }
}
