//! Recorded change notifications.
//!
//! Every `will_change`/`did_change` is appended to an ordered log, followed by
//! the same phase for each dependent key registered on the receiver's class
//! chain.

use super::LocalRuntime;
use crate::foreign::{IndexChange, ObjectId};
use crate::value::ObjectRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Will,
    Did,
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub object: ObjectId,
    pub key: String,
    pub phase: Phase,
    pub change: Option<IndexChange>,
}

impl LocalRuntime {
    pub(crate) fn record(&self, object: &ObjectRef, key: &str, phase: Phase, change: Option<&IndexChange>) {
        let mut keys = vec![key.to_string()];
        keys.extend(self.dependents_of(object, key));

        let mut log = self.log.lock();
        for key in keys {
            log.push(Notification {
                object: object.id(),
                key,
                phase,
                change: change.cloned(),
            });
        }
    }

    fn dependents_of(&self, object: &ObjectRef, key: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.object(object.id()).ok().and_then(|o| self.class(o.class));
        while let Some(class) = current {
            for (trigger, dependent) in class.dependents.read().iter() {
                if trigger == key && !out.contains(dependent) {
                    out.push(dependent.clone());
                }
            }
            current = class.parent.and_then(|p| self.class(p));
        }
        out
    }

    /// Every notification recorded so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    /// Drains the notification log.
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.log.lock())
    }
}
