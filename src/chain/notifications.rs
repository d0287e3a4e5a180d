// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::Share;
use crate::primitives::{AccountName, Hash256, Operation};
use log::*;
use std::fmt;

/// Error a subscriber reports instead of panicking across the
/// notification boundary. It is logged and deactivates the subscription;
/// it never aborts block application.
#[derive(Debug, Clone)]
pub struct NotifyErr(pub String);

impl fmt::Display for NotifyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type SubscriptionId = u64;

type Subscriber<T> = Box<dyn FnMut(&T) -> Result<(), NotifyErr> + Send + Sync>;

/// Ordered list of subscribers invoked synchronously from the writer
/// thread, in registration order.
pub struct Signal<T> {
    name: &'static str,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: SubscriptionId,
}

impl<T> Signal<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn connect(
        &mut self,
        subscriber: impl FnMut(&T) -> Result<(), NotifyErr> + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn disconnect(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Deliver to every subscriber. A failing subscriber is logged and
    /// dropped from the list; delivery to the rest continues.
    pub fn emit(&mut self, value: &T) {
        let name = self.name;
        self.subscribers.retain_mut(|(id, subscriber)| {
            match subscriber(value) {
                Ok(()) => true,
                Err(err) => {
                    warn!("{name} subscriber {id} failed and was deactivated: {err}");
                    false
                }
            }
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Context delivered with pre/post operation notifications.
#[derive(Clone, Debug)]
pub struct OperationNotification {
    pub trx_id: Hash256,
    pub block: u64,
    pub trx_in_block: u32,
    pub op_in_trx: u32,
    pub virtual_op: u32,
    pub op: Operation,
    pub fee_payer: AccountName,
}

/// Payload of the applied_block signal: the block itself plus
/// producer-side details.
#[derive(Clone, Debug)]
pub struct BlockNotification {
    pub block: crate::primitives::SignedBlock,
    pub block_id: Hash256,
    pub producer_reward: Share,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emits_in_registration_order() {
        let order = Arc::new(parking_lot::Mutex::new(vec![]));
        let mut signal: Signal<u32> = Signal::new("test");

        for tag in [1, 2, 3] {
            let order = order.clone();
            signal.connect(move |_| {
                order.lock().push(tag);
                Ok(())
            });
        }

        signal.emit(&0);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn failing_subscriber_is_deactivated_not_propagated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut signal: Signal<u32> = Signal::new("test");

        signal.connect(|_| Err(NotifyErr("broken".into())));
        let counter = calls.clone();
        signal.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        signal.emit(&0);
        signal.emit(&0);

        assert_eq!(signal.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disconnect_removes_subscriber() {
        let mut signal: Signal<u32> = Signal::new("test");
        let id = signal.connect(|_| Ok(()));
        signal.connect(|_| Ok(()));
        signal.disconnect(id);
        assert_eq!(signal.len(), 1);
    }
}
