use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::Value;

/// One observed query of an [`EnumeratedValueAnimation`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEvent {
    /// Counter value before the query incremented it.
    pub ordinal: u64,
    pub value: Value,
}

/// Animation that walks a fixed list of candidate values, one per query.
///
/// The value does not depend on time: every call to [`query`] advances an
/// internal counter and returns `candidates[counter % len]`. Each query is
/// delivered exactly once, in order, to every live subscriber.
///
/// [`query`]: EnumeratedValueAnimation::query
#[derive(Debug, Default)]
pub struct EnumeratedValueAnimation {
    candidates: Vec<Value>,
    counter: u64,
    subscribers: Vec<Sender<QueryEvent>>,
}

impl EnumeratedValueAnimation {
    pub fn new(candidates: Vec<Value>) -> Self {
        Self {
            candidates,
            counter: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn candidates(&self) -> &[Value] {
        &self.candidates
    }

    /// Number of queries answered so far.
    pub fn query_count(&self) -> u64 {
        self.counter
    }

    /// Registers a new listener. Dropping the returned receiver detaches it.
    pub fn subscribe(&mut self) -> QueryReceiver {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        QueryReceiver { inner: receiver }
    }

    /// Produces the current value and announces the query to subscribers.
    ///
    /// Never fails; an empty candidate list yields [`Value::Unit`] and still
    /// consumes an ordinal.
    pub fn query(&mut self) -> Value {
        let ordinal = self.counter;
        self.counter += 1;

        let value = if self.candidates.is_empty() {
            Value::default()
        } else {
            let len = self.candidates.len() as u64;
            #[allow(clippy::cast_possible_truncation)]
            let index = (ordinal % len) as usize;
            self.candidates[index].clone()
        };

        let event = QueryEvent {
            ordinal,
            value: value.clone(),
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());

        value
    }
}

/// Receiving end of an [`EnumeratedValueAnimation`] subscription.
#[derive(Debug)]
pub struct QueryReceiver {
    inner: Receiver<QueryEvent>,
}

impl QueryReceiver {
    /// Returns the next pending event, if any, without blocking.
    pub fn try_next(&self) -> Option<QueryEvent> {
        match self.inner.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drains every pending event in delivery order.
    pub fn drain(&self) -> Vec<QueryEvent> {
        self.inner.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_dense_and_strictly_increasing() {
        for len in [0_usize, 1, 2, 5] {
            let candidates = (0..len).map(|i| Value::Int(i as i64)).collect();
            let mut animation = EnumeratedValueAnimation::new(candidates);
            let receiver = animation.subscribe();

            for _ in 0..17 {
                animation.query();
            }

            let ordinals: Vec<u64> = receiver.drain().into_iter().map(|e| e.ordinal).collect();
            assert_eq!(ordinals, (0..17).collect::<Vec<_>>(), "candidate length {len}");
            assert_eq!(animation.query_count(), 17);
        }
    }

    #[test]
    fn kth_query_returns_candidate_k_mod_len() {
        let candidates: Vec<Value> = (10..13).map(Value::Int).collect();
        let mut animation = EnumeratedValueAnimation::new(candidates.clone());

        for k in 0..10 {
            assert_eq!(animation.query(), candidates[k % candidates.len()]);
        }
    }

    #[test]
    fn boolean_candidates_alternate() {
        let mut animation =
            EnumeratedValueAnimation::new(vec![Value::Bool(true), Value::Bool(false)]);
        let receiver = animation.subscribe();

        let returned: Vec<Value> = (0..5).map(|_| animation.query()).collect();
        assert_eq!(
            returned,
            vec![
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true),
            ]
        );

        let events = receiver.drain();
        assert_eq!(events.len(), 5);
        for (expected, event) in events.iter().enumerate() {
            assert_eq!(event.ordinal, expected as u64);
            assert_eq!(event.value, returned[expected]);
        }
    }

    #[test]
    fn empty_candidates_yield_unit() {
        let mut animation = EnumeratedValueAnimation::new(Vec::new());
        assert_eq!(animation.query(), Value::Unit);
        assert_eq!(animation.query_count(), 1);
    }

    #[test]
    fn dropped_receivers_are_detached() {
        let mut animation = EnumeratedValueAnimation::new(vec![Value::Int(1)]);
        let first = animation.subscribe();
        let second = animation.subscribe();
        drop(first);

        animation.query();
        animation.query();

        assert_eq!(animation.subscribers.len(), 1);
        assert_eq!(second.drain().len(), 2);
        assert!(second.try_next().is_none());
    }
}
