//! Admission control for model calls.
//!
//! A fixed number of requests may hold a slot at once. Others wait in FIFO
//! order for at most the enqueue timeout, then are turned away.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Vecta AI service at capacity. Try again later.")]
    AtCapacity,

    #[error("Admission gate closed")]
    Closed,
}

pub type GateResult<T> = Result<T, GateError>;

/// Bounded counting gate in front of the model.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    enqueue_timeout: Duration,
}

/// A held slot. The slot is released when this is dropped.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Capacity above [`Semaphore::MAX_PERMITS`] is clamped to it.
    pub fn new(capacity: usize, enqueue_timeout: Duration) -> Self {
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            enqueue_timeout,
        }
    }

    /// Wait for a free slot, up to the enqueue timeout.
    pub async fn admit(&self) -> GateResult<AdmissionPermit> {
        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        match tokio::time::timeout(self.enqueue_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(AdmissionPermit { _permit: permit }),
            Ok(Err(_)) => Err(GateError::Closed),
            Err(_) => Err(GateError::AtCapacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn enqueue_timeout(&self) -> Duration {
        self.enqueue_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admit_and_release() {
        let gate = AdmissionGate::new(2, Duration::from_millis(50));
        let first = gate.admit().await.unwrap();
        let _second = gate.admit().await.unwrap();
        assert_eq!(gate.in_flight(), 2);

        drop(first);
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_clamped() {
        let gate = AdmissionGate::new(usize::MAX, Duration::from_millis(20));
        assert_eq!(gate.capacity(), Semaphore::MAX_PERMITS);
        let _permit = gate.admit().await.unwrap();
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_rejects_when_full() {
        let gate = AdmissionGate::new(1, Duration::from_millis(20));
        let _held = gate.admit().await.unwrap();
        assert_eq!(gate.admit().await.unwrap_err(), GateError::AtCapacity);
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_waiter_admitted_when_slot_frees() {
        let gate = AdmissionGate::new(1, Duration::from_secs(1));
        let held = gate.admit().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.admit().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_slot_released_on_panic() {
        let gate = AdmissionGate::new(1, Duration::from_millis(50));
        let task_gate = gate.clone();
        let result = tokio::spawn(async move {
            let _permit = task_gate.admit().await.unwrap();
            panic!("model call blew up");
        })
        .await;

        assert!(result.is_err());
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.admit().await.is_ok());
    }
}
