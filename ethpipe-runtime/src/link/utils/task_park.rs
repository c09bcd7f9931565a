//! # What is it for?
//!
//! A single slot shared by the two ends of a cross-context FIFO, where whichever end cannot make
//! progress leaves its waker before returning `Poll::Pending`. The writer parks when the FIFO is
//! full, the reader parks when it is empty. Whoever next changes the FIFO's fill level wakes the
//! parked end. Once an end is dropped the slot is marked dead, and a task trying to park on a dead
//! slot wakes itself instead of sleeping forever.

use crossbeam::atomic::AtomicCell;
use futures::task;
use std::sync::Arc;

/// The state machine of a task park.
///
/// # Dead: one end has been dropped, so nothing will ever wake a parked task. A task trying to
/// park must wake itself and poll again.
///
/// # Empty: no task is waiting.
///
/// # Parked: a task is waiting to be woken once the other end makes progress.
pub enum TaskParkState {
    Dead,
    Empty,
    Parked(task::Waker),
}

/// Swaps in `swap`, waking whatever task was parked before. Returns `false` when the park is
/// dead, in which case it stays dead.
fn swap_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>, swap: TaskParkState) -> bool {
    match task_park.swap(swap) {
        TaskParkState::Dead => {
            task_park.store(TaskParkState::Dead);
            false
        }
        TaskParkState::Empty => true,
        TaskParkState::Parked(task) => {
            task.wake();
            true
        }
    }
}

/// Wakes the parked task, if any, without parking the caller.
pub fn unpark_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>) {
    swap_and_wake(task_park, TaskParkState::Empty);
}

/// Wakes the parked task, if any, and parks the caller in its place. On a dead park the caller is
/// woken straight away.
pub fn park_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>, task: task::Waker) {
    if !swap_and_wake(task_park, TaskParkState::Parked(task.clone())) {
        task.wake();
    }
}

/// Wakes the parked task, if any, and marks the park dead. Called by an end that is going away.
pub fn die_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>) {
    swap_and_wake(task_park, TaskParkState::Dead);
}
