/// Task Park is where the two sides of a cross-context link leave their wakers when one of them
/// has to wait for the other. The writer of an `async_frame_fifo` waits when the FIFO has no room,
/// the reader waits when it is empty, and each wakes the other once the blocker is cleared.
/// `task_park` also keeps a side from sleeping when the other side is gone and could never wake it.
pub mod task_park;
