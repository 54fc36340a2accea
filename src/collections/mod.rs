// Gateway module for collections - follows the Train Station Pattern
// All external access must go through this gateway

mod queue;

pub use queue::{Iter, OrderedQueue, QueueError};
