use thiserror::Error;

/// Errors returned by [`OrderedQueue`] operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,

    #[error("value not found in queue")]
    NotFound,
}

/// A node in the queue's slot arena. `prev`/`next` are slot indices.
#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// FIFO queue backed by a doubly-linked list.
///
/// Nodes live in a slot arena and link to each other by index, so unlinking a
/// node from the middle never needs shared ownership. Vacated slots are
/// recycled through a free list.
///
/// - `enqueue` appends at the tail in O(1)
/// - `dequeue` removes the head in O(1)
/// - `delete` removes the first node equal to a value in O(n)
///
/// `head` and `tail` are both `None` iff the queue is empty.
#[derive(Debug)]
pub struct OrderedQueue<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Create an empty queue with room for `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append a value at the tail
    pub fn enqueue(&mut self, value: T) {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Remove and return the head value
    pub fn dequeue(&mut self) -> Result<T, QueueError> {
        let head = self.head.ok_or(QueueError::Empty)?;
        Ok(self.unlink(head))
    }

    /// Peek at the head value without removing it
    pub fn front(&self) -> Option<&T> {
        self.head.map(|index| &self.node(index).value)
    }

    /// Iterate from head to tail
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            queue: self,
            cursor: self.head,
        }
    }

    /// Detach the node at `index`, relink its neighbours and recycle the slot
    fn unlink(&mut self, index: usize) -> T {
        let node = self.slots[index]
            .take()
            .unwrap_or_else(|| unreachable!("linked slot {index} is vacant"));

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(index);
        self.len -= 1;
        node.value
    }

    fn node(&self, index: usize) -> &Node<T> {
        self.slots[index]
            .as_ref()
            .unwrap_or_else(|| unreachable!("linked slot {index} is vacant"))
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        self.slots[index]
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked slot {index} is vacant"))
    }
}

impl<T: PartialEq> OrderedQueue<T> {
    /// Remove the first node whose value equals `value`.
    ///
    /// Comparison is by value (`PartialEq`), not by identity.
    pub fn delete(&mut self, value: &T) -> Result<T, QueueError> {
        if self.is_empty() {
            return Err(QueueError::Empty);
        }

        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = self.node(index);
            if node.value == *value {
                return Ok(self.unlink(index));
            }
            cursor = node.next;
        }

        Err(QueueError::NotFound)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.iter().any(|candidate| candidate == value)
    }
}

impl<T> FromIterator<T> for OrderedQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        for value in iter {
            queue.enqueue(value);
        }
        queue
    }
}

/// Head-to-tail iterator over an [`OrderedQueue`]
pub struct Iter<'a, T> {
    queue: &'a OrderedQueue<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.queue.node(index);
        self.cursor = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain<T>(queue: &mut OrderedQueue<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(value) = queue.dequeue() {
            out.push(value);
        }
        out
    }

    fn assert_consistent<T>(queue: &OrderedQueue<T>) {
        assert_eq!(queue.head.is_none(), queue.tail.is_none());
        assert_eq!(queue.head.is_none(), queue.len() == 0);
        assert_eq!(queue.iter().count(), queue.len());
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let mut queue: OrderedQueue<i32> = (1..=5).collect();
        assert_eq!(queue.len(), 5);
        assert_eq!(drain(&mut queue), vec![1, 2, 3, 4, 5]);
        assert_consistent(&queue);
    }

    #[test]
    fn test_dequeue_empty() {
        let mut queue = OrderedQueue::<String>::new();
        assert_eq!(queue.dequeue(), Err(QueueError::Empty));

        queue.enqueue("only".to_string());
        assert_eq!(queue.dequeue(), Ok("only".to_string()));
        assert_eq!(queue.dequeue(), Err(QueueError::Empty));
        assert_consistent(&queue);
    }

    #[test]
    fn test_delete_on_empty_queue() {
        let mut queue = OrderedQueue::<i32>::new();
        assert_eq!(queue.delete(&1), Err(QueueError::Empty));
    }

    #[test]
    fn test_delete_missing_value() {
        let mut queue: OrderedQueue<i32> = vec![1, 2, 3].into_iter().collect();
        assert_eq!(queue.delete(&9), Err(QueueError::NotFound));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_delete_head() {
        let mut queue: OrderedQueue<i32> = vec![1, 2, 3].into_iter().collect();
        assert_eq!(queue.delete(&1), Ok(1));
        assert_consistent(&queue);
        assert_eq!(queue.front(), Some(&2));
        assert_eq!(drain(&mut queue), vec![2, 3]);
    }

    #[test]
    fn test_delete_tail_then_enqueue() {
        let mut queue: OrderedQueue<i32> = vec![1, 2, 3].into_iter().collect();
        assert_eq!(queue.delete(&3), Ok(3));
        assert_consistent(&queue);

        // the new tail must link after 2, not the removed 3
        queue.enqueue(4);
        assert_eq!(drain(&mut queue), vec![1, 2, 4]);
    }

    #[test]
    fn test_delete_middle() {
        let mut queue: OrderedQueue<i32> = vec![1, 2, 3].into_iter().collect();
        assert_eq!(queue.delete(&2), Ok(2));
        assert_consistent(&queue);
        assert_eq!(drain(&mut queue), vec![1, 3]);
    }

    #[test]
    fn test_delete_single_element() {
        let mut queue = OrderedQueue::new();
        queue.enqueue('a');
        assert_eq!(queue.delete(&'a'), Ok('a'));
        assert!(queue.is_empty());
        assert_consistent(&queue);
        assert_eq!(queue.dequeue(), Err(QueueError::Empty));
    }

    #[test]
    fn test_delete_removes_first_match_only() {
        let mut queue: OrderedQueue<i32> = vec![7, 1, 7].into_iter().collect();
        queue.delete(&7).unwrap();
        assert_eq!(drain(&mut queue), vec![1, 7]);
    }

    #[test]
    fn test_deleted_value_never_drains() {
        let mut queue: OrderedQueue<i32> = (0..20).collect();
        for v in [0, 19, 10, 5] {
            queue.delete(&v).unwrap();
        }
        assert_consistent(&queue);

        let drained = drain(&mut queue);
        assert_eq!(drained.len(), 16);
        for v in [0, 19, 10, 5] {
            assert!(!drained.contains(&v));
        }
    }

    #[test]
    fn test_delete_compares_by_value() {
        #[derive(Debug, Clone, PartialEq)]
        struct Chat {
            id: u32,
            history: Vec<String>,
        }

        let a = Chat { id: 1, history: vec!["hi".into()] };
        let b = Chat { id: 2, history: vec![] };
        let mut queue: OrderedQueue<Chat> = vec![a.clone(), b.clone()].into_iter().collect();

        // a structurally equal copy, not the stored instance
        let lookalike = Chat { id: 1, history: vec!["hi".into()] };
        assert_eq!(queue.delete(&lookalike), Ok(a));
        assert!(!queue.contains(&lookalike));
        assert!(queue.contains(&b));
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut queue = OrderedQueue::with_capacity(2);
        for round in 0..100 {
            queue.enqueue(round);
            queue.enqueue(round + 1000);
            queue.dequeue().unwrap();
            queue.delete(&(round + 1000)).unwrap();
        }
        assert!(queue.is_empty());
        assert!(queue.slots.len() <= 2);
    }
}
