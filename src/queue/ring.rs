// fixed-size ring buffer, head cursor + length

pub(crate) struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append at the tail, handing the item back when there is no free slot.
    pub fn push_back(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = (self.head + self.len) % self.slots.len();
        debug_assert!(self.slots[tail].is_none());
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some());
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        item
    }

    /// Remove every buffered item in FIFO order.
    pub fn take_all(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);
        while let Some(item) = self.pop_front() {
            items.push(item);
        }
        items
    }
}
