//! Fixed-capacity receive buffer.

/// Receive buffer with a read cursor and a write cursor.
///
/// Unread bytes live in `data[rpos..wpos]`. The buffer never grows; instead
/// [`compact`](Self::compact) moves the unread bytes to the front before every
/// refill. `rpos <= wpos <= capacity` holds at all times.
pub(crate) struct RecvBuffer {
    data: Box<[u8]>,
    rpos: usize,
    wpos: usize,
}

impl RecvBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            rpos: 0,
            wpos: 0,
        }
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of unread bytes.
    pub(crate) const fn len(&self) -> usize {
        self.wpos - self.rpos
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.rpos == self.wpos
    }

    pub(crate) const fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Unread bytes.
    pub(crate) fn available(&self) -> &[u8] {
        &self.data[self.rpos..self.wpos]
    }

    /// Marks `n` unread bytes as consumed.
    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.rpos += n.min(self.len());
        if self.rpos == self.wpos {
            self.rpos = 0;
            self.wpos = 0;
        }
    }

    /// Shifts unread bytes to the front of the buffer.
    pub(crate) fn compact(&mut self) {
        if self.rpos > 0 {
            self.data.copy_within(self.rpos..self.wpos, 0);
            self.wpos -= self.rpos;
            self.rpos = 0;
        }
    }

    /// Free space after the write cursor.
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.wpos..]
    }

    /// Marks `n` bytes written into [`spare_mut`](Self::spare_mut) as filled.
    pub(crate) fn commit(&mut self, n: usize) {
        debug_assert!(self.wpos + n <= self.capacity());
        self.wpos = (self.wpos + n).min(self.capacity());
    }

    pub(crate) const fn clear(&mut self) {
        self.rpos = 0;
        self.wpos = 0;
    }
}

impl std::fmt::Debug for RecvBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecvBuffer")
            .field("capacity", &self.capacity())
            .field("rpos", &self.rpos)
            .field("wpos", &self.wpos)
            .finish()
    }
}
