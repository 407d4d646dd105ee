use std::sync::Mutex;

pub const BUF_SIZE: usize = 32 * 1024;

/// A reusable pool of 32 KiB relay buffers (spec §4.6 step 7 "a reusable
/// 32 KiB buffer from a shared pool"). Checked-out buffers return to the
/// pool on drop rather than being freed, so a busy relay doesn't churn
/// the allocator on every read.
#[derive(Default)]
pub struct BufPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkout(&self) -> PooledBuf<'_> {
        let buf = self
            .free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| vec![0u8; BUF_SIZE]);
        PooledBuf { pool: self, buf: Some(buf) }
    }
}

pub struct PooledBuf<'a> {
    pool: &'a BufPool,
    buf: Option<Vec<u8>>,
}

impl std::ops::Deref for PooledBuf<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.buf.as_deref().expect("buffer present until drop")
    }
}

impl std::ops::DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().expect("buffer present until drop")
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.free.lock().unwrap_or_else(|e| e.into_inner()).push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_out_buffer_returns_to_pool_on_drop() {
        let pool = BufPool::new();
        {
            let buf = pool.checkout();
            assert_eq!(buf.len(), BUF_SIZE);
        }
        assert_eq!(pool.free.lock().unwrap().len(), 1);
    }
}
