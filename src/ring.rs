use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

pub fn create_byte_ring(size: usize) -> (ByteSender, ByteReceiver) {
    let (producer, consumer) = direct_ring_buffer::create_ring_buffer(size);
    let shared = Arc::new(Shared {
        notify: Notify::new(),
        closed: AtomicBool::new(false),
    });

    let producer = ByteSender {
        producer,
        shared: shared.clone(),
    };

    let consumer = ByteReceiver { consumer, shared };

    (producer, consumer)
}

struct Shared {
    notify: Notify,
    closed: AtomicBool,
}

pub struct ByteSender {
    shared: Arc<Shared>,
    producer: direct_ring_buffer::Producer<u8>,
}

impl ByteSender {
    pub fn send(&mut self, bytes: &[u8]) -> usize {
        let size = bytes.len().min(self.producer.available());
        if size == 0 {
            return 0;
        }

        self.producer.write_slices(
            |ring, offset| {
                let len = ring.len();
                ring.copy_from_slice(&bytes[offset..offset + len]);
                len
            },
            Some(size),
        );

        self.shared.notify.notify_one();

        size
    }

    pub async fn send_all(&mut self, mut bytes: &[u8]) {
        let mut buf_full = false;
        while !bytes.is_empty() {
            let n = self.send(bytes);
            if n == 0 {
                if !buf_full {
                    tracing::warn!("serial byte ring: buffer full");
                }
                buf_full = true;
                tokio::task::yield_now().await;
            }
            bytes = &bytes[n..];
        }
    }

    pub fn close(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

impl Drop for ByteSender {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct ByteReceiver {
    shared: Arc<Shared>,
    consumer: direct_ring_buffer::Consumer<u8>,
}

impl ByteReceiver {
    pub fn recv<F: FnMut(u8)>(&mut self, mut f: F) -> usize {
        let mut count = 0;
        self.consumer.read_slices(
            |ring, _| {
                for &b in ring {
                    f(b);
                }
                count += ring.len();
                ring.len()
            },
            None,
        );
        count
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub async fn notified(&self) {
        self.shared.notify.notified().await;
    }

    pub async fn recv_until_closed<F: FnMut(u8)>(&mut self, mut f: F) -> usize {
        let mut total = 0;
        loop {
            total += self.recv(&mut f);
            if self.is_closed() {
                // anything written before close is visible now
                return total + self.recv(&mut f);
            }
            self.notified().await;
        }
    }
}

#[test]
fn byte_ring() {
    let (mut tx, mut rx) = create_byte_ring(16);
    let chunks: [&[u8]; 5] = [
        &[0x90, 0x3c, 0x40],
        &[0x80],
        &[0x3c, 0x00, 0xb0, 0x07, 0x64],
        &[],
        &[0xf8, 0xf8, 0xf8, 0xf8, 0xf8, 0xf8, 0xf8],
    ];

    for chunk in chunks {
        assert_eq!(tx.send(chunk), chunk.len());

        let mut out = Vec::new();
        assert_eq!(rx.recv(|b| out.push(b)), chunk.len());
        assert_eq!(out, chunk);

        assert_eq!(rx.recv(|_| unreachable!()), 0);
    }
}

#[test]
fn byte_ring_full() {
    let (mut tx, mut rx) = create_byte_ring(4);
    let bytes: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

    let taken = tx.send(&bytes);
    assert!(taken > 0 && taken < bytes.len());
    assert_eq!(tx.send(&bytes[taken..]), 0);

    let mut out = Vec::new();
    assert_eq!(rx.recv(|b| out.push(b)), taken);
    assert_eq!(out, bytes[..taken]);

    // wraps around the end of the ring
    let more = tx.send(&bytes[taken..]);
    assert!(more > 0);
    rx.recv(|b| out.push(b));
    assert_eq!(out, bytes[..taken + more]);
}

#[tokio::test]
async fn byte_ring_close() {
    let (mut tx, mut rx) = create_byte_ring(4);

    let send = async move {
        tx.send_all(&[0x90, 0x3c, 0x40, 0x90, 0x3e, 0x40, 0x90, 0x40, 0x40])
            .await;
        tx.close();
    };

    let mut out = Vec::new();
    let recv = rx.recv_until_closed(|b| out.push(b));

    let ((), count) = futures::join!(send, recv);
    assert_eq!(count, 9);
    assert_eq!(out, vec![0x90, 0x3c, 0x40, 0x90, 0x3e, 0x40, 0x90, 0x40, 0x40]);
}
