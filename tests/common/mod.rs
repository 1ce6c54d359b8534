#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mediaport::{Buffer, ClientCallback, PortHooks};

/// The buffers a scripted component is currently holding for one port.
#[derive(Default)]
pub struct Held {
    queue: Mutex<VecDeque<Buffer>>,
}

impl Held {
    pub fn new() -> Arc<Held> {
        Arc::new(Held::default())
    }

    pub fn push(&self, buffer: &Buffer) {
        self.queue.lock().unwrap().push_back(Arc::clone(buffer));
    }

    pub fn pop(&self) -> Option<Buffer> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

/// Hooks for a port whose component parks every sent buffer and hands all
/// of them back when the port is disabled or flushed.
pub fn scripted(held: &Arc<Held>) -> PortHooks {
    let mut hooks = holding(held);

    hooks.disable = Some(Arc::new({
        let held = Arc::clone(held);
        move |port, _| {
            while let Some(buffer) = held.pop() {
                port.buffer_header_callback(&buffer);
            }

            Ok(())
        }
    }));

    hooks
}

/// Hooks for a port whose component parks every sent buffer and keeps
/// holding it across a disable, so drains stay pending until the test
/// returns the buffers itself.
pub fn holding(held: &Arc<Held>) -> PortHooks {
    PortHooks {
        set_format: Some(Arc::new(|_, _| Ok(()))),
        enable: Some(Arc::new(|_, _, _| Ok(()))),
        disable: Some(Arc::new(|_, _| Ok(()))),
        flush: Some(Arc::new({
            let held = Arc::clone(held);
            move |port| {
                while let Some(buffer) = held.pop() {
                    port.buffer_header_callback(&buffer);
                }

                Ok(())
            }
        })),
        send: Some(Arc::new({
            let held = Arc::clone(held);
            move |_, buffer| {
                held.push(buffer);
                Ok(())
            }
        })),
        ..PortHooks::default()
    }
}

/// A client callback counting how often it fired.
pub fn counting_cb() -> (ClientCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));

    let cb: ClientCallback = Arc::new({
        let count = Arc::clone(&count);
        move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    });

    (cb, count)
}

/// A client callback collecting the buffers it receives.
pub fn collecting_cb() -> (ClientCallback, Arc<Held>) {
    let held = Held::new();

    let cb: ClientCallback = Arc::new({
        let held = Arc::clone(&held);
        move |_, buffer| {
            held.push(buffer);
        }
    });

    (cb, held)
}
