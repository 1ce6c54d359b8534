use core::any::Any;
use core::fmt;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use bitflags::bitflags;
use format::{EsFormat, FourCc};

use crate::buffer::{Buffer, Payload};
use crate::component::Component;
use crate::error::{ErrorKind, Result};
use crate::events::{self, EventData, FormatChangedEvent};
use crate::hooks::{ClientCallback, PortHooks};
use crate::params::{CoreStatisticsParam, ParamId, Parameter};
use crate::pool::Pool;
use crate::stats::{self, CorePortStats, CoreStats, StatsDirection};
use crate::sync::{Semaphore, lock};

/// The role of a port on its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    Control,
    Input,
    Output,
}

impl PortType {
    fn role(self) -> &'static str {
        match self {
            PortType::Control => "ctr",
            PortType::Input => "in",
            PortType::Output => "out",
        }
    }
}

bitflags! {
    /// Static capabilities of a port.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// The port needs no payload memory.
        const PASSTHROUGH = 1 << 0;
        /// This side prefers to allocate the connection pool.
        const ALLOCATION = 1 << 1;
        /// The port handles format changed events in-band.
        const SUPPORTS_EVENT_FORMAT_CHANGE = 1 << 2;
    }
}

/// The negotiable buffer geometry of a port.
///
/// Hooks receive this mutably while the port lock is held; clients adjust
/// it through [`Port::configure`] before enabling the port.
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct PortConfig {
    pub buffer_num: u32,
    pub buffer_num_min: u32,
    pub buffer_num_recommended: u32,
    pub buffer_size: u32,
    pub buffer_size_min: u32,
    pub buffer_size_recommended: u32,
}

impl PortConfig {
    /// Raise the working geometry to the component's minima.
    fn clamp(&mut self) {
        if self.buffer_size < self.buffer_size_min {
            self.buffer_size = self.buffer_size_min;
        }

        if self.buffer_num < self.buffer_num_min {
            self.buffer_num = self.buffer_num_min;
        }
    }
}

/// State guarded by the port lock.
struct PortCore {
    config: PortConfig,
    /// A pool must be allocated when the port is enabled.
    allocate_pool: bool,
    /// The pool backing a core managed connection, on the side that
    /// allocated it.
    pool_for_connection: Option<Arc<Pool>>,
}

/// The connection half of the port state.
///
/// Kept in its own leaf mutex so disconnect can clear the peer's pointer
/// under the holder's port lock without nesting port locks.
#[derive(Default)]
struct Link {
    peer: Option<Arc<Port>>,
    core_owns_connection: bool,
}

/// The buffer return destination currently installed on a port.
#[derive(Clone)]
enum InstalledCb {
    Client(ClientCallback),
    ConnectedInput,
    ConnectedOutput,
}

/// What remains to be done after the common enable path.
enum EnableFollowUp {
    None,
    ConnectedOutput(Arc<Port>),
}

/// Buffer headers out in the component, and the gate disable drains on.
struct Transit {
    count: Mutex<i32>,
    sema: Semaphore,
}

impl Transit {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            // Posted while the count is zero.
            sema: Semaphore::new(1),
        }
    }

    fn increment(&self) {
        let mut count = lock(&self.count);

        // Claim the drain gate on the 0 -> 1 transition.
        if *count == 0 {
            self.sema.wait();
        }

        *count += 1;
    }

    fn decrement(&self) {
        let mut count = lock(&self.count);
        *count -= 1;

        if *count == 0 {
            self.sema.post();
        }
    }

    /// Block until no buffers are in transit, leaving the gate posted.
    fn wait_drain(&self) {
        self.sema.wait();
        self.sema.post();
    }

    fn count(&self) -> i32 {
        *lock(&self.count)
    }
}

/// One endpoint of a component, carrying a single elementary stream.
///
/// Ports are allocated on a component with [`Port::alloc`], configured
/// through [`Port::configure`] and [`Port::format_commit`], optionally
/// connected to a peer, enabled, and fed buffers with [`Port::send`]. The
/// component hands buffers back through [`Port::buffer_header_callback`].
pub struct Port {
    ptype: PortType,
    index: AtomicU32,
    component: Weak<Component>,
    capabilities: Capabilities,
    hooks: PortHooks,
    /// Opaque per-port component state; never read by the core.
    module: OnceLock<Box<dyn Any + Send + Sync>>,
    /// The format object currently exposed to component code.
    format_slot: Mutex<Arc<Mutex<EsFormat>>>,
    /// The handle established at allocation, used to detect accidental
    /// reassignment of the slot.
    format_copy: Arc<Mutex<EsFormat>>,
    lock: Mutex<PortCore>,
    link: Mutex<Link>,
    /// Serialises send against enabled-state transitions.
    send_gate: Mutex<()>,
    enabled: AtomicBool,
    transit: Transit,
    stats: Mutex<CorePortStats>,
    cb: Mutex<Option<InstalledCb>>,
    name: Mutex<String>,
}

impl Port {
    /// Allocate a port on a component.
    ///
    /// The port is registered with the component and takes the next index
    /// among the ports of its type.
    pub fn alloc(
        component: &Arc<Component>,
        ptype: PortType,
        capabilities: Capabilities,
        hooks: PortHooks,
    ) -> Arc<Port> {
        let format = Arc::new(Mutex::new(EsFormat::default()));

        let port = Arc::new(Port {
            ptype,
            index: AtomicU32::new(0),
            component: Arc::downgrade(component),
            capabilities,
            hooks,
            module: OnceLock::new(),
            format_slot: Mutex::new(Arc::clone(&format)),
            format_copy: format,
            lock: Mutex::new(PortCore {
                config: PortConfig::default(),
                allocate_pool: false,
                pool_for_connection: None,
            }),
            link: Mutex::new(Link::default()),
            send_gate: Mutex::new(()),
            enabled: AtomicBool::new(false),
            transit: Transit::new(),
            stats: Mutex::new(CorePortStats::default()),
            cb: Mutex::new(None),
            name: Mutex::new(String::new()),
        });

        let index = component.register(&port);
        port.index.store(index, Ordering::Relaxed);
        port.name_update();

        tracing::trace!(port = %port.name(), ?ptype, "port created");
        port
    }

    /// Allocate an array of ports, numbered and named in order.
    pub fn ports_alloc(
        component: &Arc<Component>,
        num: u32,
        ptype: PortType,
        capabilities: Capabilities,
        hooks: &PortHooks,
    ) -> Vec<Arc<Port>> {
        (0..num)
            .map(|_| Self::alloc(component, ptype, capabilities, hooks.clone()))
            .collect()
    }

    /// The role of the port.
    #[inline]
    pub fn port_type(&self) -> PortType {
        self.ptype
    }

    /// The position of the port within its component's array of this type.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index.load(Ordering::Relaxed)
    }

    /// The owning component, unless it has been destroyed.
    #[inline]
    pub fn component(&self) -> Option<Arc<Component>> {
        self.component.upgrade()
    }

    /// The static capabilities of the port.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether the port is currently enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// The number of buffers sent to the port and not yet returned.
    #[inline]
    pub fn in_transit(&self) -> i32 {
        self.transit.count()
    }

    /// The peer this port is connected to, if any.
    #[inline]
    pub fn connected_port(&self) -> Option<Arc<Port>> {
        lock(&self.link).peer.clone()
    }

    /// Whether the core drives the connection this port is part of.
    #[inline]
    pub fn core_owns_connection(&self) -> bool {
        lock(&self.link).core_owns_connection
    }

    /// The diagnostic name of the port.
    pub fn name(&self) -> String {
        lock(&self.name).clone()
    }

    /// Attach the component's per-port state. Only the first call takes
    /// effect.
    pub fn set_module(&self, module: Box<dyn Any + Send + Sync>) {
        let _ = self.module.set(module);
    }

    /// Borrow the component's per-port state.
    pub fn module<T: Any>(&self) -> Option<&T> {
        self.module.get()?.downcast_ref()
    }

    /// The format object of the port.
    pub fn format(&self) -> Arc<Mutex<EsFormat>> {
        Arc::clone(&lock(&self.format_slot))
    }

    /// Point the port at a different format object.
    ///
    /// The next [`format_commit`][Port::format_commit] rejects the foreign
    /// object and restores the one established at allocation.
    pub fn replace_format(&self, format: Arc<Mutex<EsFormat>>) {
        *lock(&self.format_slot) = format;
    }

    /// Inspect or adjust the buffer geometry.
    pub fn configure(&self, f: impl FnOnce(&mut PortConfig)) {
        f(&mut lock(&self.lock).config);
    }

    /// A copy of the current buffer geometry.
    pub fn config(&self) -> PortConfig {
        lock(&self.lock).config
    }

    /// Commit the format currently set on the port.
    pub fn format_commit(self: &Arc<Self>) -> Result<()> {
        {
            let mut slot = lock(&self.format_slot);

            if !Arc::ptr_eq(&slot, &self.format_copy) {
                tracing::error!(port = %self.name(), "port format has been overwritten, restoring");
                *slot = Arc::clone(&self.format_copy);
                return Err(ErrorKind::Fault.into());
            }
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            let encoding = lock(&self.format_copy).encoding;

            match encoding {
                Some(encoding) => {
                    tracing::trace!(port = %self.name(), %encoding, "committing format")
                }
                None => tracing::trace!(port = %self.name(), "committing format (<NO-FORMAT>)"),
            }
        }

        let Some(hook) = &self.hooks.set_format else {
            tracing::error!(port = %self.name(), "no component implementation");
            return Err(ErrorKind::NotImplemented.into());
        };

        let status;

        {
            let mut core = lock(&self.lock);
            status = hook(self, &mut core.config);
            self.name_update();
            core.config.clamp();
        }

        // The commit may have altered the requirements of the component's
        // output ports.
        if self.ptype == PortType::Input {
            if let Some(component) = self.component.upgrade() {
                for output in component.output_ports() {
                    lock(&output.lock).config.clamp();
                }
            }
        }

        status
    }

    /// Enable processing on the port.
    ///
    /// A disconnected port requires a callback to return buffers through; a
    /// connected port must be enabled without one.
    pub fn enable(self: &Arc<Self>, cb: Option<ClientCallback>) -> Result<()> {
        let config = self.config();
        tracing::trace!(
            port = %self.name(),
            buffer_num = config.buffer_num,
            buffer_num_min = config.buffer_num_min,
            buffer_size = config.buffer_size,
            buffer_size_min = config.buffer_size_min,
            has_cb = cb.is_some(),
            "enabling port",
        );

        if self.hooks.enable.is_none() {
            return Err(ErrorKind::NotImplemented.into());
        }

        let mut guard = lock(&self.lock);

        match self.enable_locked(&mut guard, cb)? {
            EnableFollowUp::None => Ok(()),
            EnableFollowUp::ConnectedOutput(input) => self.enable_connected(guard, &input),
        }
    }

    /// The common enable path, running under the port lock.
    fn enable_locked(
        self: &Arc<Self>,
        core: &mut PortCore,
        cb: Option<ClientCallback>,
    ) -> Result<EnableFollowUp> {
        if self.is_enabled() {
            tracing::debug!(port = %self.name(), "already enabled");
            return Err(ErrorKind::Invalid.into());
        }

        let connected = self.connected_port();

        // Use the maxima between connected ports for the buffer geometry.
        if let Some(peer) = &connected {
            if self.ptype == PortType::Output {
                let peer_core = lock(&peer.lock);

                if peer_core.config.buffer_num > core.config.buffer_num {
                    core.config.buffer_num = peer_core.config.buffer_num;
                }

                if peer_core.config.buffer_size > core.config.buffer_size {
                    core.config.buffer_size = peer_core.config.buffer_size;
                }
            }
        }

        if core.config.buffer_num < core.config.buffer_num_min {
            tracing::error!(
                port = %self.name(),
                buffer_num = core.config.buffer_num,
                buffer_num_min = core.config.buffer_num_min,
                "buffer_num too small",
            );
            return Err(ErrorKind::Invalid.into());
        }

        if core.config.buffer_size < core.config.buffer_size_min {
            tracing::error!(
                port = %self.name(),
                buffer_size = core.config.buffer_size,
                buffer_size_min = core.config.buffer_size_min,
                "buffer_size too small",
            );
            return Err(ErrorKind::Invalid.into());
        }

        // A callback and a connection are mutually exclusive, and one of
        // the two must be there to receive returned buffers.
        if connected.is_some() == cb.is_some() {
            tracing::error!(
                port = %self.name(),
                connected = connected.is_some(),
                has_cb = cb.is_some(),
                "callback not allowed with this connection state",
            );
            return Err(ErrorKind::Invalid.into());
        }

        self.set_callback(cb.clone().map(InstalledCb::Client));

        let Some(hook) = &self.hooks.enable else {
            return Err(ErrorKind::NotImplemented.into());
        };

        hook(self, &mut core.config, cb.as_ref())?;

        {
            let _gate = lock(&self.send_gate);
            self.enabled.store(true, Ordering::Release);
        }

        if let Some(peer) = connected {
            if self.ptype == PortType::Input {
                self.set_callback(Some(InstalledCb::ConnectedInput));
            } else {
                return Ok(EnableFollowUp::ConnectedOutput(peer));
            }
        }

        Ok(EnableFollowUp::None)
    }

    /// Finish enabling a connected output: bring the input end up, and for
    /// a core managed connection create the pool and prime the output.
    fn enable_connected<'a>(
        self: &'a Arc<Self>,
        mut out_guard: MutexGuard<'a, PortCore>,
        input: &Arc<Port>,
    ) -> Result<()> {
        self.set_callback(Some(InstalledCb::ConnectedOutput));

        // The output lock is already held; lock the input side.
        let mut in_guard = lock(&input.lock);

        let mut status: Result<()> = Ok(());

        'connected: {
            // Restart the input if its buffer geometry needs to change.
            if input.is_enabled()
                && (in_guard.config.buffer_size != out_guard.config.buffer_size
                    || in_guard.config.buffer_num != out_guard.config.buffer_num)
            {
                if let Err(error) = input.disable_locked(&mut in_guard) {
                    status = Err(error);
                    break 'connected;
                }
            }

            // Both ends of the connection use the same geometry.
            in_guard.config.buffer_size = out_guard.config.buffer_size;
            in_guard.config.buffer_num = out_guard.config.buffer_num;

            if !input.is_enabled() {
                if let Err(error) = input.enable_locked(&mut in_guard, None) {
                    status = Err(error);
                    break 'connected;
                }
            }

            if out_guard.allocate_pool {
                // The side advertising ALLOCATION hosts the pool; the
                // input does by default.
                let host_is_output = self.capabilities.contains(Capabilities::ALLOCATION);
                let host = if host_is_output { self } else { input };

                let buffer_num = out_guard.config.buffer_num;

                // Pass-through connections need no payload memory.
                let payload_size = if self.capabilities.contains(Capabilities::PASSTHROUGH) {
                    0
                } else {
                    out_guard.config.buffer_size
                };

                // Pool creation allocates payloads through the hosting
                // port, so it must run with neither port lock held.
                drop(in_guard);

                let created;

                if host_is_output {
                    drop(out_guard);
                    created = Pool::for_port(host, buffer_num, payload_size);
                    out_guard = lock(&self.lock);
                } else {
                    created = Pool::for_port(host, buffer_num, payload_size);
                }

                in_guard = lock(&input.lock);

                let pool = match created {
                    Ok(pool) => pool,
                    Err(error) => {
                        status = Err(error);
                        break 'connected;
                    }
                };

                let host_core = if host_is_output {
                    &mut *out_guard
                } else {
                    &mut *in_guard
                };
                host_core.pool_for_connection = Some(Arc::clone(&pool));

                let port = Arc::downgrade(self);
                pool.callback_set(Some(Arc::new(move |_, buffer| {
                    connected_pool_cb(&port, buffer)
                })));

                // Prime the output with the pool's buffers.
                if let Err(error) = self.populate_from_pool(buffer_num, &pool) {
                    status = Err(error);
                    break 'connected;
                }
            }
        }

        // Both locks are held again, whichever way the block exited.
        if status.is_err() {
            if input.is_enabled() {
                let _ = input.disable_locked(&mut in_guard);
            }

            drop(in_guard);
            let _ = self.disable_locked(&mut out_guard);
        }

        status
    }

    /// Disable processing on the port.
    ///
    /// Blocks until every buffer sent to the port has been returned.
    pub fn disable(self: &Arc<Self>) -> Result<()> {
        tracing::trace!(port = %self.name(), "disabling port");

        if self.hooks.disable.is_none() {
            return Err(ErrorKind::NotImplemented.into());
        }

        let mut guard = lock(&self.lock);
        let status = self.disable_locked(&mut guard);

        // Ownership of the connection pool leaves the port under the lock;
        // destruction happens outside it.
        let pool = guard.pool_for_connection.take();
        drop(guard);
        drop(pool);

        status
    }

    fn disable_locked(self: &Arc<Self>, core: &mut PortCore) -> Result<()> {
        if !self.is_enabled() {
            tracing::error!(port = %self.name(), "port is not enabled");
            return Err(ErrorKind::Invalid.into());
        }

        let Some(component) = self.component.upgrade() else {
            return Err(ErrorKind::Invalid.into());
        };

        // The fence concurrent senders observe.
        {
            let _gate = lock(&self.send_gate);
            self.enabled.store(false, Ordering::Release);
        }

        let action = component.action_lock();

        // Buffers flushed back while draining must not be re-sent.
        if let Some(pool) = &core.pool_for_connection {
            pool.callback_set(None);
        }

        let result = match &self.hooks.disable {
            Some(hook) => hook(self, &mut core.config),
            None => Err(ErrorKind::NotImplemented.into()),
        };

        drop(action);

        if let Err(error) = result {
            tracing::error!(port = %self.name(), ?error, "port could not be disabled");
            let _gate = lock(&self.send_gate);
            self.enabled.store(true, Ordering::Release);
            return Err(error);
        }

        // Wait for all the buffers to have come back from the component.
        tracing::debug!(
            port = %self.name(),
            in_transit = self.transit.count(),
            "waiting for buffers in transit",
        );
        self.transit.wait_drain();
        tracing::debug!(port = %self.name(), "no buffers left in transit");

        self.set_callback(None);

        if self.ptype == PortType::Output {
            if let Some(peer) = self.connected_port() {
                let _ = peer.disable();
            }
        }

        Ok(())
    }

    /// Send a buffer header to the port.
    pub fn send(self: &Arc<Self>, buffer: &Buffer) -> Result<()> {
        if !buffer.has_payload() && !self.capabilities.contains(Capabilities::PASSTHROUGH) {
            tracing::error!(port = %self.name(), "buffer without payload on a non pass-through port");
            return Err(ErrorKind::Invalid.into());
        }

        let Some(hook) = &self.hooks.send else {
            return Err(ErrorKind::NotImplemented.into());
        };

        let _gate = lock(&self.send_gate);

        if !self.enabled.load(Ordering::Acquire) {
            return Err(ErrorKind::Invalid.into());
        }

        // Output buffers are delivered empty, to be filled.
        if self.ptype == PortType::Output && buffer.length() != 0 {
            tracing::debug!(port = %self.name(), "given an output buffer with length != 0");
            buffer.set_length(0);
        }

        self.transit.increment();

        match hook(self, buffer) {
            Ok(()) => {
                self.update_stats(StatsDirection::Rx);
                Ok(())
            }
            Err(error) => {
                self.transit.decrement();
                tracing::error!(port = %self.name(), ?error, "send failed");
                Err(error)
            }
        }
    }

    /// Return every queued buffer without processing it.
    pub fn flush(self: &Arc<Self>) -> Result<()> {
        tracing::trace!(port = %self.name(), "flushing port");

        let Some(hook) = &self.hooks.flush else {
            return Err(ErrorKind::NotImplemented.into());
        };

        let _gate = lock(&self.send_gate);
        hook(self)
    }

    /// Hand a buffer back from the component.
    ///
    /// Components call this for every buffer they received through the send
    /// hook once they are done with it.
    pub fn buffer_header_callback(self: &Arc<Self>, buffer: &Buffer) {
        self.transit.decrement();

        let in_transit = self.transit.count();

        if in_transit < 0 {
            tracing::error!(port = %self.name(), in_transit, "buffer headers in transit < 0");
        }

        self.update_stats(StatsDirection::Tx);

        match self.installed_callback() {
            Some(InstalledCb::Client(cb)) => cb(self, buffer),
            Some(InstalledCb::ConnectedInput) => connected_input_cb(self, buffer),
            Some(InstalledCb::ConnectedOutput) => connected_output_cb(self, buffer),
            None => {}
        }
    }

    /// Deliver an event buffer through the buffer return path.
    pub fn event_send(self: &Arc<Self>, buffer: &Buffer) {
        match self.installed_callback() {
            Some(InstalledCb::Client(cb)) => cb(self, buffer),
            Some(InstalledCb::ConnectedInput) => connected_input_cb(self, buffer),
            Some(InstalledCb::ConnectedOutput) => connected_output_cb(self, buffer),
            None => {
                tracing::error!(
                    port = %self.name(),
                    cmd = ?buffer.cmd(),
                    "event lost, no buffer header callback installed",
                );
                buffer.release();
            }
        }
    }

    /// Draw an event buffer from the component's event pool.
    pub fn event_get(self: &Arc<Self>, event: FourCc) -> Result<Buffer> {
        let Some(component) = self.component.upgrade() else {
            return Err(ErrorKind::Invalid.into());
        };

        let Some(buffer) = component.event_pool().queue_get() else {
            tracing::error!(port = %self.name(), %event, "no event buffer left");
            return Err(ErrorKind::NoSpace.into());
        };

        buffer.set_cmd(Some(event));
        buffer.set_length(0);
        buffer.set_event(None);

        if event == events::FORMAT_CHANGED {
            let size = events::FORMAT_CHANGED_EVENT_SIZE;

            if buffer.alloc_size() < size {
                tracing::error!(
                    port = %self.name(),
                    %event,
                    alloc_size = buffer.alloc_size(),
                    size,
                    "event buffer too small",
                );
                buffer.release();
                return Err(ErrorKind::NoSpace.into());
            }

            let mut payload = buffer.payload();

            if let Some(payload) = payload.as_mut() {
                payload[..size as usize].fill(0);
            }

            drop(payload);

            buffer.set_event(Some(EventData::FormatChanged(FormatChangedEvent::default())));
            buffer.set_length(size);
        }

        Ok(buffer)
    }

    /// Connect this port to a peer.
    ///
    /// One side must be an input and the other an output, both disabled and
    /// disconnected. The output's component gets the first shot at driving
    /// the link; if it declines, the core manages it.
    pub fn connect(self: &Arc<Self>, other: &Arc<Port>) -> Result<()> {
        tracing::trace!(port = %self.name(), other = %other.name(), "connecting");

        let (output, input) = match (self.ptype, other.ptype) {
            (PortType::Output, PortType::Input) => (self, other),
            (PortType::Input, PortType::Output) => (other, self),
            _ => {
                tracing::error!(
                    port = %self.name(),
                    other = %other.name(),
                    "invalid port types for a connection",
                );
                return Err(ErrorKind::Invalid.into());
            }
        };

        // Always lock output then input to avoid deadlock.
        let mut out_guard = lock(&output.lock);
        let _in_guard = lock(&input.lock);

        if lock(&self.link).peer.is_some() || lock(&other.link).peer.is_some() {
            tracing::error!(port = %self.name(), other = %other.name(), "port is already connected");
            return Err(ErrorKind::AlreadyConnected.into());
        }

        if self.is_enabled() || other.is_enabled() {
            tracing::error!(
                port = %self.name(),
                other = %other.name(),
                "neither port is allowed to be enabled already",
            );
            return Err(ErrorKind::Invalid.into());
        }

        {
            let mut link = lock(&self.link);
            link.peer = Some(Arc::clone(other));
            link.core_owns_connection = false;
        }

        {
            let mut link = lock(&other.link);
            link.peer = Some(Arc::clone(self));
            link.core_owns_connection = false;
        }

        out_guard.allocate_pool = false;

        // See if the component will manage the connection on its own. If
        // not, the core will manage it.
        let component_owns = match &output.hooks.connect {
            Some(hook) => hook(self, Some(other)).is_ok(),
            None => false,
        };

        if !component_owns {
            lock(&self.link).core_owns_connection = true;
            lock(&other.link).core_owns_connection = true;
            out_guard.allocate_pool = true;
        }

        Ok(())
    }

    /// Disconnect the port from its peer.
    pub fn disconnect(self: &Arc<Self>) -> Result<()> {
        tracing::trace!(port = %self.name(), "disconnecting");

        let mut guard = lock(&self.lock);

        let Some(other) = lock(&self.link).peer.clone() else {
            tracing::debug!(port = %self.name(), "port is not connected");
            return Err(ErrorKind::NotConnected.into());
        };

        if self.is_enabled() {
            self.disable_locked(&mut guard)?;

            // The connection pool dies with the link.
            guard.pool_for_connection = None;
        }

        if !lock(&self.link).core_owns_connection {
            if let Some(hook) = &self.hooks.connect {
                if let Err(error) = hook(self, None) {
                    tracing::error!(port = %self.name(), ?error, "disconnection failed");
                    return Err(error);
                }
            }
        }

        lock(&self.link).peer = None;
        lock(&other.link).peer = None;

        Ok(())
    }

    /// Apply a parameter to the port.
    pub fn parameter_set(self: &Arc<Self>, param: &dyn Parameter) -> Result<()> {
        tracing::trace!(port = %self.name(), id = ?param.id(), "setting parameter");

        let mut core = lock(&self.lock);

        let status = match &self.hooks.parameter_set {
            Some(hook) => hook(self, &mut core.config, param),
            None => Err(ErrorKind::NotImplemented.into()),
        };

        match status {
            // Not a component parameter; try the core's own.
            Err(error) if error.is(ErrorKind::NotImplemented) => self.private_parameter_set(param),
            status => status,
        }
    }

    /// Read a parameter from the port.
    pub fn parameter_get(self: &Arc<Self>, param: &mut dyn Parameter) -> Result<()> {
        tracing::trace!(port = %self.name(), id = ?param.id(), "getting parameter");

        let mut core = lock(&self.lock);

        let status = match &self.hooks.parameter_get {
            Some(hook) => hook(self, &mut core.config, param),
            None => Err(ErrorKind::NotImplemented.into()),
        };

        match status {
            Err(error) if error.is(ErrorKind::NotImplemented) => self.private_parameter_get(param),
            status => status,
        }
    }

    fn private_parameter_set(&self, param: &dyn Parameter) -> Result<()> {
        // No core parameter is settable.
        let _ = param;
        Err(ErrorKind::NotImplemented.into())
    }

    fn private_parameter_get(&self, param: &mut dyn Parameter) -> Result<()> {
        if param.id() != ParamId::CORE_STATISTICS {
            return Err(ErrorKind::NotImplemented.into());
        }

        let Some(request) = param.as_any_mut().downcast_mut::<CoreStatisticsParam>() else {
            return Err(ErrorKind::Invalid.into());
        };

        let mut stats = lock(&self.stats);
        let source = stats.direction_mut(request.direction);
        request.stats = *source;

        if request.reset {
            *source = CoreStats::default();
        }

        Ok(())
    }

    /// Allocate payload memory for the port.
    ///
    /// Uses the component's allocator when it supplies one, the process
    /// heap otherwise. The payload keeps the component alive until it is
    /// freed again.
    pub fn payload_alloc(self: &Arc<Self>, size: u32) -> Result<Payload> {
        tracing::trace!(port = %self.name(), size, "allocating payload");

        if size == 0 {
            return Err(ErrorKind::Invalid.into());
        }

        let bytes = match &self.hooks.payload_alloc {
            None => vec![0u8; size as usize].into_boxed_slice(),
            Some(hook) => {
                let _guard = lock(&self.lock);

                match hook(self, size) {
                    Some(bytes) => bytes,
                    None => return Err(ErrorKind::NoMemory.into()),
                }
            }
        };

        Ok(Payload::new(bytes, self.component.upgrade()))
    }

    /// Free payload memory obtained from [`payload_alloc`][Port::payload_alloc].
    pub fn payload_free(self: &Arc<Self>, payload: Payload) {
        tracing::trace!(port = %self.name(), "freeing payload");

        let (bytes, component) = payload.into_parts();

        if let Some(hook) = &self.hooks.payload_free {
            let _guard = lock(&self.lock);
            hook(self, bytes);
        }

        // The component may be destroyed again once the payload is gone.
        drop(component);
    }

    /// Fill the port with buffers drawn from a pool.
    fn populate_from_pool(self: &Arc<Self>, buffer_num: u32, pool: &Arc<Pool>) -> Result<()> {
        tracing::trace!(port = %self.name(), buffer_num, "populating port from pool");

        for _ in 0..buffer_num {
            let Some(buffer) = pool.queue_get() else {
                tracing::error!(port = %self.name(), "too few buffers in the pool");
                return Err(ErrorKind::NoMemory.into());
            };

            if let Err(error) = self.send(&buffer) {
                tracing::error!(port = %self.name(), ?error, "failed to send buffer to port");
                buffer.release();
                return Err(error);
            }
        }

        Ok(())
    }

    fn installed_callback(&self) -> Option<InstalledCb> {
        lock(&self.cb).clone()
    }

    fn set_callback(&self, cb: Option<InstalledCb>) {
        *lock(&self.cb) = cb;
    }

    fn update_stats(&self, direction: StatsDirection) {
        let now = stats::monotonic_micros();
        lock(&self.stats).direction_mut(direction).record(now);
    }

    fn name_update(&self) {
        let component = match self.component.upgrade() {
            Some(component) => component.name().to_owned(),
            None => String::new(),
        };

        let index = self.index.load(Ordering::Relaxed);
        let role = self.ptype.role();

        let encoding = {
            let slot = lock(&self.format_slot);
            let format = lock(&slot);
            format.encoding
        };

        let name = match encoding {
            Some(encoding) => format!("{component}:{role}:{index}({encoding})"),
            None => format!("{component}:{role}:{index}"),
        };

        *lock(&self.name) = name;
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name())
            .field("type", &self.ptype)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Buffer returned on a connected input: back to its pool for re-use.
fn connected_input_cb(port: &Arc<Port>, buffer: &Buffer) {
    tracing::trace!(port = %port.name(), ?buffer, "buffer back from connected input");
    buffer.release();
}

/// Buffer returned on a connected output: forward it to the input end.
fn connected_output_cb(port: &Arc<Port>, buffer: &Buffer) {
    let Some(peer) = port.connected_port() else {
        buffer.release();
        return;
    };

    if buffer.cmd().is_some() {
        if let Some(event) = events::format_changed_get(buffer) {
            // Apply the change, then pass the event downstream.
            let format = port.format();
            lock(&format).full_copy(&event.format);

            let mut status = port.format_commit();

            if let Err(error) = &status {
                tracing::error!(port = %port.name(), ?error, "format commit failed");
            }

            if status.is_ok() {
                status = peer.send(buffer);
            }

            if let Err(error) = status {
                if let Some(component) = port.component() {
                    let _ = component.event_error_send(error.kind());
                }

                buffer.release();
            }

            return;
        }

        // Other events stay on this side: their payload may not be
        // shareable with the peer.
        buffer.release();
        return;
    }

    if port.is_enabled() {
        if let Err(error) = peer.send(buffer) {
            tracing::error!(
                port = %port.name(),
                peer = %peer.name(),
                ?error,
                "could not forward buffer to connected port",
            );
            buffer.release();
        }
    } else {
        // The port is disabled, so this is a flushed buffer going back to
        // its pool.
        buffer.release();
    }
}

/// A buffer finished its journey and re-entered the connection pool:
/// recycle it into the output. Returns true if the pool keeps the buffer.
fn connected_pool_cb(port: &Weak<Port>, buffer: &Buffer) -> bool {
    let Some(port) = port.upgrade() else {
        return true;
    };

    tracing::trace!(port = %port.name(), ?buffer, "recycling released buffer");

    buffer.reset();

    // On success the send consumed the buffer; on failure the pool holds
    // on to it.
    port.send(buffer).is_err()
}
